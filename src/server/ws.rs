//! Control channel: one WebSocket per negotiation session

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{future, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::SignalState;
use crate::signaling::{ControlMessage, NegotiationSession, Outbound};
use crate::{Error, Result};

/// WebSocket upgrade handler for `/websocket`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SignalState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SignalState) {
    let (sender, receiver) = socket.split();
    let (outbound, rx) = Outbound::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let send_task = tokio::spawn(write_loop(sender, rx, done_rx));

    info!("New control channel");

    match NegotiationSession::start(state.connector.as_ref(), outbound, &state.session).await {
        Ok(session) => {
            // run() logs its own outcome
            let _ = session.run(control_frames(receiver)).await;
        }
        Err(e) => warn!("Failed to create peer connection: {}", e),
    }

    let _ = done_tx.send(());
    let _ = send_task.await;
}

/// Sole writer of the socket.
///
/// Candidate handlers keep `Outbound` clones alive after the session ends, so
/// the queue never closes by itself; `done` tells the writer to flush what is
/// already queued, close the socket and exit.
async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ControlMessage>,
    mut done: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if send(&mut sender, &msg).await.is_err() {
                        return;
                    }
                }
                None => break,
            },
            _ = &mut done => {
                while let Ok(msg) = rx.try_recv() {
                    if send(&mut sender, &msg).await.is_err() {
                        return;
                    }
                }
                break;
            }
        }
    }
    let _ = sender.send(Message::Close(None)).await;
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, msg: &ControlMessage) -> Result<()> {
    let text = serde_json::to_string(msg)?;
    trace!("Sending: {}", text);
    sender.send(Message::Text(text)).await.map_err(|e| {
        debug!("WebSocket send error: {}", e);
        Error::ChannelClosed
    })
}

/// Text payloads of the inbound frames, ending at the first close frame
fn control_frames(
    receiver: SplitStream<WebSocket>,
) -> impl Stream<Item = Result<String>> + Unpin + Send {
    receiver
        .take_while(|frame| future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => Some(
                    String::from_utf8(bytes)
                        .map_err(|_| Error::Transport("binary frame is not UTF-8".to_string())),
                ),
                Ok(_) => None,
                Err(e) => Some(Err(Error::Transport(e.to_string()))),
            })
        })
}
