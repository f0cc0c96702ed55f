//! In-process peer-connection capability for session tests

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use super::peer::{
    CandidateHandler, DataStream, DataStreamHandler, GatheringComplete, IceStateHandler,
    OpenHandler, PeerConnection, PeerConnector,
};
use super::types::{CandidateInit, IceConnectionState, SessionDescription};
use crate::{Error, Result};

pub const FAKE_OFFER_SDP: &str = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n";
pub const FAKE_ANSWER_SDP: &str = "v=0\r\no=- 2 2 IN IP4 0.0.0.0\r\ns=-\r\n";

#[derive(Default)]
pub struct FakeConnector {
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
    /// Candidate lines appended to the local description while "gathering"
    pub gathered: Vec<String>,
    pub fail_answer: bool,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gathered(mut self, lines: &[&str]) -> Self {
        self.gathered = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn failing_answer(mut self) -> Self {
        self.fail_answer = true;
        self
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        self.connections.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn create_connection(&self) -> Result<Arc<dyn PeerConnection>> {
        let connection = Arc::new(FakeConnection {
            state: Arc::new(Mutex::new(FakeState::default())),
            gathered: self.gathered.clone(),
            fail_answer: self.fail_answer,
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    gather_tx: Option<mpsc::Sender<()>>,
    on_candidate: Option<CandidateHandler>,
    on_ice_state: Option<IceStateHandler>,
    on_data_stream: Option<DataStreamHandler>,
}

pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
    gathered: Vec<String>,
    fail_answer: bool,
}

impl FakeConnection {
    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn remote(&self) -> Option<SessionDescription> {
        self.state.lock().unwrap().remote.clone()
    }

    pub fn emit_candidate(&self, candidate: CandidateInit) {
        let state = self.state.lock().unwrap();
        if let Some(handler) = state.on_candidate.as_ref() {
            handler(candidate);
        }
    }

    pub fn emit_ice_state(&self, ice_state: IceConnectionState) {
        let state = self.state.lock().unwrap();
        if let Some(handler) = state.on_ice_state.as_ref() {
            handler(ice_state);
        }
    }

    /// Simulate the remote opening a data stream
    pub fn open_remote_stream(&self, label: &str) -> Arc<FakeStream> {
        let stream = Arc::new(FakeStream::new(label));
        let dyn_stream: Arc<dyn DataStream> = stream.clone();
        let state = self.state.lock().unwrap();
        if let Some(handler) = state.on_data_stream.as_ref() {
            handler(dyn_stream);
        }
        stream
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn create_data_stream(&self, label: &str) -> Result<Arc<dyn DataStream>> {
        self.record(format!("create_data_stream:{}", label));
        Ok(Arc::new(FakeStream::new(label)))
    }

    fn on_candidate(&self, handler: CandidateHandler) {
        self.state.lock().unwrap().on_candidate = Some(handler);
    }

    fn on_ice_state_change(&self, handler: IceStateHandler) {
        self.state.lock().unwrap().on_ice_state = Some(handler);
    }

    fn on_data_stream(&self, handler: DataStreamHandler) {
        self.state.lock().unwrap().on_data_stream = Some(handler);
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record("create_offer");
        Ok(SessionDescription::offer(FAKE_OFFER_SDP))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record("create_answer");
        if self.fail_answer {
            return Err(Error::Engine(webrtc::Error::ErrConnectionClosed));
        }
        if self.state.lock().unwrap().remote.is_none() {
            return Err(Error::Engine(webrtc::Error::ErrNoRemoteDescription));
        }
        Ok(SessionDescription::answer(FAKE_ANSWER_SDP))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(format!("set_local:{}", desc.sdp_type));
        self.state.lock().unwrap().local = Some(desc);

        // Gathering runs in the background and only then fills in candidates
        let state = self.state.clone();
        let gathered = self.gathered.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let mut state = state.lock().unwrap();
            if let Some(local) = state.local.as_mut() {
                for line in &gathered {
                    local.sdp.push_str(line);
                    local.sdp.push_str("\r\n");
                }
            }
            if let Some(tx) = state.gather_tx.take() {
                let _ = tx.try_send(());
            }
        });
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(format!("set_remote:{}", desc.sdp_type));
        if !desc.sdp.starts_with("v=0") {
            return Err(Error::UnsupportedDescription);
        }
        self.state.lock().unwrap().remote = Some(desc);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.record("local_description");
        self.state.lock().unwrap().local.clone()
    }

    async fn gathering_complete(&self) -> GatheringComplete {
        self.record("gathering_complete");
        let (tx, rx) = mpsc::channel(1);
        self.state.lock().unwrap().gather_tx = Some(tx);
        GatheringComplete::new(rx)
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        Ok(())
    }
}

pub struct FakeStream {
    label: String,
    pub sent: Mutex<Vec<String>>,
    pub closed: Mutex<bool>,
    on_open: Mutex<Option<OpenHandler>>,
}

impl FakeStream {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            on_open: Mutex::new(None),
        }
    }

    pub fn open(self: &Arc<Self>) {
        let handler = self.on_open.lock().unwrap().take();
        if let Some(handler) = handler {
            let opened: Arc<dyn DataStream> = self.clone();
            handler(opened);
        }
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl DataStream for FakeStream {
    fn label(&self) -> &str {
        &self.label
    }

    fn on_open(&self, handler: OpenHandler) {
        *self.on_open.lock().unwrap() = Some(handler);
    }

    async fn send_text(&self, text: String) -> Result<()> {
        if *self.closed.lock().unwrap() {
            return Err(Error::StreamClosed);
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }
}
