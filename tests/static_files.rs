//! Static files are served next to the control channel

use anyhow::Result;
use signalbox::signaling::{PeerConnection, PeerConnector};
use signalbox::SignalServer;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Connector that is never asked for a connection by these tests
struct Unused;

#[async_trait::async_trait]
impl PeerConnector for Unused {
    async fn create_connection(&self) -> signalbox::Result<Arc<dyn PeerConnection>> {
        Err(signalbox::Error::ChannelClosed)
    }
}

async fn start(static_dir: &std::path::Path) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = SignalServer::new(Arc::new(Unused), addr.to_string()).with_static_dir(static_dir);
    tokio::spawn(server.serve_with_shutdown(listener, std::future::pending()));
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn test_serves_index_and_files() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("index.html"), "<h1>demo</h1>")?;
    std::fs::write(dir.path().join("app.js"), "console.log(1)")?;

    let base = start(dir.path()).await?;

    let index = reqwest::get(format!("{}/", base)).await?;
    assert!(index.status().is_success());
    assert_eq!(index.text().await?, "<h1>demo</h1>");

    let script = reqwest::get(format!("{}/app.js", base)).await?;
    assert_eq!(script.text().await?, "console.log(1)");

    let missing = reqwest::get(format!("{}/nope.txt", base)).await?;
    assert_eq!(missing.status().as_u16(), 404);

    Ok(())
}

#[tokio::test]
async fn test_websocket_route_requires_upgrade() -> Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("websocket"), "shadowed")?;

    let base = start(dir.path()).await?;

    // The control channel route wins over a file of the same name
    let resp = reqwest::get(format!("{}/websocket", base)).await?;
    assert!(resp.status().is_client_error());

    Ok(())
}

#[tokio::test]
async fn test_failed_connection_closes_control_channel() -> Result<()> {
    use futures::StreamExt;
    use std::time::Duration;

    let dir = tempfile::TempDir::new()?;
    let base = start(dir.path()).await?;
    let url = base.replacen("http://", "ws://", 1) + "/websocket";

    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next()).await?;
    assert!(matches!(
        frame,
        Some(Ok(tokio_tungstenite::tungstenite::Message::Close(_))) | None | Some(Err(_))
    ));

    Ok(())
}
