mod ws;

use anyhow::{Context, Result};
use axum::{routing::any, Router};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

use crate::signaling::{PeerConnector, SessionConfig};

pub use ws::ws_handler;

/// Shared by every control-channel connection
#[derive(Clone)]
pub struct SignalState {
    pub connector: Arc<dyn PeerConnector>,
    pub session: SessionConfig,
}

pub struct SignalServer {
    state: SignalState,
    static_dir: Option<PathBuf>,
    addr: String,
}

impl SignalServer {
    pub fn new(connector: Arc<dyn PeerConnector>, addr: String) -> Self {
        Self {
            state: SignalState {
                connector,
                session: SessionConfig::default(),
            },
            static_dir: None,
            addr,
        }
    }

    /// Serve files from `dir` for every path other than `/websocket`
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.state.session = config;
        self
    }

    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/websocket", any(ws_handler))
            .with_state(self.state.clone());

        match &self.static_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router,
        }
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until Ctrl-C
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(local) = listener.local_addr() {
            info!("Signaling server listening on {}", local);
        }
        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await
            .context("Server error")?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
