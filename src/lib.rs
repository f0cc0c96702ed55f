pub mod config;
pub mod error;
pub mod server;
pub mod signaling;

pub use config::{Config, RtcConfig, ServerConfig};
pub use error::{Error, Result};
pub use server::SignalServer;
pub use signaling::{NegotiationSession, RtcConnector, SessionConfig};
