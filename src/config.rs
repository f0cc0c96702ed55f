use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rtc: RtcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Single UDP port all ICE traffic is multiplexed on
    #[serde(default = "default_ice_port")]
    pub ice_port: u16,
    /// Directory served for every path other than `/websocket`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtcConfig {
    /// Address advertised in host candidates instead of the local ones
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default = "default_data_stream_label")]
    pub data_stream_label: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default)]
    pub include_loopback: bool,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_ice_port() -> u16 {
    8443
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_data_stream_label() -> String {
    "noop".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            ice_port: default_ice_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            public_ip: None,
            data_stream_label: default_data_stream_label(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            include_loopback: false,
        }
    }
}

impl Config {
    /// Apply the public address given on the command line
    pub fn with_public_ip(mut self, public_ip: Option<String>) -> Self {
        if public_ip.is_some() {
            self.rtc.public_ip = public_ip;
        }
        self
    }
}

impl ServerConfig {
    /// URL for a browser on this host; a wildcard bind host becomes localhost
    pub fn local_url(&self) -> String {
        match self.bind_address.rsplit_once(':') {
            Some((host, port)) if matches!(host, "" | "0.0.0.0" | "[::]") => {
                format!("http://localhost:{}", port)
            }
            _ => format!("http://{}", self.bind_address),
        }
    }
}

impl RtcConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
