use anyhow::{Context, Result};
use clap::Parser;
use signalbox::{Config, RtcConnector, SessionConfig, SignalServer};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;

#[derive(Parser)]
#[command(name = "signalbox")]
#[command(about = "WebRTC negotiation over a WebSocket control channel", long_about = None)]
struct Cli {
    /// Public IP address advertised in host candidates
    public_ip: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signalbox=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(ip) = &cli.public_ip {
        ip.parse::<IpAddr>()
            .with_context(|| format!("Invalid public IP: {}", ip))?;
    }

    let config = Config::default().with_public_ip(cli.public_ip);

    let ice_socket = UdpSocket::bind(("0.0.0.0", config.server.ice_port))
        .await
        .with_context(|| format!("Failed to listen for ICE on port {}", config.server.ice_port))?;
    println!("Listening for ICE UDP at {}", ice_socket.local_addr()?);

    if let Some(ip) = &config.rtc.public_ip {
        println!("Setting Listening IP {}", ip);
    }

    let connector = RtcConnector::builder(&config.rtc)
        .with_ice_socket(ice_socket)
        .build()
        .context("Failed to set up peer-connection engine")?;

    let server = SignalServer::new(Arc::new(connector), config.server.bind_address.clone())
        .with_static_dir(&config.server.static_dir)
        .with_session_config(SessionConfig::from(&config.rtc));

    println!("Open {} to access this demo", config.server.local_url());

    server.run().await?;

    Ok(())
}
