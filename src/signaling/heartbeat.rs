//! Periodic timestamp messages on an open data stream

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::peer::DataStream;

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// Current wall-clock time as sent on the stream
pub fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%d %H:%M:%S%.f %:z")
        .to_string()
}

/// Send a timestamp every `period` until the stream closes.
///
/// Returns the number of messages delivered. A closed stream ends the loop
/// normally; any other send failure is logged and the loop keeps going.
pub async fn run(stream: Arc<dyn DataStream>, period: Duration) -> u64 {
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the first message goes out one
    // full period after open.
    ticker.tick().await;

    let mut sent = 0u64;
    loop {
        ticker.tick().await;
        match stream.send_text(timestamp()).await {
            Ok(()) => {
                sent += 1;
                trace!("Heartbeat {} on '{}'", sent, stream.label());
            }
            Err(e) if e.is_expected_close() => {
                debug!(
                    "Data stream '{}' closed after {} heartbeats",
                    stream.label(),
                    sent
                );
                return sent;
            }
            Err(e) => {
                warn!("Heartbeat on '{}' failed: {}", stream.label(), e);
            }
        }
    }
}

/// Start the heartbeat when `stream` opens
pub fn install(stream: &dyn DataStream, period: Duration) {
    stream.on_open(Box::new(move |opened: Arc<dyn DataStream>| {
        debug!("Data stream '{}' open, starting heartbeat", opened.label());
        tokio::spawn(run(opened, period));
    }));
}
