//! Forwards locally discovered candidates to the remote peer.
//!
//! With gather-then-exchange-once negotiation every candidate is usually
//! already embedded in the description that was sent, so this output is
//! mostly redundant. It is still sent for trickle-capable peers.

use tracing::{debug, warn};

use super::peer::{CandidateHandler, PeerConnection};
use super::session::Outbound;
use super::types::{CandidateInit, ControlMessage};

/// Build the handler that turns each candidate into a `candidate` message
pub fn candidate_handler(outbound: Outbound) -> CandidateHandler {
    Box::new(move |candidate: CandidateInit| forward(&outbound, &candidate))
}

/// Subscribe `connection`'s candidate events to `outbound`
pub fn install(connection: &dyn PeerConnection, outbound: Outbound) {
    connection.on_candidate(candidate_handler(outbound));
}

fn forward(outbound: &Outbound, candidate: &CandidateInit) {
    let msg = match ControlMessage::candidate(candidate) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to serialize candidate: {}", e);
            return;
        }
    };
    match outbound.send(msg) {
        Ok(()) => debug!("Relayed candidate {}", candidate.candidate),
        Err(e) => warn!("Failed to relay candidate: {}", e),
    }
}
