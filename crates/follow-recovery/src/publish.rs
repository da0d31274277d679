//! Choosing which relays receive the signed record, and sending it.

use crate::aggregate::AggregationState;
use nostr::Event;
use nostr_client::{ClientError, RelayPool};
use tracing::{info, warn};

/// Result of sending to one relay.
#[derive(Debug)]
pub struct PublishOutcome {
    pub relay_url: String,
    pub result: Result<(), ClientError>,
}

impl PublishOutcome {
    pub fn is_sent(&self) -> bool {
        self.result.is_ok()
    }
}

/// Relays that declared write access, opened during collection, and are still open.
///
/// URLs are compared exactly as written, in the order the relay map listed them.
pub async fn select_targets(state: &AggregationState, pool: &RelayPool) -> Vec<String> {
    let mut targets = Vec::new();
    for (url, capability) in &state.relays {
        if !capability.can_write() || !state.opened.contains(url) {
            continue;
        }
        if pool.is_open(url).await {
            targets.push(url.clone());
        } else {
            info!("Skipping {}: no longer open", url);
        }
    }
    targets
}

/// Send `event` once to each target. A failure on one relay does not affect the others.
pub async fn publish(event: &Event, targets: &[String], pool: &RelayPool) -> Vec<PublishOutcome> {
    let mut outcomes = Vec::with_capacity(targets.len());
    for url in targets {
        info!("Sending to {}", url);
        let result = pool.send_event_to(url, event).await;
        if let Err(e) = &result {
            warn!("Failed to send to {}: {}", url, e);
        }
        outcomes.push(PublishOutcome {
            relay_url: url.clone(),
            result,
        });
    }
    outcomes
}
