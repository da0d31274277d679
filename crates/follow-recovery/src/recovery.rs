//! The recovery run from first connection to last acknowledgement.
//!
//! The pool's event channel is drained by this one loop, which hands every
//! event to the [`Aggregator`] until the collection window closes. After that
//! the merged record is built, signed, printed to stdout, and sent to the write
//! relays that are still open; acknowledgements are logged for the length of the
//! drain window before the pool is stopped.

use crate::aggregate::{AggregationState, Aggregator};
use crate::builder::build_contact_list;
use crate::config::RecoveryConfig;
use crate::phase::{Phase, PhaseController, PhaseError};
use crate::publish::{PublishOutcome, publish, select_targets};
use crate::signer::{EventSigner, SignError};
use nostr::{CONTACT_LIST_KIND, Event, MUTE_LIST_KIND};
use nostr_client::{Filter, PoolEvent, RelayPool};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Sleep, sleep};
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// A relay's answer to the published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAck {
    pub relay_url: String,
    pub accepted: bool,
    pub message: String,
}

#[derive(Debug)]
pub struct RecoveryReport {
    pub event: Event,
    pub state: AggregationState,
    pub outcomes: Vec<PublishOutcome>,
    pub acks: Vec<RelayAck>,
}

/// Kind 3 and kind 10000 records by `author`.
pub fn subscription_filter(author: &str) -> Filter {
    Filter::new()
        .kinds(vec![CONTACT_LIST_KIND, MUTE_LIST_KIND])
        .authors(vec![author.to_string()])
}

/// Run one recovery for `author`.
///
/// Only a signing failure ends the run early; relay failures of any kind are
/// logged and the run carries on with whatever was collected.
pub async fn run(
    config: &RecoveryConfig,
    author: &str,
    signer: &dyn EventSigner,
) -> Result<RecoveryReport, RecoveryError> {
    let mut phases = PhaseController::new();
    info!("Finding follow lists for {}", author);

    let pool = RelayPool::with_config(config.pool_config());
    let mut events = pool
        .start(&config.relays, vec![subscription_filter(author)])
        .await;
    let aggregator = Aggregator::new(author);

    let window = sleep(config.timings.collection_window);
    tokio::pin!(window);
    loop {
        tokio::select! {
            _ = &mut window => break,
            received = events.recv() => match received {
                Some(event) => aggregator.consume(event).await,
                None => {
                    // Every connection is gone; the window still runs its course
                    (&mut window).await;
                    break;
                }
            },
        }
    }

    phases.transition(Phase::Finalizing)?;
    let state = aggregator.finalize().await;
    info!("Found {} tags", state.members.len());
    info!("Found {} muted", state.muted.len());
    info!("Found {} relays", state.relays.len());

    let unsigned = build_contact_list(&state, author);
    info!("Signing with {}", signer.name());
    let event = match signer.sign(&unsigned).await {
        Ok(event) => event,
        Err(e) => {
            pool.stop().await;
            return Err(e.into());
        }
    };

    match serde_json::to_string(&event) {
        Ok(json) => println!("{}", json),
        Err(e) => warn!("Could not print signed event: {}", e),
    }

    phases.transition(Phase::Publishing)?;
    let targets = select_targets(&state, &pool).await;
    if targets.is_empty() {
        warn!("No open write relays to publish to");
    }
    let outcomes = publish(&event, &targets, &pool).await;

    phases.transition(Phase::Draining)?;
    let drain = sleep(config.timings.drain_window);
    let acks = drain_acks(&mut events, &event.id, drain).await;

    phases.transition(Phase::Terminated)?;
    pool.stop().await;
    info!("finished");

    Ok(RecoveryReport {
        event,
        state,
        outcomes,
        acks,
    })
}

async fn drain_acks(
    events: &mut mpsc::UnboundedReceiver<PoolEvent>,
    event_id: &str,
    window: Sleep,
) -> Vec<RelayAck> {
    tokio::pin!(window);
    let mut acks = Vec::new();

    loop {
        tokio::select! {
            _ = &mut window => break,
            received = events.recv() => match received {
                Some(PoolEvent::Ok { relay_url, event_id: id, success, message }) if id == event_id => {
                    if success {
                        info!("{} accepted the follow list", relay_url);
                    } else {
                        warn!("{} rejected the follow list: {}", relay_url, message);
                    }
                    acks.push(RelayAck {
                        relay_url,
                        accepted: success,
                        message,
                    });
                }
                Some(PoolEvent::Notice { relay_url, message }) => {
                    info!("Notice {}: {}", relay_url, message);
                }
                Some(_) => {}
                None => {
                    (&mut window).await;
                    break;
                }
            },
        }
    }

    acks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_selects_contact_and_mute_lists() {
        let filter = subscription_filter(&"a".repeat(64));
        assert_eq!(filter.kinds, Some(vec![3, 10000]));
        assert_eq!(filter.authors, Some(vec!["a".repeat(64)]));
    }

    #[tokio::test]
    async fn drain_collects_matching_acks_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(PoolEvent::Ok {
            relay_url: "wss://a".to_string(),
            event_id: "other".to_string(),
            success: true,
            message: String::new(),
        })
        .unwrap();
        tx.send(PoolEvent::Ok {
            relay_url: "wss://b".to_string(),
            event_id: "mine".to_string(),
            success: false,
            message: "blocked".to_string(),
        })
        .unwrap();
        drop(tx);

        let acks = drain_acks(
            &mut rx,
            "mine",
            sleep(std::time::Duration::from_millis(20)),
        )
        .await;
        assert_eq!(
            acks,
            vec![RelayAck {
                relay_url: "wss://b".to_string(),
                accepted: false,
                message: "blocked".to_string(),
            }]
        );
    }
}
