//! Relay pool for querying several Nostr relays at once.
//!
//! [`RelayPool::start`] opens every relay concurrently, issues the same
//! subscription on each as soon as it opens, and returns a single channel that
//! carries everything any relay says. A background loop pings open relays at a
//! fixed interval so idle sockets are not dropped by intermediaries.

use crate::error::{ClientError, Result};
use crate::message::Filter;
use crate::relay::{ConnectionState, RelayConfig, RelayConnection};
use crate::subscription::Subscription;
use nostr::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, info, warn};

/// Used in place of a zero ping interval.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Events emitted by the relay pool.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A relay finished its handshake; the subscription is issued right after
    Opened { relay_url: String },
    /// Human-readable message from a relay
    Notice { relay_url: String, message: String },
    /// A previously open relay closed
    Closed {
        relay_url: String,
        reason: Option<String>,
    },
    /// Connection or transport error
    Error { relay_url: String, error: String },
    /// EOSE received for a subscription on a relay
    Eose {
        relay_url: String,
        subscription_id: String,
    },
    /// An event was received from a relay
    Event {
        relay_url: String,
        subscription_id: String,
        event: Event,
    },
    /// OK response for a published event
    Ok {
        relay_url: String,
        event_id: String,
        success: bool,
        message: String,
    },
}

impl PoolEvent {
    pub fn relay_url(&self) -> &str {
        match self {
            PoolEvent::Opened { relay_url }
            | PoolEvent::Notice { relay_url, .. }
            | PoolEvent::Closed { relay_url, .. }
            | PoolEvent::Error { relay_url, .. }
            | PoolEvent::Eose { relay_url, .. }
            | PoolEvent::Event { relay_url, .. }
            | PoolEvent::Ok { relay_url, .. } => relay_url,
        }
    }
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Per-relay connection settings
    pub relay: RelayConfig,
    /// Interval between liveness pings; the first ping fires after one interval
    pub ping_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            relay: RelayConfig::default(),
            ping_interval: Duration::from_secs(10),
        }
    }
}

/// A pool of Nostr relay connections.
pub struct RelayPool {
    config: PoolConfig,
    /// Connections in the order they were configured
    relays: Arc<RwLock<Vec<Arc<RelayConnection>>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayPool {
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            config,
            relays: Arc::new(RwLock::new(Vec::new())),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Open every relay in `urls` and subscribe each one with `filters`.
    ///
    /// Returns immediately; connection outcomes arrive on the returned channel.
    /// A URL that cannot be used (bad scheme, unparsable) or a relay that cannot
    /// be reached shows up as [`PoolEvent::Error`]. Duplicate URLs are opened once.
    pub async fn start(
        &self,
        urls: &[String],
        filters: Vec<Filter>,
    ) -> mpsc::UnboundedReceiver<PoolEvent> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let subscription = Arc::new(Subscription::new(filters));
        let mut tasks = self.tasks.lock().await;

        {
            let mut relays = self.relays.write().await;

            for url in urls {
                if relays.iter().any(|r| r.url() == url) {
                    debug!("Skipping duplicate relay: {}", url);
                    continue;
                }

                let conn = match RelayConnection::with_config(url, self.config.relay.clone()) {
                    Ok(conn) => Arc::new(conn),
                    Err(e) => {
                        warn!("Error {}: {}", url, e);
                        let _ = events_tx.send(PoolEvent::Error {
                            relay_url: url.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                relays.push(Arc::clone(&conn));

                let events_tx = events_tx.clone();
                let subscription = Arc::clone(&subscription);
                tasks.push(tokio::spawn(async move {
                    if let Err(e) = conn.connect(events_tx.clone(), &subscription).await {
                        warn!("Error {}: {}", conn.url(), e);
                        let _ = events_tx.send(PoolEvent::Error {
                            relay_url: conn.url().to_string(),
                            error: e.to_string(),
                        });
                    }
                }));
            }
        }

        info!("Started pool with {} relays", self.relays.read().await.len());

        tasks.push(self.spawn_ping_loop());

        events_rx
    }

    fn spawn_ping_loop(&self) -> JoinHandle<()> {
        let relays = Arc::clone(&self.relays);
        let period = if self.config.ping_interval.is_zero() {
            warn!(
                "Ping interval must be non-zero, using {:?}",
                MIN_PING_INTERVAL
            );
            MIN_PING_INTERVAL
        } else {
            self.config.ping_interval
        };

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let snapshot: Vec<_> = relays.read().await.iter().cloned().collect();
                for conn in snapshot {
                    if !conn.is_open().await {
                        continue;
                    }
                    if let Some(seen) = conn.last_activity().await {
                        debug!(
                            "Pinging {} (last heard {:?} ago)",
                            conn.url(),
                            seen.elapsed()
                        );
                    }
                    if let Err(e) = conn.ping().await {
                        warn!("Ping to {} failed: {}", conn.url(), e);
                    }
                }
            }
        })
    }

    async fn get(&self, url: &str) -> Option<Arc<RelayConnection>> {
        self.relays
            .read()
            .await
            .iter()
            .find(|r| r.url() == url)
            .cloned()
    }

    /// Whether the relay with exactly this URL is currently open.
    pub async fn is_open(&self, url: &str) -> bool {
        match self.get(url).await {
            Some(conn) => conn.is_open().await,
            None => false,
        }
    }

    /// URLs of relays currently open, in configured order.
    pub async fn open_relays(&self) -> Vec<String> {
        let mut open = Vec::new();
        for conn in self.relays.read().await.iter() {
            if conn.is_open().await {
                open.push(conn.url().to_string());
            }
        }
        open
    }

    /// Connection state of every relay, in configured order.
    pub async fn states(&self) -> Vec<(String, ConnectionState)> {
        let mut states = Vec::new();
        for conn in self.relays.read().await.iter() {
            states.push((conn.url().to_string(), conn.state().await));
        }
        states
    }

    /// Send `["EVENT", event]` to one relay.
    pub async fn send_event_to(&self, url: &str, event: &Event) -> Result<()> {
        let conn = self
            .get(url)
            .await
            .ok_or_else(|| ClientError::UnknownRelay(url.to_string()))?;
        conn.send_event(event).await
    }

    /// Ping every open relay, returning each outcome.
    pub async fn ping_all(&self) -> Vec<(String, Result<()>)> {
        let snapshot: Vec<_> = self.relays.read().await.iter().cloned().collect();
        let mut results = Vec::new();
        for conn in snapshot {
            if conn.is_open().await {
                results.push((conn.url().to_string(), conn.ping().await));
            }
        }
        results
    }

    /// Stop the ping loop, abandon pending connects, and close every socket.
    pub async fn stop(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }

        let snapshot: Vec<_> = self.relays.read().await.iter().cloned().collect();
        for conn in snapshot {
            conn.disconnect().await;
        }

        info!("Pool stopped");
    }
}

impl Default for RelayPool {
    fn default() -> Self {
        Self::new()
    }
}
