//! Single relay connection management
//!
//! A [`RelayConnection`] opens one WebSocket, issues a subscription as soon as
//! the socket is open, and hands everything the relay says to the pool's event
//! channel. One background task owns the socket and multiplexes outbound frames
//! with inbound ones. There is no reconnection: a closed connection stays closed.

use crate::error::{ClientError, Result};
use crate::message::{ClientMessage, RelayMessage};
use crate::pool::PoolEvent;
use crate::subscription::Subscription;
use futures::{SinkExt, StreamExt};
use nostr::Event;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Socket open, frames flowing
    Open,
    /// Closed by either side after having been open
    Closed,
    /// Never opened (handshake error or timeout)
    Failed,
}

/// Relay connection configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Relay connection
pub struct RelayConnection {
    /// URL exactly as configured; used as the relay's identity everywhere
    url: String,
    /// Parsed form, used for the handshake
    parsed: Url,
    config: RelayConfig,
    state: Arc<RwLock<ConnectionState>>,
    last_activity: Arc<RwLock<Option<Instant>>>,
    /// Outbound frames for the socket task; `None` until open
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RelayConnection {
    /// Create a new relay connection (does not connect yet)
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RelayConfig::default())
    }

    /// Create a new relay connection with custom config
    pub fn with_config(url: &str, config: RelayConfig) -> Result<Self> {
        let parsed = Url::parse(url)?;

        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                parsed.scheme()
            )));
        }

        Ok(Self {
            url: url.to_string(),
            parsed,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Connecting)),
            last_activity: Arc::new(RwLock::new(None)),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    /// When the relay last sent us anything.
    pub async fn last_activity(&self) -> Option<Instant> {
        *self.last_activity.read().await
    }

    /// Open the socket, issue `subscription`, and start forwarding relay frames to `events`.
    ///
    /// Emits [`PoolEvent::Opened`] before the REQ goes out. A failed handshake
    /// leaves the connection in [`ConnectionState::Failed`] and is returned to the
    /// caller; nothing is emitted for it here.
    pub async fn connect(
        &self,
        events: mpsc::UnboundedSender<PoolEvent>,
        subscription: &Subscription,
    ) -> Result<()> {
        *self.state.write().await = ConnectionState::Connecting;

        info!("Connecting to relay: {}", self.url);

        let connect_start = Instant::now();
        let ws_stream = match timeout(
            self.config.connect_timeout,
            connect_async(self.parsed.as_str()),
        )
        .await
        {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                *self.state.write().await = ConnectionState::Failed;
                return Err(ClientError::WebSocket(e.to_string()));
            }
            Err(_) => {
                *self.state.write().await = ConnectionState::Failed;
                return Err(ClientError::Timeout(format!(
                    "Connection timeout after {:?}",
                    self.config.connect_timeout
                )));
            }
        };

        info!(
            "Connected to relay: {} (took {:?})",
            self.url,
            connect_start.elapsed()
        );

        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

        *self.outbound.lock().await = Some(out_tx);
        *self.state.write().await = ConnectionState::Open;
        *self.last_activity.write().await = Some(Instant::now());

        let _ = events.send(PoolEvent::Opened {
            relay_url: self.url.clone(),
        });

        let req = subscription.to_req()?;
        debug!("Sending to {}: {}", self.url, req);
        if let Err(e) = sink.send(Message::Text(req.into())).await {
            warn!("Failed to send subscription to {}: {}", self.url, e);
        }

        let url = self.url.clone();
        let state = Arc::clone(&self.state);
        let last_activity = Arc::clone(&self.last_activity);

        let handle = tokio::spawn(async move {
            let mut close_reason: Option<String> = None;

            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => {
                        match outgoing {
                            Some(msg) => {
                                if let Err(e) = sink.send(msg).await {
                                    warn!("Failed to send to {}: {}", url, e);
                                    let _ = events.send(PoolEvent::Error {
                                        relay_url: url.clone(),
                                        error: e.to_string(),
                                    });
                                    break;
                                }
                            }
                            None => {
                                // Sender dropped: local disconnect
                                let _ = sink.send(Message::Close(None)).await;
                                close_reason = Some("closed locally".to_string());
                                break;
                            }
                        }
                    }
                    incoming = stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                *last_activity.write().await = Some(Instant::now());
                                debug!("Received from {}: {}", url, text.as_str());
                                forward_relay_message(&url, text.as_str(), &events);
                            }
                            Some(Ok(Message::Ping(data))) => {
                                *last_activity.write().await = Some(Instant::now());
                                let _ = sink.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Pong(_))) => {
                                *last_activity.write().await = Some(Instant::now());
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("Relay {} closed connection", url);
                                close_reason = frame.map(|f| f.reason.as_str().to_string());
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("WebSocket error from {}: {}", url, e);
                                let _ = events.send(PoolEvent::Error {
                                    relay_url: url.clone(),
                                    error: e.to_string(),
                                });
                                break;
                            }
                            None => break,
                        }
                    }
                }
            }

            *state.write().await = ConnectionState::Closed;
            let _ = events.send(PoolEvent::Closed {
                relay_url: url,
                reason: close_reason,
            });
        });

        *self.task.lock().await = Some(handle);

        Ok(())
    }

    async fn send_frame(&self, msg: Message) -> Result<()> {
        if !self.is_open().await {
            return Err(ClientError::NotConnected);
        }

        match self.outbound.lock().await.as_ref() {
            Some(tx) => tx.send(msg).map_err(|_| ClientError::NotConnected),
            None => Err(ClientError::NotConnected),
        }
    }

    /// Send a WebSocket ping. Only valid while the connection is open.
    pub async fn ping(&self) -> Result<()> {
        self.send_frame(Message::Ping(Default::default())).await
    }

    /// Publish an event: `["EVENT", event]`
    pub async fn send_event(&self, event: &Event) -> Result<()> {
        let json = ClientMessage::Event(event.clone()).to_json()?;
        debug!("Sending to {}: {}", self.url, json);
        self.send_frame(Message::Text(json.into())).await
    }

    /// Close the socket and wait briefly for the connection task to finish.
    pub async fn disconnect(&self) {
        let was_open = self.outbound.lock().await.take().is_some();
        if was_open {
            info!("Disconnecting from relay: {}", self.url);
        }

        if let Some(mut handle) = self.task.lock().await.take() {
            if timeout(Duration::from_secs(1), &mut handle).await.is_err() {
                handle.abort();
            }
        }

        let mut state = self.state.write().await;
        if *state != ConnectionState::Failed {
            *state = ConnectionState::Closed;
        }
    }
}

fn forward_relay_message(url: &str, text: &str, events: &mpsc::UnboundedSender<PoolEvent>) {
    let relay_url = url.to_string();
    let event = match RelayMessage::from_json(text) {
        Ok(RelayMessage::Event {
            subscription_id,
            event,
        }) => PoolEvent::Event {
            relay_url,
            subscription_id,
            event,
        },
        Ok(RelayMessage::Eose { subscription_id }) => PoolEvent::Eose {
            relay_url,
            subscription_id,
        },
        Ok(RelayMessage::Notice { message }) => PoolEvent::Notice { relay_url, message },
        Ok(RelayMessage::Closed {
            subscription_id,
            message,
        }) => PoolEvent::Notice {
            relay_url,
            message: format!("subscription {} closed: {}", subscription_id, message),
        },
        Ok(RelayMessage::Ok {
            event_id,
            success,
            message,
        }) => PoolEvent::Ok {
            relay_url,
            event_id,
            success,
            message,
        },
        Ok(other) => {
            debug!("Ignoring message from {}: {:?}", url, other);
            return;
        }
        Err(e) => {
            warn!("Unparseable message from {}: {}", url, e);
            return;
        }
    };

    let _ = events.send(event);
}
