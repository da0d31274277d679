//! Nostr relay WebSocket client.
//!
//! This crate provides:
//! - WebSocket connections to Nostr relays
//! - Message parsing (NIP-01 relay protocol)
//! - A pool that fans every relay's traffic into one channel, with liveness pings
//!
//! # Example
//!
//! ```rust,no_run
//! use nostr_client::{Filter, PoolEvent, RelayPool, DEFAULT_RELAYS};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = RelayPool::new();
//!     let relays: Vec<String> = DEFAULT_RELAYS.iter().map(|s| s.to_string()).collect();
//!
//!     let filter = Filter::new()
//!         .kinds(vec![3, 10000])
//!         .authors(vec!["<hex pubkey>".to_string()]);
//!     let mut events = pool.start(&relays, vec![filter]).await;
//!
//!     while let Some(event) = events.recv().await {
//!         if let PoolEvent::Event { relay_url, event, .. } = event {
//!             println!("{} sent kind {}", relay_url, event.kind);
//!         }
//!     }
//! }
//! ```

mod error;
mod message;
mod pool;
mod relay;
mod subscription;

pub use error::{ClientError, Result};
pub use message::{ClientMessage, Filter, MessageError, RelayMessage};
pub use pool::{PoolConfig, PoolEvent, RelayPool};
pub use relay::{ConnectionState, RelayConfig, RelayConnection};
pub use subscription::{Subscription, generate_subscription_id};

/// Relays queried when none are configured.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://relay.nostr.band",
    "wss://nos.lol",
    "wss://nostr.mom",
    "wss://relay.primal.net",
    "wss://purplepag.es",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_relays() {
        assert_eq!(DEFAULT_RELAYS.len(), 6);
        for relay in DEFAULT_RELAYS {
            assert!(relay.starts_with("wss://"));
        }
    }
}
