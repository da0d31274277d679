//! Recover a Nostr follow list (kind 3) from the relays that still hold copies.
//!
//! Relays are queried in parallel for the author's contact lists and mute list.
//! Whatever arrives within the collection window is merged into one list, signed
//! with a local key or through the browser, and published to the write relays
//! named in the recovered relay map.
//!
//! - [`aggregate`]: merging records into an [`aggregate::AggregationState`]
//! - [`phase`]: the listening / finalizing / publishing / draining sequence
//! - [`builder`] and [`signer`]: the outgoing record
//! - [`publish`]: choosing write relays and sending
//! - [`recovery::run`]: all of the above, end to end

pub mod aggregate;
pub mod browser;
pub mod builder;
pub mod config;
pub mod identity;
pub mod phase;
pub mod publish;
pub mod recovery;
pub mod signer;

pub use aggregate::{AggregationState, Aggregator, MembershipEntry};
pub use config::{Cli, RecoveryConfig};
pub use phase::{Phase, PhaseController, PhaseTimings};
pub use recovery::{RecoveryError, RecoveryReport, run};
pub use signer::{EventSigner, LocalSigner, SignError, select_signer};
