//! Nostr protocol types used by the follow-list recovery tool.
//!
//! This crate provides:
//! - NIP-01: Basic protocol (events, id hashing, signing, verification)
//! - NIP-02: Follow List (contact list tags and the legacy relay map in `content`)
//! - NIP-19: bech32-encoded keys (`npub`, `nsec`)
//! - NIP-51: Mute lists (kind 10000)
//!
//! # Features
//!
//! - `full` (default): key handling and Schnorr signing
//! - `minimal`: just the event types and serialization

mod nip01;
mod nip02;
mod nip19;
mod nip51;

// NIP-01: Basic protocol (Event type always available)
pub use nip01::{
    Event, EventTemplate, KIND_CONTACTS, Nip01Error, UnsignedEvent,
    serialize_event, validate_unsigned_event,
};

// NIP-01: Crypto functions (require full feature)
#[cfg(feature = "full")]
pub use nip01::{
    finalize_event, generate_secret_key, get_event_hash, get_public_key, get_public_key_hex,
    sign_event, verify_event,
};

// NIP-02: Follow List and relay capabilities
pub use nip02::{
    CONTACT_LIST_KIND, Contact, Nip02Error, RelayCapabilities, RelayCapability,
    parse_relay_capabilities,
};

// NIP-19: bech32-encoded keys
pub use nip19::{
    NPUB_HRP, NSEC_HRP, Nip19Error, decode_public_key, npub_to_public_key, nsec_to_private_key,
    private_key_to_nsec, public_key_to_npub,
};

// NIP-51: Mute lists
pub use nip51::{MUTE_LIST_KIND, MuteList, Nip51Error};
