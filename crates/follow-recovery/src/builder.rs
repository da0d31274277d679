//! Builds the unsigned kind 3 record from a finalized [`AggregationState`].

use crate::aggregate::AggregationState;
use nostr::{CONTACT_LIST_KIND, Contact, UnsignedEvent};
use std::time::{SystemTime, UNIX_EPOCH};

/// Build the merged follow list, stamped with the current time.
pub fn build_contact_list(state: &AggregationState, author: &str) -> UnsignedEvent {
    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    build_contact_list_at(state, author, created_at)
}

/// Build the merged follow list with an explicit timestamp.
///
/// Members appear in discovery order with muted ones left out. Each `p` tag
/// carries the member's relay hint when one is known. The content is the relay
/// map exactly as collected.
pub fn build_contact_list_at(
    state: &AggregationState,
    author: &str,
    created_at: u64,
) -> UnsignedEvent {
    let tags = state
        .visible_members()
        .map(|entry| Contact {
            pubkey: entry.member_id.clone(),
            relay_url: entry.relay_hint.clone(),
            petname: None,
        })
        .map(|contact| contact.to_tag())
        .collect();

    // Serializing a map of JSON values cannot fail
    let content = serde_json::to_string(&state.relays).unwrap_or_else(|_| "{}".to_string());

    UnsignedEvent {
        pubkey: author.to_string(),
        created_at,
        kind: CONTACT_LIST_KIND,
        tags,
        content,
    }
}
