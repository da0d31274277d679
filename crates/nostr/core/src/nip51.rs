//! NIP-51: Lists
//!
//! Only the mute list (kind 10000) is handled here. Its public `p` tags name
//! the identities the author does not want to see.
//!
//! See: <https://github.com/nostr-protocol/nips/blob/master/51.md>

use crate::Event;
use thiserror::Error;

/// Event kind for mute lists
pub const MUTE_LIST_KIND: u16 = 10000;

#[derive(Debug, Error)]
pub enum Nip51Error {
    #[error("invalid event kind: expected {MUTE_LIST_KIND}, got {0}")]
    InvalidKind(u16),
}

/// Muted identities taken from a kind 10000 event, in tag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteList {
    pub pubkeys: Vec<String>,
}

impl MuteList {
    pub fn from_event(event: &Event) -> Result<Self, Nip51Error> {
        if event.kind != MUTE_LIST_KIND {
            return Err(Nip51Error::InvalidKind(event.kind));
        }

        let pubkeys = event
            .tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("p"))
            .filter_map(|tag| tag.get(1))
            .filter(|pk| !pk.is_empty())
            .cloned()
            .collect();

        Ok(Self { pubkeys })
    }

    pub fn contains(&self, pubkey: &str) -> bool {
        self.pubkeys.iter().any(|p| p == pubkey)
    }
}
