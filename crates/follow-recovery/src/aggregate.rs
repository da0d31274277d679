//! Reconciliation of follow lists gathered from many relays.
//!
//! Every relay may hold a different, possibly stale copy of the author's kind 3
//! record. [`AggregationState`] merges them: members are deduplicated by public
//! key in discovery order, each member keeps the relay hint from the newest record
//! that carried one, the first relay map seen for a URL wins, and kind 10000
//! records feed a mute set that is applied when the output is built.
//!
//! The merge operations are plain functions over `&mut AggregationState`.
//! [`Aggregator`] wraps the state in a mutex so pool events from any number of
//! connections are applied one at a time.

use indexmap::{IndexMap, IndexSet};
use nostr::{
    CONTACT_LIST_KIND, Contact, Event, MUTE_LIST_KIND, MuteList, RelayCapabilities,
    parse_relay_capabilities,
};
use nostr_client::PoolEvent;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One followed identity and the best known relay for reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEntry {
    pub member_id: String,
    pub relay_hint: Option<String>,
    /// `created_at` of the record that supplied `relay_hint`
    pub hint_recency: Option<u64>,
}

impl MembershipEntry {
    fn new(member_id: String) -> Self {
        Self {
            member_id,
            relay_hint: None,
            hint_recency: None,
        }
    }

    /// Consider a hint from a record created at `created_at`.
    ///
    /// The first hint is taken whatever its timestamp; after that a hint only
    /// replaces the current one when its record is strictly newer.
    fn offer_hint(&mut self, hint: &str, created_at: u64) -> bool {
        let adopt = match (&self.relay_hint, self.hint_recency) {
            (None, _) => true,
            (Some(_), Some(recency)) => created_at > recency,
            (Some(_), None) => true,
        };
        if adopt {
            self.relay_hint = Some(hint.to_string());
            self.hint_recency = Some(created_at);
        }
        adopt
    }
}

/// Counters for one merged contact list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// All tags on the record, `p` or not
    pub tags: usize,
    /// Members seen for the first time
    pub added: usize,
    /// Relay URLs seen for the first time
    pub relays_added: usize,
}

/// What [`AggregationState::apply`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    ContactList(MergeStats),
    MuteList { muted: usize },
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationState {
    pub members: IndexMap<String, MembershipEntry>,
    pub relays: RelayCapabilities,
    pub muted: IndexSet<String>,
    pub opened: IndexSet<String>,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_opened(&mut self, relay_url: &str) {
        self.opened.insert(relay_url.to_string());
    }

    /// Merge a kind 3 record.
    ///
    /// Unparsable content and malformed `p` tags are logged and skipped; the rest
    /// of the record is still merged.
    pub fn apply_contact_list(&mut self, event: &Event) -> MergeStats {
        let mut stats = MergeStats {
            tags: event.tags.len(),
            ..Default::default()
        };

        match parse_relay_capabilities(&event.content) {
            Ok(relays) => {
                for (url, capability) in relays {
                    if !self.relays.contains_key(&url) {
                        self.relays.insert(url, capability);
                        stats.relays_added += 1;
                    }
                }
            }
            Err(e) => warn!("Skipping relay map in {}: {}", event.id, e),
        }

        for tag in &event.tags {
            if tag.first().map(String::as_str) != Some("p") {
                continue;
            }

            let contact = match Contact::from_tag(tag) {
                Ok(contact) => contact,
                Err(e) => {
                    warn!("Skipping tag {:?} in {}: {}", tag, event.id, e);
                    continue;
                }
            };

            let entry = self
                .members
                .entry(contact.pubkey.clone())
                .or_insert_with(|| {
                    stats.added += 1;
                    MembershipEntry::new(contact.pubkey.clone())
                });

            if let Some(hint) = &contact.relay_url {
                entry.offer_hint(hint, event.created_at);
            }
        }

        stats
    }

    /// Merge a kind 10000 record. Returns how many identities were newly muted.
    pub fn apply_mute_list(&mut self, event: &Event) -> usize {
        match MuteList::from_event(event) {
            Ok(list) => list
                .pubkeys
                .into_iter()
                .filter(|pk| self.muted.insert(pk.clone()))
                .count(),
            Err(e) => {
                warn!("Skipping mute list {}: {}", event.id, e);
                0
            }
        }
    }

    /// Route a record by kind, ignoring anything not authored by `author`.
    pub fn apply(&mut self, author: &str, event: &Event) -> Applied {
        if event.pubkey != author {
            return Applied::Ignored;
        }

        match event.kind {
            CONTACT_LIST_KIND => Applied::ContactList(self.apply_contact_list(event)),
            MUTE_LIST_KIND => Applied::MuteList {
                muted: self.apply_mute_list(event),
            },
            _ => Applied::Ignored,
        }
    }

    /// Members that survive the mute set, in discovery order.
    pub fn visible_members(&self) -> impl Iterator<Item = &MembershipEntry> {
        self.members
            .values()
            .filter(|entry| !self.muted.contains(&entry.member_id))
    }
}

struct Inner {
    state: AggregationState,
    sealed: bool,
}

/// Shared handle that serializes pool events into one [`AggregationState`].
#[derive(Clone)]
pub struct Aggregator {
    author: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl Aggregator {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: Arc::from(author.into()),
            inner: Arc::new(Mutex::new(Inner {
                state: AggregationState::new(),
                sealed: false,
            })),
        }
    }

    /// Apply one pool event. Events arriving after [`Aggregator::finalize`] are dropped.
    pub async fn consume(&self, event: PoolEvent) {
        let mut inner = self.inner.lock().await;
        if inner.sealed {
            debug!("Dropping event from {} after finalization", event.relay_url());
            return;
        }

        match event {
            PoolEvent::Opened { relay_url } => {
                debug!("Open {}", relay_url);
                inner.state.record_opened(&relay_url);
            }
            PoolEvent::Event {
                relay_url, event, ..
            } => match inner.state.apply(&self.author, &event) {
                Applied::ContactList(stats) => {
                    info!(
                        "Found {} tags on {}, added {}",
                        stats.tags, relay_url, stats.added
                    );
                }
                Applied::MuteList { muted } => {
                    info!("Found mute list on {}, added {}", relay_url, muted);
                }
                Applied::Ignored => {
                    debug!(
                        "Ignoring kind {} by {} from {}",
                        event.kind, event.pubkey, relay_url
                    );
                }
            },
            PoolEvent::Notice { relay_url, message } => {
                info!("Notice {}: {}", relay_url, message);
            }
            PoolEvent::Closed { relay_url, reason } => {
                debug!("Close {}: {:?}", relay_url, reason);
            }
            PoolEvent::Eose { relay_url, .. } => {
                debug!("EOSE {}", relay_url);
            }
            PoolEvent::Error { relay_url, error } => {
                debug!("Error {}: {}", relay_url, error);
            }
            PoolEvent::Ok { relay_url, .. } => {
                debug!("Ignoring OK from {} during collection", relay_url);
            }
        }
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> AggregationState {
        self.inner.lock().await.state.clone()
    }

    /// Stop accepting events and return the final state.
    pub async fn finalize(&self) -> AggregationState {
        let mut inner = self.inner.lock().await;
        inner.sealed = true;
        inner.state.clone()
    }
}
