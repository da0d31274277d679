//! NIP-02: Follow List (Contact List and Petnames)
//!
//! Defines how users publish their follow/contact lists as kind 3 events.
//! Each followed profile is represented by a "p" tag with optional relay URL and petname.
//!
//! Older clients also stored the author's relay list in the `content` field as a
//! JSON object mapping relay URL to `{"read": bool, "write": bool}`. That map is
//! exposed as [`RelayCapabilities`] and kept verbatim, so re-serializing it
//! produces whatever shape the client originally wrote.
//!
//! See: <https://github.com/nostr-protocol/nips/blob/master/02.md>

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Event kind for contact lists (follow lists)
pub const CONTACT_LIST_KIND: u16 = 3;

/// Errors that can occur during NIP-02 operations
#[derive(Debug, Error)]
pub enum Nip02Error {
    #[error("invalid p-tag format: {0}")]
    InvalidPTag(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid relay list content: {0}")]
    InvalidContent(String),
}

/// A single contact in a follow list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// The public key of the followed profile (32-byte hex)
    pub pubkey: String,

    /// Optional relay URL where this profile can be found
    pub relay_url: Option<String>,

    /// Optional local petname for this contact
    pub petname: Option<String>,
}

impl Contact {
    /// Create a new contact with just a public key
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            relay_url: None,
            petname: None,
        }
    }

    /// Create a contact with a relay URL; an empty URL means no hint
    pub fn with_relay(pubkey: impl Into<String>, relay_url: impl Into<String>) -> Self {
        let relay_url = relay_url.into();
        Self {
            pubkey: pubkey.into(),
            relay_url: (!relay_url.is_empty()).then_some(relay_url),
            petname: None,
        }
    }

    /// Convert contact to a p-tag array.
    ///
    /// Contacts without a relay hint produce the two-element form `["p", pubkey]`.
    pub fn to_tag(&self) -> Vec<String> {
        let mut tag = vec!["p".to_string(), self.pubkey.clone()];

        match (&self.relay_url, &self.petname) {
            (Some(relay), Some(petname)) => {
                tag.push(relay.clone());
                tag.push(petname.clone());
            }
            (Some(relay), None) => tag.push(relay.clone()),
            (None, Some(petname)) => {
                tag.push(String::new());
                tag.push(petname.clone());
            }
            (None, None) => {}
        }

        tag
    }

    /// Parse a contact from a p-tag array
    pub fn from_tag(tag: &[String]) -> Result<Self, Nip02Error> {
        if tag.is_empty() || tag[0] != "p" {
            return Err(Nip02Error::InvalidPTag(
                "tag must start with 'p'".to_string(),
            ));
        }

        if tag.len() < 2 {
            return Err(Nip02Error::InvalidPTag(
                "p-tag must have at least pubkey".to_string(),
            ));
        }

        let pubkey = tag[1].clone();

        if pubkey.len() != 64 || !pubkey.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Nip02Error::InvalidPublicKey(format!(
                "pubkey must be 64-character hex, got: {}",
                pubkey
            )));
        }

        let relay_url = tag.get(2).filter(|r| !r.is_empty()).cloned();
        let petname = tag.get(3).filter(|p| !p.is_empty()).cloned();

        Ok(Self {
            pubkey,
            relay_url,
            petname,
        })
    }
}

/// Read/write declaration for one relay, kept as the raw JSON the author published.
///
/// Accessors follow JavaScript truthiness, which is how clients that wrote
/// these maps interpret them: `{"write": 1}` is writable, `{"write": ""}` is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayCapability(pub Value);

impl RelayCapability {
    pub fn new(read: bool, write: bool) -> Self {
        Self(serde_json::json!({ "read": read, "write": write }))
    }

    pub fn can_read(&self) -> bool {
        self.flag("read")
    }

    pub fn can_write(&self) -> bool {
        self.flag("write")
    }

    fn flag(&self, name: &str) -> bool {
        match self.0.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }
}

/// Relay URL to capability, in the order the keys appeared in the content.
pub type RelayCapabilities = IndexMap<String, RelayCapability>;

/// Parse the legacy relay map stored in a kind 3 `content` field.
///
/// Empty content yields an empty map. Anything that is not a JSON object is an error.
pub fn parse_relay_capabilities(content: &str) -> Result<RelayCapabilities, Nip02Error> {
    if content.is_empty() {
        return Ok(RelayCapabilities::new());
    }

    let value: Value =
        serde_json::from_str(content).map_err(|e| Nip02Error::InvalidContent(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(url, cap)| (url, RelayCapability(cap)))
            .collect()),
        other => Err(Nip02Error::InvalidContent(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tag(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_contact_with_relay() {
        let contact = Contact::with_relay("a".repeat(64), "wss://relay.example.com");
        assert_eq!(contact.relay_url.as_deref(), Some("wss://relay.example.com"));

        let contact = Contact::with_relay("a".repeat(64), "");
        assert_eq!(contact.relay_url, None);
    }

    #[test]
    fn test_contact_to_tag() {
        let pubkey = "a".repeat(64);
        assert_eq!(Contact::new(&pubkey).to_tag(), tag(&["p", &pubkey]));
        assert_eq!(
            Contact::with_relay(&pubkey, "wss://r.example").to_tag(),
            tag(&["p", &pubkey, "wss://r.example"])
        );
    }

    #[test]
    fn test_contact_from_tag() {
        let pubkey = "b".repeat(64);
        let contact = Contact::from_tag(&tag(&["p", &pubkey, "wss://r.example", "bob"])).unwrap();
        assert_eq!(contact.pubkey, pubkey);
        assert_eq!(contact.relay_url.as_deref(), Some("wss://r.example"));
        assert_eq!(contact.petname.as_deref(), Some("bob"));
    }

    #[test]
    fn test_contact_from_tag_empty_relay() {
        let pubkey = "c".repeat(64);
        let contact = Contact::from_tag(&tag(&["p", &pubkey, ""])).unwrap();
        assert_eq!(contact.relay_url, None);
    }

    #[test]
    fn test_contact_from_tag_invalid_pubkey() {
        let result = Contact::from_tag(&tag(&["p", "not-a-key"]));
        assert!(matches!(result, Err(Nip02Error::InvalidPublicKey(_))));

        let result = Contact::from_tag(&tag(&["p"]));
        assert!(matches!(result, Err(Nip02Error::InvalidPTag(_))));
    }

    #[test]
    fn test_parse_relay_capabilities_keeps_order_and_shape() {
        let content = r#"{"wss://b.example":{"read":true,"write":false},"wss://a.example":{"write":true,"read":true,"extra":1}}"#;
        let relays = parse_relay_capabilities(content).unwrap();

        let urls: Vec<&str> = relays.keys().map(String::as_str).collect();
        assert_eq!(urls, vec!["wss://b.example", "wss://a.example"]);

        assert!(!relays["wss://b.example"].can_write());
        assert!(relays["wss://a.example"].can_write());

        assert_eq!(serde_json::to_string(&relays).unwrap(), content);
    }

    #[test]
    fn test_parse_relay_capabilities_empty_and_invalid() {
        assert!(parse_relay_capabilities("").unwrap().is_empty());
        assert!(parse_relay_capabilities("{}").unwrap().is_empty());
        assert!(matches!(
            parse_relay_capabilities("not json"),
            Err(Nip02Error::InvalidContent(_))
        ));
        assert!(matches!(
            parse_relay_capabilities("[1,2]"),
            Err(Nip02Error::InvalidContent(_))
        ));
    }

    #[test]
    fn test_capability_truthiness() {
        let cap = |v: Value| RelayCapability(v);
        assert!(cap(serde_json::json!({"write": 1})).can_write());
        assert!(!cap(serde_json::json!({"write": 0})).can_write());
        assert!(!cap(serde_json::json!({"write": ""})).can_write());
        assert!(cap(serde_json::json!({"write": "yes"})).can_write());
        assert!(!cap(serde_json::json!({"read": true})).can_write());
        assert!(!cap(serde_json::json!(true)).can_write());
        assert!(RelayCapability::new(true, false).can_read());
    }
}
