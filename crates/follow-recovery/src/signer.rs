//! Signing the merged record, locally or through the browser.

use crate::browser::{self, BrowserError, BrowserOptions};
use async_trait::async_trait;
use nostr::{Event, Nip01Error, UnsignedEvent, sign_event, verify_event};
use std::fmt;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("local signing failed: {0}")]
    Local(#[from] Nip01Error),

    #[error("browser signing failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("signed event rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait EventSigner: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    /// Produce a signed event that passes [`check_signed`] against `unsigned`.
    async fn sign(&self, unsigned: &UnsignedEvent) -> Result<Event, SignError>;
}

/// Signs with a secret key held in memory. Never touches the network.
pub struct LocalSigner {
    secret_key: [u8; 32],
}

impl LocalSigner {
    pub fn new(secret_key: [u8; 32]) -> Self {
        Self { secret_key }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("secret_key", &"[redacted]")
            .finish()
    }
}

#[async_trait]
impl EventSigner for LocalSigner {
    fn name(&self) -> &'static str {
        "local key"
    }

    async fn sign(&self, unsigned: &UnsignedEvent) -> Result<Event, SignError> {
        let event = sign_event(unsigned, &self.secret_key)?;
        check_signed(unsigned, &event)?;
        Ok(event)
    }
}

/// Hands the record to a browser page (extension or NIP-46) and waits for it to come back signed.
#[derive(Debug, Clone)]
pub struct BrowserSigner {
    options: BrowserOptions,
}

impl BrowserSigner {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl EventSigner for BrowserSigner {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn sign(&self, unsigned: &UnsignedEvent) -> Result<Event, SignError> {
        info!("No private key configured, signing via browser");
        let event = browser::request_signature(unsigned, &self.options).await?;
        check_signed(unsigned, &event)?;
        Ok(event)
    }
}

/// Prefer a local key; fall back to the browser.
pub fn select_signer(
    secret_key: Option<[u8; 32]>,
    options: BrowserOptions,
) -> Box<dyn EventSigner> {
    match secret_key {
        Some(key) => Box::new(LocalSigner::new(key)),
        None => Box::new(BrowserSigner::new(options)),
    }
}

/// Accept `event` only if it is a validly signed copy of `unsigned`.
///
/// The timestamp may differ, since some signers restamp what they sign.
pub fn check_signed(unsigned: &UnsignedEvent, event: &Event) -> Result<(), SignError> {
    if event.pubkey != unsigned.pubkey {
        return Err(SignError::Rejected(format!(
            "signed by {}, expected {}",
            event.pubkey, unsigned.pubkey
        )));
    }

    if event.kind != unsigned.kind || event.tags != unsigned.tags || event.content != unsigned.content
    {
        return Err(SignError::Rejected(
            "signer returned a different event".to_string(),
        ));
    }

    match verify_event(event) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SignError::Rejected("invalid id or signature".to_string())),
        Err(e) => Err(SignError::Rejected(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nostr::{generate_secret_key, get_public_key_hex};

    fn unsigned_for(pubkey: String) -> UnsignedEvent {
        UnsignedEvent {
            pubkey,
            created_at: 1700000000,
            kind: 3,
            tags: vec![vec!["p".to_string(), "a".repeat(64)]],
            content: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn local_signer_produces_verifiable_event() {
        let key = generate_secret_key();
        let unsigned = unsigned_for(get_public_key_hex(&key).unwrap());

        let signer = LocalSigner::new(key);
        let event = signer.sign(&unsigned).await.unwrap();

        assert_eq!(event.unsigned(), unsigned);
        assert!(verify_event(&event).unwrap());
    }

    #[tokio::test]
    async fn local_signer_rejects_other_author() {
        let signer = LocalSigner::new(generate_secret_key());
        let result = signer.sign(&unsigned_for("b".repeat(64))).await;
        assert!(matches!(result, Err(SignError::Local(Nip01Error::KeyMismatch { .. }))));
    }

    #[test]
    fn check_signed_catches_tampering() {
        let key = generate_secret_key();
        let unsigned = unsigned_for(get_public_key_hex(&key).unwrap());
        let event = sign_event(&unsigned, &key).unwrap();
        assert!(check_signed(&unsigned, &event).is_ok());

        let mut bad_sig = event.clone();
        bad_sig.sig = "0".repeat(128);
        assert!(matches!(
            check_signed(&unsigned, &bad_sig),
            Err(SignError::Rejected(_))
        ));

        let mut other_tags = unsigned.clone();
        other_tags.tags.clear();
        assert!(check_signed(&other_tags, &event).is_err());

        let other_author = unsigned_for("c".repeat(64));
        assert!(check_signed(&other_author, &event).is_err());
    }

    #[test]
    fn select_signer_prefers_local_key() {
        let options = BrowserOptions::default();
        assert_eq!(
            select_signer(Some(generate_secret_key()), options.clone()).name(),
            "local key"
        );
        assert_eq!(select_signer(None, options).name(), "browser");
    }

    #[test]
    fn local_signer_debug_hides_key() {
        let signer = LocalSigner::new([7u8; 32]);
        assert!(!format!("{:?}", signer).contains("7, 7"));
    }
}
