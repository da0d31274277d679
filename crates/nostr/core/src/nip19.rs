//! NIP-19: bech32-encoded entities.
//!
//! Only the bare key forms are supported: `npub` for public keys and `nsec` for
//! private keys. Both carry exactly 32 bytes of payload.

use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable part for nsec (private key)
pub const NSEC_HRP: &str = "nsec";

/// Human-readable part for npub (public key)
pub const NPUB_HRP: &str = "npub";

#[derive(Debug, Error)]
pub enum Nip19Error {
    #[error("bech32 encoding error: {0}")]
    Bech32Encode(String),

    #[error("bech32 decoding error: {0}")]
    Bech32Decode(String),

    #[error("invalid hrp: expected {expected}, got {got}")]
    InvalidHrp { expected: String, got: String },

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
}

/// Encode a 32-byte private key as an nsec bech32 string.
pub fn private_key_to_nsec(private_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NSEC_HRP, private_key)
}

/// Encode a 32-byte public key as an npub bech32 string.
pub fn public_key_to_npub(public_key: &[u8; 32]) -> Result<String, Nip19Error> {
    encode_bech32(NPUB_HRP, public_key)
}

/// Decode an nsec bech32 string to a 32-byte private key.
pub fn nsec_to_private_key(nsec: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NSEC_HRP, nsec)
}

/// Decode an npub bech32 string to a 32-byte public key.
pub fn npub_to_public_key(npub: &str) -> Result<[u8; 32], Nip19Error> {
    decode_bech32(NPUB_HRP, npub)
}

/// Accept a public key as 64 hex characters or as an `npub1…` string.
///
/// Returns the key as lowercase hex.
pub fn decode_public_key(input: &str) -> Result<String, Nip19Error> {
    let input = input.trim();

    if input.starts_with("npub1") {
        return npub_to_public_key(input).map(hex::encode);
    }

    if input.len() == 64 && input.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(input.to_ascii_lowercase());
    }

    Err(Nip19Error::InvalidKeyFormat(format!(
        "expected 64 hex characters or npub1..., got {:?}",
        input
    )))
}

fn encode_bech32(hrp: &str, data: &[u8; 32]) -> Result<String, Nip19Error> {
    let hrp = Hrp::parse(hrp).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))?;

    bech32::encode::<Bech32>(hrp, data).map_err(|e| Nip19Error::Bech32Encode(e.to_string()))
}

fn decode_bech32(expected_hrp: &str, encoded: &str) -> Result<[u8; 32], Nip19Error> {
    let expected =
        Hrp::parse(expected_hrp).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    let (hrp, data) =
        bech32::decode(encoded).map_err(|e| Nip19Error::Bech32Decode(e.to_string()))?;

    if hrp != expected {
        return Err(Nip19Error::InvalidHrp {
            expected: expected_hrp.to_string(),
            got: hrp.to_string(),
        });
    }

    <[u8; 32]>::try_from(data.as_slice()).map_err(|_| {
        Nip19Error::InvalidKeyFormat(format!("expected 32 bytes, got {}", data.len()))
    })
}
