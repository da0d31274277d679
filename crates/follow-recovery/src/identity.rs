//! Parsing the author's public key and an optional secret key from user input.

use nostr::{Nip01Error, Nip19Error, decode_public_key, get_public_key_hex, nsec_to_private_key};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid public key: {0}")]
    PublicKey(#[from] Nip19Error),

    #[error("invalid private key: {0}")]
    SecretKey(String),

    #[error("private key belongs to {key_owner}, not to the author {author}")]
    KeyMismatch { author: String, key_owner: String },
}

/// Resolve an author given as 64 hex characters or `npub1…` to lowercase hex.
pub fn resolve_author(input: &str) -> Result<String, IdentityError> {
    Ok(decode_public_key(input)?)
}

/// Resolve a secret key given as 64 hex characters or `nsec1…`.
pub fn resolve_secret_key(input: &str) -> Result<[u8; 32], IdentityError> {
    let input = input.trim();

    let key = if input.starts_with("nsec1") {
        nsec_to_private_key(input).map_err(|e| IdentityError::SecretKey(e.to_string()))?
    } else {
        let bytes = hex::decode(input).map_err(|e| IdentityError::SecretKey(e.to_string()))?;
        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
            IdentityError::SecretKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?
    };

    // Rejects zero and out-of-range scalars
    public_key_of(&key)?;
    Ok(key)
}

/// The hex public key belonging to `secret_key`.
pub fn public_key_of(secret_key: &[u8; 32]) -> Result<String, IdentityError> {
    get_public_key_hex(secret_key).map_err(|e: Nip01Error| IdentityError::SecretKey(e.to_string()))
}

/// Fail unless `secret_key` is the author's own key.
pub fn check_key_owner(author: &str, secret_key: &[u8; 32]) -> Result<(), IdentityError> {
    let key_owner = public_key_of(secret_key)?;
    if key_owner != author {
        return Err(IdentityError::KeyMismatch {
            author: author.to_string(),
            key_owner,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NPUB: &str = "npub1zutzeysacnf9rru6zqwmxd54mud0k44tst6l70ja5mhv8jjumytsd2x7nu";
    const NPUB_HEX: &str = "17162c921dc4d2518f9a101db33695df1afb56ab82f5ff3e5da6eec3ca5cd917";
    const NSEC: &str = "nsec10allq0gjx7fddtzef0ax00mdps9t2kmtrldkyjfs8l5xruwvh2dq0lhhkp";
    const NSEC_HEX: &str = "7f7ff03d123792d6ac594bfa67bf6d0c0ab55b6b1fdb6249303fe861f1ccba9a";

    #[test]
    fn author_from_npub_or_hex() {
        assert_eq!(resolve_author(NPUB).unwrap(), NPUB_HEX);
        assert_eq!(resolve_author(&NPUB_HEX.to_uppercase()).unwrap(), NPUB_HEX);
    }

    #[test]
    fn malformed_author_is_rejected() {
        assert!(matches!(
            resolve_author("npub1short"),
            Err(IdentityError::PublicKey(_))
        ));
        assert!(resolve_author(NSEC).is_err());
        assert!(resolve_author("").is_err());
    }

    #[test]
    fn secret_key_from_nsec_or_hex() {
        let from_nsec = resolve_secret_key(NSEC).unwrap();
        let from_hex = resolve_secret_key(NSEC_HEX).unwrap();
        assert_eq!(from_nsec, from_hex);
        assert_eq!(hex::encode(from_nsec), NSEC_HEX);
    }

    #[test]
    fn malformed_secret_key_is_rejected() {
        assert!(resolve_secret_key("zz").is_err());
        assert!(resolve_secret_key("abcd").is_err());
        assert!(resolve_secret_key(&"0".repeat(64)).is_err());
        assert!(resolve_secret_key(NPUB).is_err());
    }

    #[test]
    fn public_key_matches_bip340_vectors() {
        // Secret key 1 yields the generator's x coordinate
        let one = resolve_secret_key(&format!("{:064x}", 1)).unwrap();
        assert_eq!(
            public_key_of(&one).unwrap(),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );

        let three = resolve_secret_key(&format!("{:064x}", 3)).unwrap();
        assert_eq!(
            public_key_of(&three).unwrap(),
            "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9"
        );
    }

    #[test]
    fn key_owner_must_be_the_author() {
        let key = resolve_secret_key(NSEC).unwrap();
        let owner = public_key_of(&key).unwrap();
        assert!(check_key_owner(&owner, &key).is_ok());

        let stranger = "a".repeat(64);
        match check_key_owner(&stranger, &key) {
            Err(IdentityError::KeyMismatch { author, key_owner }) => {
                assert_eq!(author, stranger);
                assert_eq!(key_owner, owner);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
