//! Key generation, rendering, and hashing for the access-key registry (§4.D).

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore;

use crate::error::{CoreError, Result};

const KEY_BYTES: usize = 32;
const PREFIX_CHARS: usize = 12;

/// A freshly minted key: the plaintext string returned to the caller once,
/// plus its short display prefix and its hash for storage.
pub struct IssuedKey {
    pub plaintext: String,
    pub prefix: String,
    pub hash: String,
}

/// Generate 32 random bytes from the CSPRNG and render them as
/// `ab_<12-char-prefix>_<payload>` (§4.D). The prefix is cleartext and
/// safe to log; the payload is never stored.
pub fn issue_key() -> Result<IssuedKey> {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let payload = URL_SAFE_NO_PAD.encode(bytes);
    let prefix: String = payload.chars().take(PREFIX_CHARS).collect();
    let plaintext = format!("ab_{prefix}_{payload}");
    let hash = hash_key(&plaintext)?;
    Ok(IssuedKey {
        plaintext,
        prefix: format!("ab_{prefix}"),
        hash,
    })
}

/// Hash a presented key with argon2id for storage (§4.D: "argon2id or
/// bcrypt with cost ≥ 10").
pub fn hash_key(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CoreError::Internal(format!("failed to hash access key: {e}")))
}

/// Verify a presented key against its stored hash.
pub fn verify_key(plaintext: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| CoreError::Internal(format!("stored access key hash is malformed: {e}")))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/// Extract the cleartext prefix a presented key claims, for a fast
/// pre-filter before the (slower) argon2 verification.
pub fn prefix_of(plaintext: &str) -> Option<&str> {
    let mut parts = plaintext.splitn(3, '_');
    let (tag, prefix) = (parts.next()?, parts.next()?);
    if tag != "ab" {
        return None;
    }
    let end = tag.len() + 1 + prefix.len();
    Some(&plaintext[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_key_has_expected_shape() {
        let issued = issue_key().unwrap();
        assert!(issued.plaintext.starts_with("ab_"));
        assert!(issued.prefix.starts_with("ab_"));
        assert!(verify_key(&issued.plaintext, &issued.hash).unwrap());
    }

    #[test]
    fn wrong_key_does_not_verify() {
        let issued = issue_key().unwrap();
        let other = issue_key().unwrap();
        assert!(!verify_key(&other.plaintext, &issued.hash).unwrap());
    }

    #[test]
    fn prefix_of_extracts_the_display_prefix() {
        let issued = issue_key().unwrap();
        assert_eq!(prefix_of(&issued.plaintext), Some(issued.prefix.as_str()));
    }

    #[test]
    fn two_issued_keys_never_collide() {
        let a = issue_key().unwrap();
        let b = issue_key().unwrap();
        assert_ne!(a.plaintext, b.plaintext);
    }
}
