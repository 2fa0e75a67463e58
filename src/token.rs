// SPDX-License-Identifier: Apache-2.0

//! Possession tokens: generation, hashing, verification.
//!
//! A token is the only proof of authorship on the platform. It is shown to
//! the author exactly once at submission time; only its Argon2id hash is
//! stored, so there is no path from a database row back to the plaintext.

use argon2::{
    password_hash::{rand_core::OsRng as HashRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Token length in hex characters (20 random bytes).
pub const TOKEN_LEN: usize = 40;

/// Length of the rate-limit fingerprint in hex characters.
const FINGERPRINT_LEN: usize = 16;

/// Generate a fresh possession token: 20 CSPRNG bytes as lowercase hex.
pub fn generate_edit_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token for storage. A fresh random salt is drawn per call, so the
/// same token never hashes to the same string twice.
pub fn hash_token(token: &str) -> Result<String> {
    let salt = SaltString::generate(&mut HashRng);
    Argon2::default()
        .hash_password(token.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("token hashing failed: {e}")))
}

/// Verify a token against a stored hash.
///
/// A mismatch is `Ok(false)`, never an error; only a malformed stored hash
/// fails.
pub fn verify_token(token: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("malformed token hash in storage: {e}")))?;
    match Argon2::default().verify_password(token.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("token verification failed: {e}"))),
    }
}

/// Surface-format check: exactly 40 lowercase hex characters. Run before any
/// storage work so malformed lookups stay cheap.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Non-reversible rate-limit identifier for a token. Keeps the plaintext out
/// of the limiter's map and out of the logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)[..FINGERPRINT_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let a = generate_edit_token();
        let b = generate_edit_token();
        assert_eq!(a.len(), TOKEN_LEN);
        assert!(is_well_formed(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn hash_verifies_own_token_and_rejects_others() {
        let token = generate_edit_token();
        let hash = hash_token(&token).unwrap();
        assert!(verify_token(&token, &hash).unwrap());
        assert!(!verify_token(&generate_edit_token(), &hash).unwrap());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let token = generate_edit_token();
        let first = hash_token(&token).unwrap();
        let second = hash_token(&token).unwrap();
        assert_ne!(first, second);
        assert!(verify_token(&token, &second).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error_not_a_mismatch() {
        assert!(verify_token("whatever", "not-a-phc-string").is_err());
    }

    #[test]
    fn surface_format_rejects_case_length_and_charset() {
        assert!(is_well_formed(&"a".repeat(40)));
        assert!(!is_well_formed(&"A".repeat(40)));
        assert!(!is_well_formed(&"a".repeat(39)));
        assert!(!is_well_formed(&"g".repeat(40)));
        assert!(!is_well_formed("not-40-hex"));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let token = generate_edit_token();
        assert_eq!(fingerprint(&token), fingerprint(&token));
        assert_eq!(fingerprint(&token).len(), 16);
        assert_ne!(fingerprint(&token), token[..16].to_string());
    }
}
