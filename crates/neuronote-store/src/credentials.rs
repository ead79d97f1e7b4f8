//! Password hashing, bearer tokens and document keys.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::{Digest, Sha256};

use neuronote_core::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::WeakPassword {
            min_len: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Argon2id hash in PHC string form.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Verified against when a login names an unknown user, so that path costs
/// the same as a wrong password.
pub(crate) static DUMMY_PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| hash_password(&generate_token()).unwrap_or_default());

/// False for a wrong password and for an unparseable stored hash.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// 256 random bits, hex encoded. Handed to the client once and never stored.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The stored form of a token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn generate_document_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn test_dummy_hash_is_a_real_hash() {
        assert!(PasswordHash::new(&DUMMY_PASSWORD_HASH).is_ok());
        assert!(!verify_password("password123", &DUMMY_PASSWORD_HASH));
        assert!(!verify_password("", &DUMMY_PASSWORD_HASH));
    }

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("12345678").is_ok());
        assert!(matches!(
            check_password_strength("short"),
            Err(Error::WeakPassword { min_len: 8 })
        ));
    }

    #[test]
    fn test_tokens_are_unique_and_hashed() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    #[test]
    fn test_document_keys_unique() {
        let a = generate_document_key();
        assert_eq!(a.len(), 32);
        assert_ne!(a, generate_document_key());
    }
}
