use argon2::password_hash::rand_core::OsRng as PhOsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;

use crate::error::{Result, UserError};

/// Generates a new plaintext API key and its prefix (§6 "API-key format").
/// `system` flags a system-level key, which carries the `awc_system_`
/// prefix instead of the user-scoped `awc_`.
pub fn generate_key(system: bool) -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let prefix = if system { "awc_system_" } else { "awc_" };
    let plaintext = format!("{prefix}{}", hex::encode(bytes));
    (plaintext, prefix.to_string())
}

/// Salted adaptive hash of a plaintext key, stored at rest (§6).
pub fn hash_key(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut PhOsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| UserError::Hash(e.to_string()))
}

/// Verifies a plaintext key against its stored hash.
pub fn verify_key(plaintext: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default().verify_password(plaintext.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_scoped_keys_carry_the_awc_prefix() {
        let (plaintext, prefix) = generate_key(false);
        assert_eq!(prefix, "awc_");
        assert!(plaintext.starts_with("awc_"));
        assert!(!plaintext.starts_with("awc_system_"));
    }

    #[test]
    fn system_keys_carry_the_system_prefix() {
        let (plaintext, prefix) = generate_key(true);
        assert_eq!(prefix, "awc_system_");
        assert!(plaintext.starts_with("awc_system_"));
    }

    #[test]
    fn hash_round_trips_and_rejects_wrong_key() {
        let (plaintext, _) = generate_key(false);
        let hash = hash_key(&plaintext).unwrap();
        assert!(verify_key(&plaintext, &hash));
        assert!(!verify_key("awc_wrong", &hash));
    }
}
