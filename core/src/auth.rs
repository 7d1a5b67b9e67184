use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a letter's public id: `ltr_` + 16 random bytes hex-encoded.
/// The id doubles as the read capability for the letter, so it must come
/// from a cryptographic RNG and never from a sequence.
pub fn generate_public_id() -> String {
    format!("ltr_{}", random_hex(16))
}

/// True if a string has the shape of a letter public id. Cheap gate before
/// hitting the store with garbage lookups.
pub fn is_public_id(candidate: &str) -> bool {
    candidate
        .strip_prefix("ltr_")
        .is_some_and(|rest| rest.len() == 32 && rest.chars().all(|c| c.is_ascii_hexdigit()))
}

/// SHA-256 hex digest of a token string. Sessions store this digest, never
/// the token itself.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| format!("Failed to hash password: {e}"))
}

/// Verify a password against an Argon2id hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(hash).map_err(|e| format!("Invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Generate `n` random bytes and return as hex string.
fn random_hex(n: usize) -> String {
    let bytes: Vec<u8> = (0..n).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex::encode(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_id_has_the_expected_shape() {
        let id = generate_public_id();
        assert!(id.starts_with("ltr_"));
        assert_eq!(id.len(), 4 + 32);
        assert!(is_public_id(&id));
    }

    #[test]
    fn public_ids_do_not_collide_in_a_small_sample() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_public_id()));
        }
    }

    #[test]
    fn public_id_shape_check_rejects_near_misses() {
        assert!(!is_public_id("ltr_short"));
        assert!(!is_public_id("sess_0123456789abcdef0123456789abcdef"));
        assert!(!is_public_id(
            "ltr_0123456789abcdef0123456789abcdeZ" // non-hex tail
        ));
    }

    #[test]
    fn token_hash_is_deterministic() {
        let token = "some.jwt.token";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), hash_token("other.jwt.token"));
    }

    #[test]
    fn password_roundtrip() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }
}
