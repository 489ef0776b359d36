use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;

/// Hash a raw password into an Argon2id PHC string.
pub fn hash(password: &[u8]) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password, &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// Check a raw password against a stored PHC string. A stored value that is
/// not a valid PHC string (the system user's placeholder) never matches.
pub fn verify(password: &[u8], stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default().verify_password(password, &parsed).is_ok()
}

/// Run `hash` off the async runtime.
pub async fn hash_blocking(password: Vec<u8>) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash(&password)).await?
}

/// Run `verify` off the async runtime. A panicked worker counts as a mismatch.
pub async fn verify_blocking(password: Vec<u8>, stored: String) -> bool {
    tokio::task::spawn_blocking(move || verify(&password, &stored))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let stored = hash(b"pw1").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify(b"pw1", &stored));
        assert!(!verify(b"wrongpw", &stored));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash(b"same").unwrap(), hash(b"same").unwrap());
    }

    #[test]
    fn placeholder_never_verifies() {
        assert!(!verify(b"!", "!"));
        assert!(!verify(b"", ""));
    }
}
