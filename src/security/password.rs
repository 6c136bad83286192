use bcrypt::{hash, verify, BcryptError, DEFAULT_COST};

/// Hashes a plaintext credential with bcrypt at the default cost (12).
///
/// The salt and cost factor are embedded in the returned string; the hash is
/// replaced wholesale on password change and never decrypted. Fails only if
/// the entropy source does.
pub fn hash_password(plaintext: &str) -> Result<String, BcryptError> {
    hash(plaintext, DEFAULT_COST)
}

/// Compares a plaintext against a stored bcrypt hash.
///
/// An unparseable stored hash counts as a mismatch rather than an error:
/// callers only ever learn "matched" or "did not match".
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    verify(plaintext, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let hashed = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hashed));
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let hashed = hash_password("s3cret").unwrap();
        assert!(!verify_password("s3cret!", &hashed));
        assert!(!verify_password("", &hashed));
    }

    #[test]
    fn two_hashes_of_same_password_differ() {
        // per-hash salt
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a));
        assert!(verify_password("same", &b));
    }

    #[test]
    fn garbage_stored_hash_is_a_mismatch() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }

    #[test]
    fn cost_factor_is_embedded_and_adaptive() {
        let hashed = hash_password("pw").unwrap();
        // "$2b$12$...": cost lives in the second field
        let cost: u32 = hashed.split('$').nth(2).unwrap().parse().unwrap();
        assert!(cost >= 10);
    }
}
