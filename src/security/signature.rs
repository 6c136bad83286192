use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

// SHA-256("{service}:{secret}:{request_at}") → x-api-key (hex)

pub fn compute_signature(service_name: &str, secret: &str, request_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(service_name.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(request_at.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies the per-request service signature against the shared secret.
///
/// The secret is injected once at startup and never changes for the life of
/// the process. Verification is a pure function of its inputs: no I/O, and
/// every failure mode is `false`, never an error.
#[derive(Debug, Clone)]
pub struct SignatureGate {
    secret: String,
}

impl SignatureGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Returns true only when `presented` equals the expected digest for
    /// (`service_name`, `request_at`). Comparison is constant-time; an empty
    /// secret or empty presented hash always fails.
    pub fn verify(&self, service_name: &str, request_at: &str, presented: &str) -> bool {
        if self.secret.is_empty() || presented.is_empty() {
            return false;
        }
        let expected = compute_signature(service_name, &self.secret, request_at);
        expected.as_bytes().ct_eq(presented.as_bytes()).unwrap_u8() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_signature() {
        let gate = SignatureGate::new("shared-secret");
        let presented = compute_signature("billing", "shared-secret", "1733000000");
        assert!(gate.verify("billing", "1733000000", &presented));
    }

    #[test]
    fn rejects_any_mutated_input() {
        let gate = SignatureGate::new("shared-secret");
        let presented = compute_signature("billing", "shared-secret", "1733000000");

        assert!(!gate.verify("billing2", "1733000000", &presented));
        assert!(!gate.verify("billing", "1733000001", &presented));

        let mut tampered = presented.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });
        assert!(!gate.verify("billing", "1733000000", &tampered));

        let other_key = SignatureGate::new("other-secret");
        assert!(!other_key.verify("billing", "1733000000", &presented));
    }

    #[test]
    fn rejects_empty_secret_or_hash() {
        let gate = SignatureGate::new("");
        let presented = compute_signature("billing", "", "1733000000");
        assert!(!gate.verify("billing", "1733000000", &presented));

        let gate = SignatureGate::new("shared-secret");
        assert!(!gate.verify("billing", "1733000000", ""));
    }

    #[test]
    fn signature_is_lowercase_hex_of_expected_shape() {
        let sig = compute_signature("svc", "key", "ts");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
