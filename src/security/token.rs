use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::store::UserSnapshot;

/// Claims embedded in every bearer token the service issues.
///
/// The token is the only record of a session: nothing is stored server-side
/// and there is no revocation list. The snapshot carries enough identity for
/// downstream handlers to skip a storage round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user: UserSnapshot,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    /// Expiry (Unix timestamp, seconds). A token with `exp <= now` is dead;
    /// the boundary second counts as expired.
    pub exp: i64,
}

/// Issues and validates HS256 bearer tokens with a process-wide symmetric key.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock grace: the exp boundary must be exact.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Signs `user` into a self-contained token valid for the configured ttl.
    pub fn issue(&self, user: &UserSnapshot) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user: user.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Parses and verifies a token, returning its claims on success.
    ///
    /// Signature mismatch, an unexpected signing algorithm (including
    /// `none`), malformed input, and expiry all collapse to `None`, so callers
    /// cannot distinguish the failure modes.
    pub fn validate(&self, token: &str) -> Option<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).ok()?;
        if Utc::now().timestamp() >= data.claims.exp {
            return None;
        }
        Some(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use uuid::Uuid;

    fn snapshot() -> UserSnapshot {
        UserSnapshot {
            id: Uuid::new_v4(),
            name: "Admin".to_string(),
            username: "admin".to_string(),
            email: "admin@example.com".to_string(),
            phone_number: "0800000000".to_string(),
            role: "user".to_string(),
        }
    }

    fn service(ttl_secs: i64) -> TokenService {
        TokenService::new("unit-test-secret", Duration::seconds(ttl_secs))
    }

    #[test]
    fn issue_then_validate_returns_the_snapshot() {
        let svc = service(600);
        let user = snapshot();
        let token = svc.issue(&user).unwrap();

        let claims = svc.validate(&token).expect("fresh token must validate");
        assert_eq!(claims.user.id, user.id);
        assert_eq!(claims.user.username, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_is_three_part_compact_form() {
        let svc = service(600);
        let token = svc.issue(&snapshot()).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn zero_ttl_token_is_expired_on_arrival() {
        // exp == now: the boundary counts as expired
        let svc = service(0);
        let token = svc.issue(&snapshot()).unwrap();
        assert!(svc.validate(&token).is_none());
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let issuer = TokenService::new("key-a", Duration::minutes(10));
        let verifier = TokenService::new("key-b", Duration::minutes(10));
        let token = issuer.issue(&snapshot()).unwrap();
        assert!(verifier.validate(&token).is_none());
    }

    #[test]
    fn tampered_last_character_is_rejected() {
        let svc = service(600);
        let mut token = svc.issue(&snapshot()).unwrap();
        let last = token.pop().unwrap();
        token.push(if last == 'A' { 'B' } else { 'A' });
        assert!(svc.validate(&token).is_none());
    }

    #[test]
    fn unsigned_none_token_is_rejected() {
        let svc = service(600);
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = serde_json::json!({
            "user": snapshot(),
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 3600,
        });
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        assert!(svc.validate(&format!("{header}.{payload}.")).is_none());
    }

    #[test]
    fn other_hmac_family_member_is_rejected() {
        // Same secret, HS384 header: the algorithm is pinned, not the family.
        let claims = Claims {
            user: snapshot(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        assert!(service(600).validate(&token).is_none());
    }

    #[test]
    fn garbage_input_is_rejected_not_an_error() {
        let svc = service(600);
        assert!(svc.validate("").is_none());
        assert!(svc.validate("not.a.jwt").is_none());
        assert!(svc.validate("onlyonepart").is_none());
    }
}
