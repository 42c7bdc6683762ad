//! Signed, time-limited identity tokens (HS256 JWT).
//!
//! [`TokenIssuer`] is built once at startup from the configured secret and
//! validity window, and handed to the gateway. `issue` embeds the user id,
//! username and email plus issued-at/expiry claims; `verify` accepts either a
//! raw token or a `Bearer `-prefixed header value and returns the user id.
//!
//! Verification fails closed: an expired, tampered or malformed token all
//! collapse into the single [`InvalidToken`] outcome, so a caller learns
//! nothing about *why* a token was rejected.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by every issued token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Owning user id.
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// The single rejection outcome for any unverifiable token.
#[derive(Debug, thiserror::Error)]
#[error("Invalid token")]
pub struct InvalidToken;

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // No clock leeway: an expired token is expired.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: ttl_secs as i64,
        }
    }

    /// Issue a token asserting the given identity, valid for the configured window.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(user_id, username, email, Utc::now().timestamp())
    }

    fn issue_at(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        iat: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id.to_owned(),
            username: username.to_owned(),
            email: email.to_owned(),
            iat,
            exp: iat + self.ttl_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verify a presented token and return the asserted user id.
    ///
    /// Accepts the raw token or a `Bearer <token>` header value.
    pub fn verify(&self, presented: &str) -> Result<String, InvalidToken> {
        let token = presented.strip_prefix("Bearer ").unwrap_or(presented);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|_| InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("unit-test-secret-0123456789abcdef", 3600)
    }

    #[test]
    fn issue_and_verify_roundtrip() {
        let issuer = issuer();
        let token = issuer.issue("user-1", "ada", "ada@example.com").unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), "user-1");
    }

    #[test]
    fn bearer_prefix_is_accepted() {
        let issuer = issuer();
        let token = issuer.issue("user-1", "ada", "ada@example.com").unwrap();
        let verified = issuer.verify(&format!("Bearer {token}")).unwrap();
        assert_eq!(verified, "user-1");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue("user-1", "ada", "ada@example.com").unwrap();
        let mut tampered = token.clone();
        // Flip a character in the payload segment.
        let dot = tampered.find('.').unwrap() + 1;
        let original = tampered.remove(dot);
        tampered.insert(dot, if original == 'A' { 'B' } else { 'A' });
        assert!(issuer.verify(&tampered).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issuer().issue("user-1", "ada", "ada@example.com").unwrap();
        let other = TokenIssuer::new("a-completely-different-secret!!!", 3600);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let stale_iat = Utc::now().timestamp() - 7200; // expired an hour ago
        let token = issuer
            .issue_at("user-1", "ada", "ada@example.com", stale_iat)
            .unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(issuer().verify("not-a-jwt").is_err());
        assert!(issuer().verify("").is_err());
    }
}
