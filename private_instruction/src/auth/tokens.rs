//! Access-token signing and verification, and refresh-secret generation.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, AccountId},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;

/// Only algorithm accepted for access tokens
pub const ACCESS_TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Refresh secret entropy in bytes (256 bits)
pub const REFRESH_SECRET_BYTES: usize = 32;

/// Issues and verifies access tokens, and mints opaque refresh secrets.
///
/// The signing secret is injected at construction.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_token_ttl: Duration,
}

impl TokenIssuer {
    /// Create a new token issuer
    ///
    /// # Arguments
    ///
    /// * `secret` - Symmetric HMAC signing secret
    /// * `access_token_ttl` - Lifetime of issued access tokens
    pub fn new(secret: &[u8], access_token_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_token_ttl,
        }
    }

    /// Lifetime of issued access tokens
    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    /// Issue a signed access token for an account
    ///
    /// # Errors
    ///
    /// * `AuthError::TokenGeneration` - Signing failed
    pub fn issue_access_token(&self, account_id: AccountId, username: &str) -> AuthResult<String> {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: account_id,
            username: username.to_string(),
            exp: (now + self.access_token_ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::new(ACCESS_TOKEN_ALGORITHM), &claims, &self.encoding)
            .map_err(AuthError::TokenGeneration)
    }

    /// Verify an access token and return its claims
    ///
    /// Rejects tokens with a bad signature, any algorithm other than
    /// [`ACCESS_TOKEN_ALGORITHM`], or a passed expiration. No leeway is granted.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Verification failed
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        let mut validation = Validation::new(ACCESS_TOKEN_ALGORITHM);
        validation.leeway = 0;

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding, &validation)?;
        Ok(token_data.claims)
    }

    /// Read the account id from an access token WITHOUT checking its signature
    /// or expiration.
    ///
    /// Only for routing a refresh request to the right account's sessions before
    /// the refresh secret itself is verified. Never authorize anything with it.
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - The token is not a parsable JWT
    pub fn unsafe_extract_account_id(&self, token: &str) -> AuthResult<AccountId> {
        let mut validation = Validation::new(ACCESS_TOKEN_ALGORITHM);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<AccessTokenClaims>(token, &self.decoding, &validation)?;
        Ok(token_data.claims.sub)
    }

    /// Generate a new opaque refresh secret: 256 random bits, hex encoded
    pub fn issue_refresh_secret(&self) -> String {
        let mut bytes = [0u8; REFRESH_SECRET_BYTES];
        rand::rng().fill(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test_secret_key_for_testing_only_0123456789";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::minutes(15))
    }

    #[test]
    fn test_issue_then_verify() {
        let issuer = issuer();
        let token = issuer.issue_access_token(42, "alice").unwrap();
        let claims = issuer.verify_access_token(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = TokenIssuer::new(SECRET, Duration::minutes(-5));
        let token = expired.issue_access_token(1, "alice").unwrap();

        let err = issuer().verify_access_token(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let other = TokenIssuer::new(b"another_secret_key_of_sufficient_len", Duration::minutes(15));
        let token = other.issue_access_token(1, "alice").unwrap();

        assert!(issuer().verify_access_token(&token).is_err());
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: 1,
            username: "alice".to_string(),
            exp: (now + Duration::minutes(15)).timestamp(),
            iat: now.timestamp(),
        };
        // Same secret, different HMAC variant
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(issuer().verify_access_token(&token).is_err());
    }

    #[test]
    fn test_swapped_header_is_rejected() {
        let issuer = issuer();
        let token = issuer.issue_access_token(1, "alice").unwrap();

        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: 1,
            username: "alice".to_string(),
            exp: (now + Duration::minutes(15)).timestamp(),
            iat: now.timestamp(),
        };
        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let foreign_header = hs384.split('.').next().unwrap();
        let mut parts = token.split('.');
        parts.next();
        let tampered = format!(
            "{}.{}.{}",
            foreign_header,
            parts.next().unwrap(),
            parts.next().unwrap()
        );

        assert!(issuer.verify_access_token(&tampered).is_err());
    }

    #[test]
    fn test_unsafe_extract_reads_expired_token() {
        let expired = TokenIssuer::new(SECRET, Duration::minutes(-60));
        let token = expired.issue_access_token(7, "bob").unwrap();

        assert!(issuer().verify_access_token(&token).is_err());
        assert_eq!(issuer().unsafe_extract_account_id(&token).unwrap(), 7);
    }

    #[test]
    fn test_unsafe_extract_rejects_garbage() {
        assert!(issuer().unsafe_extract_account_id("not.a.jwt").is_err());
        assert!(issuer().unsafe_extract_account_id("").is_err());
    }

    #[test]
    fn test_refresh_secret_shape() {
        let issuer = issuer();
        let first = issuer.issue_refresh_secret();
        let second = issuer.issue_refresh_secret();

        assert_eq!(first.len(), REFRESH_SECRET_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
        assert!(issuer.verify_access_token(&first).is_err());
    }
}
