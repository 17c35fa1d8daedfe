//! Request identity: turning an `Authorization` header into a verified caller.
//!
//! Per request the header goes `NoToken → Extracted → {Verified, Rejected}`.
//! Only a [`Identity`] produced here tells downstream services who is calling.

use super::{
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, AccountId},
    tokens::TokenIssuer,
};

/// Verified caller of an authenticated operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    account_id: AccountId,
    username: String,
}

impl Identity {
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Username at the time the access token was issued
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<AccessTokenClaims> for Identity {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            account_id: claims.sub,
            username: claims.username,
        }
    }
}

/// Bearer token state of an inbound request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerToken<'a> {
    NoToken,
    Extracted(&'a str),
}

impl<'a> BearerToken<'a> {
    /// Extract the token from an `Authorization` header value
    ///
    /// Accepts `Bearer <token>` with surrounding whitespace. A missing header, a
    /// different scheme, or an empty token all yield `NoToken`.
    pub fn from_header(header: Option<&'a str>) -> Self {
        let token = header
            .map(str::trim)
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => BearerToken::Extracted(token),
            None => BearerToken::NoToken,
        }
    }

    /// Verify the extracted token
    ///
    /// # Errors
    ///
    /// * `AuthError::MissingToken` - No token was presented
    /// * `AuthError::InvalidToken` - Signature, algorithm or expiry check failed
    pub fn verify(self, tokens: &TokenIssuer) -> AuthResult<Identity> {
        match self {
            BearerToken::NoToken => Err(AuthError::MissingToken),
            BearerToken::Extracted(token) => tokens.verify_access_token(token).map(Identity::from),
        }
    }
}

/// Authenticate a request from its `Authorization` header value
pub fn authenticate(tokens: &TokenIssuer, header: Option<&str>) -> AuthResult<Identity> {
    BearerToken::from_header(header).verify(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"identity_test_secret_0123456789abcdef", Duration::minutes(15))
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            BearerToken::from_header(Some("Bearer abc.def.ghi")),
            BearerToken::Extracted("abc.def.ghi")
        );
        assert_eq!(
            BearerToken::from_header(Some("  Bearer   abc  ")),
            BearerToken::Extracted("abc")
        );
    }

    #[test]
    fn test_missing_or_empty_is_no_token() {
        assert_eq!(BearerToken::from_header(None), BearerToken::NoToken);
        assert_eq!(BearerToken::from_header(Some("")), BearerToken::NoToken);
        assert_eq!(BearerToken::from_header(Some("Bearer ")), BearerToken::NoToken);
        assert_eq!(BearerToken::from_header(Some("Basic abc")), BearerToken::NoToken);
    }

    #[test]
    fn test_authenticate_verified() {
        let issuer = issuer();
        let token = issuer.issue_access_token(9, "carol").unwrap();
        let header = format!("Bearer {token}");

        let identity = authenticate(&issuer, Some(&header)).unwrap();
        assert_eq!(identity.account_id(), 9);
        assert_eq!(identity.username(), "carol");
    }

    #[test]
    fn test_authenticate_rejected() {
        let issuer = issuer();
        assert!(matches!(
            authenticate(&issuer, None),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            authenticate(&issuer, Some("Bearer forged.token.value")),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
