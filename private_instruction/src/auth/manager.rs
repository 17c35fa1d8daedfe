//! Authentication manager implementation.

use super::{
    errors::{AuthError, AuthResult},
    identity::{self, Identity},
    models::{
        AccessTokenClaims, Account, AccountId, NewAccount, RefreshToken, SessionTokens,
        SignInRequest, SignUpRequest, UpdatePasswordRequest,
    },
    password::{CredentialHasher, HashCost},
    tokens::TokenIssuer,
    validation::{
        normalize_email, normalize_username, validate_email, validate_password, validate_username,
    },
};
use crate::db::{AccountRepository, SessionRepository, StoreError};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Secrets and lifetimes the auth manager is built from
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    /// Server-side pepper for password and refresh-secret hashing
    pub password_pepper: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub hash_cost: HashCost,
}

impl AuthConfig {
    /// Configuration with the production lifetimes: 15 minute access tokens and
    /// 30 day refresh secrets
    pub fn new(jwt_secret: String, password_pepper: String) -> Self {
        Self {
            jwt_secret,
            password_pepper,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(30),
            hash_cost: HashCost::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("hash_cost", &self.hash_cost)
            .finish_non_exhaustive()
    }
}

/// Authentication manager
#[derive(Clone)]
pub struct AuthManager {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionRepository>,
    hasher: Arc<CredentialHasher>,
    tokens: Arc<TokenIssuer>,
    refresh_token_ttl: Duration,
    /// Verified against on unknown-account sign-ins so both rejections cost one hash
    decoy_hash: Arc<str>,
}

impl AuthManager {
    /// Create a new authentication manager
    ///
    /// # Arguments
    ///
    /// * `accounts` - Account persistence
    /// * `sessions` - Refresh-token persistence
    /// * `config` - Secrets, lifetimes and hashing cost
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - The hashing cost is outside argon2's limits
    /// * `AuthError::HashingFailed` - The decoy hash could not be computed
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionRepository>,
        config: &AuthConfig,
    ) -> AuthResult<Self> {
        let hasher = CredentialHasher::new(config.password_pepper.clone(), config.hash_cost)?;
        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.access_token_ttl);
        let decoy_hash = hasher.hash(&tokens.issue_refresh_secret())?;

        Ok(Self {
            accounts,
            sessions,
            hasher: Arc::new(hasher),
            tokens: Arc::new(tokens),
            refresh_token_ttl: config.refresh_token_ttl,
            decoy_hash: Arc::from(decoy_hash),
        })
    }

    /// Token issuer shared with the identity middleware
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Credential hasher shared with the account manager
    pub fn hasher(&self) -> Arc<CredentialHasher> {
        Arc::clone(&self.hasher)
    }

    /// Register a new account
    ///
    /// # Arguments
    ///
    /// * `request` - Username, email and plaintext password
    ///
    /// # Returns
    ///
    /// * `AuthResult<Account>` - Created account
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Malformed username, email or password
    /// * `AuthError::UserExists` - Username or email already taken, including by
    ///   a concurrent sign-up that won the insert
    pub async fn sign_up(&self, request: SignUpRequest) -> AuthResult<Account> {
        let username = normalize_username(&request.username);
        let email = normalize_email(&request.email);
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&request.password)?;

        if self
            .accounts
            .exists_by_username_or_email(&username, &email)
            .await?
        {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_blocking(request.password).await?;

        let account = self
            .accounts
            .create_account(&NewAccount {
                username,
                email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserExists,
                other => AuthError::Internal(other),
            })?;

        log::info!("Account {} ({}) signed up", account.id, account.username);
        Ok(account)
    }

    /// Sign in with username or email and password
    ///
    /// # Returns
    ///
    /// * `AuthResult<(Account, SessionTokens)>` - Account plus a fresh access
    ///   token and refresh secret
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - No identifier or no password given
    /// * `AuthError::InvalidCredentials` - Unknown identifier or wrong password
    pub async fn sign_in(&self, request: SignInRequest) -> AuthResult<(Account, SessionTokens)> {
        if request.password.is_empty() {
            return Err(AuthError::Validation("password is required".to_string()));
        }

        let username = request
            .username
            .as_deref()
            .map(normalize_username)
            .filter(|u| !u.is_empty());
        let email = request
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty());

        let record = match (username, email) {
            (Some(username), _) => self.accounts.find_by_username(&username).await?,
            (None, Some(email)) => self.accounts.find_by_email(&email).await?,
            (None, None) => {
                return Err(AuthError::Validation(
                    "username or email is required".to_string(),
                ));
            }
        };

        let Some(record) = record else {
            self.verify_blocking(self.decoy_hash.to_string(), request.password)
                .await?;
            log::info!("Sign-in rejected: unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        if !self
            .verify_blocking(record.password_hash, request.password)
            .await?
        {
            log::warn!("Sign-in rejected for account {}: wrong password", record.account.id);
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self
            .create_session(record.account.id, &record.account.username)
            .await?;

        log::info!("Account {} signed in", record.account.id);
        Ok((record.account, tokens))
    }

    /// Issue an access token and persist a new refresh secret for the account
    async fn create_session(
        &self,
        account_id: AccountId,
        username: &str,
    ) -> AuthResult<SessionTokens> {
        let access_token = self.tokens.issue_access_token(account_id, username)?;

        let refresh_token = self.tokens.issue_refresh_secret();
        let token_hash = self.hash_blocking(refresh_token.clone()).await?;
        let expires_at = Utc::now() + self.refresh_token_ttl;

        self.sessions
            .create_session(account_id, &token_hash, expires_at)
            .await?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            refresh_token_expires_at: expires_at,
        })
    }

    /// Change the password of an account
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - New password malformed
    /// * `AuthError::InvalidCredentials` - Account gone or old password wrong
    pub async fn update_password(
        &self,
        account_id: AccountId,
        request: UpdatePasswordRequest,
    ) -> AuthResult<()> {
        validate_password(&request.new_password)?;

        let record = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify_blocking(record.password_hash, request.old_password)
            .await?
        {
            log::warn!("Password change rejected for account {account_id}: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let password_hash = self.hash_blocking(request.new_password).await?;
        if !self
            .accounts
            .update_password_hash(account_id, &password_hash)
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        log::info!("Account {account_id} changed password");
        Ok(())
    }

    /// Exchange a refresh secret for a new access token and a new refresh secret
    ///
    /// The presented secret is single-use: its session is rotated to the new
    /// secret with a compare-and-swap, so of two concurrent refreshes with the
    /// same secret at most one succeeds. Nothing fallible runs after the
    /// rotation, so a consumed secret always comes back with its replacement.
    ///
    /// # Arguments
    ///
    /// * `refresh_secret` - Plaintext refresh secret from sign-in or a previous refresh
    /// * `account_id` - Account the secret belongs to, see [`Self::account_id_from_expired_token`]
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Empty secret
    /// * `AuthError::InvalidCredentials` - No matching session, session expired,
    ///   secret already rotated, or account gone
    pub async fn refresh_access_token(
        &self,
        refresh_secret: &str,
        account_id: AccountId,
    ) -> AuthResult<(Account, SessionTokens)> {
        if refresh_secret.is_empty() {
            return Err(AuthError::Validation("refresh token is required".to_string()));
        }

        let Some(session) = self.find_session(account_id, refresh_secret).await? else {
            log::warn!("Refresh rejected for account {account_id}: no matching session");
            return Err(AuthError::InvalidCredentials);
        };

        let now = Utc::now();
        if session.is_expired_at(now) {
            self.sessions.delete_session(session.id).await?;
            log::info!("Refresh rejected for account {account_id}: session expired");
            return Err(AuthError::InvalidCredentials);
        }

        let record = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let access_token = self
            .tokens
            .issue_access_token(account_id, &record.account.username)?;
        let refresh_token = self.tokens.issue_refresh_secret();
        let new_hash = self.hash_blocking(refresh_token.clone()).await?;
        let expires_at = now + self.refresh_token_ttl;

        if !self
            .sessions
            .rotate_session(session.id, &session.token_hash, &new_hash, expires_at)
            .await?
        {
            log::warn!("Refresh rejected for account {account_id}: secret already rotated");
            return Err(AuthError::InvalidCredentials);
        }

        log::debug!("Rotated session {} of account {account_id}", session.id);
        Ok((
            record.account,
            SessionTokens {
                access_token,
                refresh_token,
                refresh_token_expires_at: expires_at,
            },
        ))
    }

    /// Account id of a possibly expired access token, for routing a refresh
    ///
    /// The token's signature is not checked; the refresh secret is what
    /// authenticates the refresh.
    pub fn account_id_from_expired_token(&self, token: &str) -> AuthResult<AccountId> {
        self.tokens.unsafe_extract_account_id(token)
    }

    /// End the session a refresh secret belongs to
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidCredentials` - No session of the account matches
    pub async fn sign_out(&self, account_id: AccountId, refresh_secret: &str) -> AuthResult<()> {
        let session = self
            .find_session(account_id, refresh_secret)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        self.sessions.delete_session(session.id).await?;
        log::info!("Account {account_id} signed out session {}", session.id);
        Ok(())
    }

    /// Delete every expired refresh-token record
    ///
    /// # Returns
    ///
    /// * `AuthResult<u64>` - Number of records removed
    pub async fn purge_expired_sessions(&self) -> AuthResult<u64> {
        let purged = self.sessions.delete_expired_sessions(Utc::now()).await?;
        if purged > 0 {
            log::info!("Purged {purged} expired sessions");
        }
        Ok(purged)
    }

    /// Verify an access token
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.tokens.verify_access_token(token)
    }

    /// Resolve the caller from an `Authorization` header value
    pub fn authenticate(&self, header: Option<&str>) -> AuthResult<Identity> {
        identity::authenticate(&self.tokens, header)
    }

    /// First session of the account whose hash matches the secret
    async fn find_session(
        &self,
        account_id: AccountId,
        refresh_secret: &str,
    ) -> AuthResult<Option<RefreshToken>> {
        let sessions = self.sessions.find_sessions_by_account(account_id).await?;
        if sessions.is_empty() {
            return Ok(None);
        }

        let hasher = Arc::clone(&self.hasher);
        let secret = refresh_secret.to_string();
        tokio::task::spawn_blocking(move || {
            sessions
                .into_iter()
                .find(|session| hasher.verify(&session.token_hash, &secret))
        })
        .await
        .map_err(|_| AuthError::HashingFailed)
    }

    async fn hash_blocking(&self, plaintext: String) -> AuthResult<String> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|_| AuthError::HashingFailed)?
    }

    async fn verify_blocking(&self, hash: String, plaintext: String) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &plaintext))
            .await
            .map_err(|_| AuthError::HashingFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn manager(store: &MemoryStore) -> AuthManager {
        let mut config = AuthConfig::new(
            "manager_test_jwt_secret_0123456789abcdef".to_string(),
            "manager_test_pepper".to_string(),
        );
        config.hash_cost = HashCost::minimal();
        AuthManager::new(Arc::new(store.clone()), Arc::new(store.clone()), &config).unwrap()
    }

    fn sign_up_request(username: &str, email: &str) -> SignUpRequest {
        SignUpRequest {
            username: username.to_string(),
            password: "pw1".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_normalizes_input() {
        let store = MemoryStore::new();
        let auth = manager(&store);

        let account = auth
            .sign_up(sign_up_request("  alice ", " Alice@Example.COM "))
            .await
            .unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(account.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_sign_in_requires_identifier() {
        let store = MemoryStore::new();
        let auth = manager(&store);

        let result = auth
            .sign_in(SignInRequest {
                password: "pw1".to_string(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sign_in_by_email() {
        let store = MemoryStore::new();
        let auth = manager(&store);
        auth.sign_up(sign_up_request("alice", "a@x.com")).await.unwrap();

        let (account, tokens) = auth
            .sign_in(SignInRequest {
                email: Some(" A@X.com".to_string()),
                password: "pw1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(account.username, "alice");

        let claims = auth.verify_access_token(&tokens.access_token).unwrap();
        assert_eq!(claims.sub, account.id);
    }

    #[tokio::test]
    async fn test_refresh_secret_is_not_stored_in_plaintext() {
        let store = MemoryStore::new();
        let auth = manager(&store);
        let account = auth.sign_up(sign_up_request("alice", "a@x.com")).await.unwrap();

        let (_, tokens) = auth
            .sign_in(SignInRequest {
                username: Some("alice".to_string()),
                password: "pw1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let sessions = store.find_sessions_by_account(account.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_ne!(sessions[0].token_hash, tokens.refresh_token);
    }

    #[tokio::test]
    async fn test_unknown_account_costs_a_hash() {
        let store = MemoryStore::new();
        let mut config = AuthConfig::new(
            "manager_test_jwt_secret_0123456789abcdef".to_string(),
            "manager_test_pepper".to_string(),
        );
        config.hash_cost = HashCost {
            memory_kib: 8 * 1024,
            iterations: 3,
            parallelism: 1,
        };
        let auth =
            AuthManager::new(Arc::new(store.clone()), Arc::new(store.clone()), &config).unwrap();
        auth.sign_up(sign_up_request("alice", "a@x.com")).await.unwrap();

        let attempt = |username: &str| SignInRequest {
            username: Some(username.to_string()),
            password: "wrong".to_string(),
            ..Default::default()
        };

        let mut wrong_password = std::time::Duration::ZERO;
        let mut unknown_account = std::time::Duration::ZERO;
        for _ in 0..3 {
            let started = std::time::Instant::now();
            let result = auth.sign_in(attempt("alice")).await;
            wrong_password += started.elapsed();
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));

            let started = std::time::Instant::now();
            let result = auth.sign_in(attempt("nobody")).await;
            unknown_account += started.elapsed();
            assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        }

        assert!(
            unknown_account * 4 > wrong_password,
            "unknown account took {unknown_account:?}, wrong password {wrong_password:?}"
        );
    }
}
