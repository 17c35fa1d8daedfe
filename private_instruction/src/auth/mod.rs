//! Credential and session lifecycle.
//!
//! This module implements:
//! - Argon2id hashing with a server-side pepper for passwords and refresh secrets
//! - HS256 access tokens (15-minute expiry by default)
//! - Opaque, single-use refresh secrets rotated on every refresh (30-day expiry)
//! - Bearer-token extraction and verification into a typed [`Identity`]
//!
//! ## Example
//!
//! ```no_run
//! use private_instruction::auth::{AuthConfig, AuthManager, SignUpRequest};
//! use private_instruction::db::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     let config = AuthConfig::new(
//!         "a_jwt_secret_of_at_least_32_characters".to_string(),
//!         "a_pepper_value_16+".to_string(),
//!     );
//!     let auth = AuthManager::new(Arc::new(store.clone()), Arc::new(store), &config)?;
//!
//!     let account = auth
//!         .sign_up(SignUpRequest {
//!             username: "alice".to_string(),
//!             password: "pw1".to_string(),
//!             email: "a@x.com".to_string(),
//!         })
//!         .await?;
//!     println!("Signed up account {}", account.id);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod identity;
pub mod manager;
pub mod models;
pub mod password;
pub mod tokens;
pub mod validation;

pub use errors::{AuthError, AuthResult};
pub use identity::{BearerToken, Identity};
pub use manager::{AuthConfig, AuthManager};
pub use models::{
    AccessTokenClaims, Account, AccountId, AccountRecord, NewAccount, RefreshToken, SessionId,
    SessionTokens, SignInRequest, SignUpRequest, UpdatePasswordRequest,
};
pub use password::{CredentialHasher, HashCost};
pub use tokens::TokenIssuer;
