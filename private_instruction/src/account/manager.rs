//! Account manager implementation.

use crate::auth::{
    Account, AccountId, AuthError, AuthResult,
    validation::{normalize_email, normalize_username, validate_email, validate_username},
};
use crate::db::{AccountRepository, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Profile update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: String,
    pub email: String,
}

/// Reads, updates and deletes the caller's own account
#[derive(Clone)]
pub struct AccountManager {
    accounts: Arc<dyn AccountRepository>,
}

impl AccountManager {
    pub fn new(accounts: Arc<dyn AccountRepository>) -> Self {
        Self { accounts }
    }

    /// Read an account
    ///
    /// # Errors
    ///
    /// * `AuthError::AccountNotFound` - The account no longer exists
    pub async fn read_account(&self, account_id: AccountId) -> AuthResult<Account> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .map(|record| record.account)
            .ok_or(AuthError::AccountNotFound)
    }

    /// Replace username and email
    ///
    /// Input is normalized and validated the same way as on sign-up.
    ///
    /// # Errors
    ///
    /// * `AuthError::Validation` - Malformed username or email
    /// * `AuthError::UserExists` - Another account uses the username or email
    /// * `AuthError::AccountNotFound` - The account no longer exists
    pub async fn update_account(
        &self,
        account_id: AccountId,
        request: UpdateAccountRequest,
    ) -> AuthResult<Account> {
        let username = normalize_username(&request.username);
        let email = normalize_email(&request.email);
        validate_username(&username)?;
        validate_email(&email)?;

        let account = self
            .accounts
            .update_profile(account_id, &username, &email)
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::UserExists,
                other => AuthError::Internal(other),
            })?
            .ok_or(AuthError::AccountNotFound)?;

        log::info!("Account {account_id} updated profile");
        Ok(account)
    }

    /// Delete an account with its sessions and memberships
    ///
    /// Classes the account created stay, without a creator.
    ///
    /// # Errors
    ///
    /// * `AuthError::AccountNotFound` - The account no longer exists
    pub async fn delete_account(&self, account_id: AccountId) -> AuthResult<()> {
        if !self.accounts.delete_account(account_id).await? {
            return Err(AuthError::AccountNotFound);
        }

        log::info!("Account {account_id} deleted");
        Ok(())
    }
}
