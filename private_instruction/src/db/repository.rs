//! Repository trait definitions for testability and dependency injection.
//!
//! The services only talk to persistence through these traits. Implementations
//! must enforce the uniqueness and cascade rules themselves; the services never
//! rely on a read-then-write sequence for an invariant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::auth::{Account, AccountId, AccountRecord, NewAccount, RefreshToken, SessionId};
use crate::class::{Class, ClassId, ClassMember, ClassSummary, JoinCode, JoinOutcome, Role};

/// Trait for account repository operations
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account.
    ///
    /// A username or email already in use fails with `StoreError::Conflict`.
    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account>;

    /// Find account by ID
    async fn find_by_id(&self, account_id: AccountId) -> StoreResult<Option<AccountRecord>>;

    /// Find account by exact username
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<AccountRecord>>;

    /// Find account by normalized email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<AccountRecord>>;

    /// Whether any account uses the username or the email
    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> StoreResult<bool>;

    /// Replace the password hash. Returns `false` if the account does not exist.
    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> StoreResult<bool>;

    /// Replace username and email.
    ///
    /// Returns `None` if the account does not exist; a collision with another
    /// account fails with `StoreError::Conflict`.
    async fn update_profile(
        &self,
        account_id: AccountId,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<Account>>;

    /// Delete the account along with its sessions and memberships
    async fn delete_account(&self, account_id: AccountId) -> StoreResult<bool>;
}

/// Trait for refresh-token session operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new refresh-token hash
    async fn create_session(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken>;

    /// All refresh-token records of an account
    async fn find_sessions_by_account(&self, account_id: AccountId)
    -> StoreResult<Vec<RefreshToken>>;

    /// Atomically replace hash and expiry of one record, but only while it still
    /// holds `current_hash`. Returns `false` when another rotation won the race
    /// or the record is gone.
    async fn rotate_session(
        &self,
        session_id: SessionId,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Delete one record
    async fn delete_session(&self, session_id: SessionId) -> StoreResult<bool>;

    /// Delete every record that expired before `now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// Trait for class, membership and join-code operations
#[async_trait]
pub trait ClassRepository: Send + Sync {
    /// Insert a class and its creator's admin membership as one unit.
    ///
    /// A creator that no longer exists fails with `StoreError::ForeignKey`.
    async fn create_class(
        &self,
        name: &str,
        description: &str,
        creator_id: AccountId,
    ) -> StoreResult<Class>;

    /// Find class by ID
    async fn find_class(&self, class_id: ClassId) -> StoreResult<Option<Class>>;

    /// Membership of an account in a class
    async fn find_member(
        &self,
        class_id: ClassId,
        account_id: AccountId,
    ) -> StoreResult<Option<ClassMember>>;

    /// Every class the account belongs to, ordered by class ID
    async fn list_classes_for(&self, account_id: AccountId) -> StoreResult<Vec<ClassSummary>>;

    /// Update name and description if `admin_id` is an admin of the class at the
    /// moment of the write. `None` when the guard did not hold.
    async fn update_class_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        name: &str,
        description: &str,
    ) -> StoreResult<Option<Class>>;

    /// Delete the class (memberships and join codes with it) if `admin_id` is an
    /// admin at the moment of the write
    async fn delete_class_if_admin(&self, class_id: ClassId, admin_id: AccountId)
    -> StoreResult<bool>;

    /// Replace the class's join code if `admin_id` is an admin at the moment of
    /// the write. Any previous code stops working. A code already used by another
    /// class fails with `StoreError::Conflict`.
    async fn replace_join_code_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Option<JoinCode>>;

    /// Redeem a join code for `account_id` as one atomic step.
    ///
    /// The code is looked up and the membership inserted with role `role` in a
    /// single unit, so a code replaced or expired before the redemption takes
    /// effect grants nothing. Returns `None` for an unknown or expired code (at
    /// `now`). An existing member keeps their role and is reported with
    /// `already_member`. An account that no longer exists fails with
    /// `StoreError::ForeignKey`.
    async fn redeem_join_code(
        &self,
        code: &str,
        account_id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<JoinOutcome>>;
}

/// Liveness check of the backing store
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> StoreResult<()>;
}
