//! In-process implementation of the repository traits.
//!
//! All tables live behind one async mutex, so every trait method is atomic with
//! respect to every other, which is what the PostgreSQL statements guarantee
//! per row. Unique, foreign-key and cascade rules mirror the SQL schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{
    errors::{StoreError, StoreResult},
    repository::{AccountRepository, ClassRepository, HealthCheck, SessionRepository},
};
use crate::auth::{Account, AccountId, AccountRecord, NewAccount, RefreshToken, SessionId};
use crate::class::{Class, ClassId, ClassMember, ClassSummary, JoinCode, JoinOutcome, Role};

#[derive(Debug, Default)]
struct Tables {
    last_account_id: AccountId,
    accounts: BTreeMap<AccountId, AccountRecord>,
    last_session_id: SessionId,
    sessions: BTreeMap<SessionId, RefreshToken>,
    last_class_id: ClassId,
    classes: BTreeMap<ClassId, Class>,
    members: BTreeMap<(ClassId, AccountId), ClassMember>,
    join_codes: BTreeMap<ClassId, JoinCode>,
}

impl Tables {
    fn check_account_unique(
        &self,
        username: &str,
        email: &str,
        except: Option<AccountId>,
    ) -> StoreResult<()> {
        let others = self
            .accounts
            .values()
            .filter(|record| Some(record.account.id) != except);

        for record in others {
            if record.account.username == username {
                return Err(StoreError::Conflict("accounts_username_key".to_string()));
            }
            if record.account.email == email {
                return Err(StoreError::Conflict("accounts_email_key".to_string()));
            }
        }
        Ok(())
    }

    fn is_admin(&self, class_id: ClassId, account_id: AccountId) -> bool {
        self.members
            .get(&(class_id, account_id))
            .is_some_and(|member| member.role.is_admin())
    }
}

/// Repository store kept in memory
///
/// Cloning shares the underlying tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account> {
        let mut tables = self.tables.lock().await;
        tables.check_account_unique(&account.username, &account.email, None)?;

        tables.last_account_id += 1;
        let created = Account {
            id: tables.last_account_id,
            username: account.username.clone(),
            email: account.email.clone(),
            created_at: Utc::now(),
        };
        tables.accounts.insert(
            created.id,
            AccountRecord {
                account: created.clone(),
                password_hash: account.password_hash.clone(),
            },
        );
        Ok(created)
    }

    async fn find_by_id(&self, account_id: AccountId) -> StoreResult<Option<AccountRecord>> {
        Ok(self.tables.lock().await.accounts.get(&account_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<AccountRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .find(|record| record.account.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<AccountRecord>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .find(|record| record.account.email == email)
            .cloned())
    }

    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .accounts
            .values()
            .any(|record| record.account.username == username || record.account.email == email))
    }

    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.accounts.get_mut(&account_id) {
            Some(record) => {
                record.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_profile(
        &self,
        account_id: AccountId,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<Account>> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(&account_id) {
            return Ok(None);
        }
        tables.check_account_unique(username, email, Some(account_id))?;

        Ok(tables.accounts.get_mut(&account_id).map(|record| {
            record.account.username = username.to_string();
            record.account.email = email.to_string();
            record.account.clone()
        }))
    }

    async fn delete_account(&self, account_id: AccountId) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.accounts.remove(&account_id).is_none() {
            return Ok(false);
        }

        tables
            .sessions
            .retain(|_, session| session.account_id != account_id);
        tables
            .members
            .retain(|(_, member_id), _| *member_id != account_id);
        for class in tables.classes.values_mut() {
            if class.creator_id == Some(account_id) {
                class.creator_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::ForeignKey(
                "refresh_tokens_account_id_fkey".to_string(),
            ));
        }

        tables.last_session_id += 1;
        let session = RefreshToken {
            id: tables.last_session_id,
            account_id,
            token_hash: token_hash.to_string(),
            expires_at,
            created_at: Utc::now(),
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_sessions_by_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Vec<RefreshToken>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .values()
            .filter(|session| session.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn rotate_session(
        &self,
        session_id: SessionId,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        match tables.sessions.get_mut(&session_id) {
            Some(session) if session.token_hash == current_hash => {
                session.token_hash = new_hash.to_string();
                session.expires_at = new_expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_session(&self, session_id: SessionId) -> StoreResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .sessions
            .remove(&session_id)
            .is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.expires_at > now);
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl ClassRepository for MemoryStore {
    async fn create_class(
        &self,
        name: &str,
        description: &str,
        creator_id: AccountId,
    ) -> StoreResult<Class> {
        let mut tables = self.tables.lock().await;
        if !tables.accounts.contains_key(&creator_id) {
            return Err(StoreError::ForeignKey("classes_creator_id_fkey".to_string()));
        }

        tables.last_class_id += 1;
        let now = Utc::now();
        let class = Class {
            id: tables.last_class_id,
            name: name.to_string(),
            description: description.to_string(),
            creator_id: Some(creator_id),
            created_at: now,
        };
        tables.classes.insert(class.id, class.clone());
        tables.members.insert(
            (class.id, creator_id),
            ClassMember {
                class_id: class.id,
                account_id: creator_id,
                role: Role::Admin,
                joined_at: now,
            },
        );
        Ok(class)
    }

    async fn find_class(&self, class_id: ClassId) -> StoreResult<Option<Class>> {
        Ok(self.tables.lock().await.classes.get(&class_id).cloned())
    }

    async fn find_member(
        &self,
        class_id: ClassId,
        account_id: AccountId,
    ) -> StoreResult<Option<ClassMember>> {
        Ok(self
            .tables
            .lock()
            .await
            .members
            .get(&(class_id, account_id))
            .cloned())
    }

    async fn list_classes_for(&self, account_id: AccountId) -> StoreResult<Vec<ClassSummary>> {
        let tables = self.tables.lock().await;
        // Members are keyed by class first, so this yields class ID order
        Ok(tables
            .members
            .values()
            .filter(|member| member.account_id == account_id)
            .filter_map(|member| {
                tables.classes.get(&member.class_id).map(|class| ClassSummary {
                    id: class.id,
                    name: class.name.clone(),
                    description: class.description.clone(),
                    role: member.role,
                })
            })
            .collect())
    }

    async fn update_class_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        name: &str,
        description: &str,
    ) -> StoreResult<Option<Class>> {
        let mut tables = self.tables.lock().await;
        if !tables.is_admin(class_id, admin_id) {
            return Ok(None);
        }

        Ok(tables.classes.get_mut(&class_id).map(|class| {
            class.name = name.to_string();
            class.description = description.to_string();
            class.clone()
        }))
    }

    async fn delete_class_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.is_admin(class_id, admin_id) || tables.classes.remove(&class_id).is_none() {
            return Ok(false);
        }

        tables.members.retain(|(member_class, _), _| *member_class != class_id);
        tables.join_codes.remove(&class_id);
        Ok(true)
    }

    async fn replace_join_code_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Option<JoinCode>> {
        let mut tables = self.tables.lock().await;
        if !tables.is_admin(class_id, admin_id) {
            return Ok(None);
        }

        let taken = tables
            .join_codes
            .values()
            .any(|existing| existing.code == code && existing.class_id != class_id);
        if taken {
            return Err(StoreError::Conflict("join_codes_code_key".to_string()));
        }

        let join_code = JoinCode {
            class_id,
            code: code.to_string(),
            expires_at,
        };
        tables.join_codes.insert(class_id, join_code.clone());
        Ok(Some(join_code))
    }

    async fn redeem_join_code(
        &self,
        code: &str,
        account_id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<JoinOutcome>> {
        let mut tables = self.tables.lock().await;
        let Some(class_id) = tables
            .join_codes
            .values()
            .find(|join_code| join_code.code == code && !join_code.is_expired_at(now))
            .map(|join_code| join_code.class_id)
        else {
            return Ok(None);
        };

        if !tables.accounts.contains_key(&account_id) {
            return Err(StoreError::ForeignKey(
                "class_members_account_id_fkey".to_string(),
            ));
        }

        if let Some(member) = tables.members.get(&(class_id, account_id)) {
            return Ok(Some(JoinOutcome {
                class_id,
                role: member.role,
                already_member: true,
            }));
        }

        tables.members.insert(
            (class_id, account_id),
            ClassMember {
                class_id,
                account_id,
                role,
                joined_at: now,
            },
        );
        Ok(Some(JoinOutcome {
            class_id,
            role,
            already_member: false,
        }))
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();

        let err = store
            .create_account(&new_account("alice", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref c) if c == "accounts_username_key"));

        let err = store
            .create_account(&new_account("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref c) if c == "accounts_email_key"));
    }

    #[tokio::test]
    async fn test_rotate_session_is_compare_and_swap() {
        let store = MemoryStore::new();
        let account = store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();
        let expires = Utc::now() + Duration::days(1);
        let session = store.create_session(account.id, "h1", expires).await.unwrap();

        assert!(store.rotate_session(session.id, "h1", "h2", expires).await.unwrap());
        assert!(!store.rotate_session(session.id, "h1", "h3", expires).await.unwrap());

        let sessions = store.find_sessions_by_account(account.id).await.unwrap();
        assert_eq!(sessions[0].token_hash, "h2");
    }

    #[tokio::test]
    async fn test_delete_account_cascades() {
        let store = MemoryStore::new();
        let alice = store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();
        let bob = store
            .create_account(&new_account("bob", "bob@example.com"))
            .await
            .unwrap();
        let class = store.create_class("Math", "", alice.id).await.unwrap();
        let expires = Utc::now() + Duration::hours(1);
        store
            .replace_join_code_if_admin(class.id, alice.id, "CODE2345", expires)
            .await
            .unwrap();
        store
            .redeem_join_code("CODE2345", bob.id, Role::User, Utc::now())
            .await
            .unwrap();
        store
            .create_session(alice.id, "h", Utc::now() + Duration::days(1))
            .await
            .unwrap();

        assert!(store.delete_account(alice.id).await.unwrap());

        assert!(store.find_sessions_by_account(alice.id).await.unwrap().is_empty());
        assert!(store.find_member(class.id, alice.id).await.unwrap().is_none());
        let class = store.find_class(class.id).await.unwrap().unwrap();
        assert_eq!(class.creator_id, None);
        assert!(store.find_member(class.id, bob.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_join_code_replacement_and_collision() {
        let store = MemoryStore::new();
        let alice = store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();
        let math = store.create_class("Math", "", alice.id).await.unwrap();
        let art = store.create_class("Art", "", alice.id).await.unwrap();
        let expires = Utc::now() + Duration::hours(24);

        store
            .replace_join_code_if_admin(math.id, alice.id, "AAAAAAAA", expires)
            .await
            .unwrap();
        store
            .replace_join_code_if_admin(math.id, alice.id, "BBBBBBBB", expires)
            .await
            .unwrap();
        assert!(
            store
                .redeem_join_code("AAAAAAAA", alice.id, Role::User, Utc::now())
                .await
                .unwrap()
                .is_none()
        );

        let err = store
            .replace_join_code_if_admin(art.id, alice.id, "BBBBBBBB", expires)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_redeem_keeps_existing_role() {
        let store = MemoryStore::new();
        let alice = store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();
        let class = store.create_class("Math", "", alice.id).await.unwrap();
        let expires = Utc::now() + Duration::hours(1);
        store
            .replace_join_code_if_admin(class.id, alice.id, "CODE2345", expires)
            .await
            .unwrap();

        let outcome = store
            .redeem_join_code("CODE2345", alice.id, Role::User, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.already_member);
        assert_eq!(outcome.role, Role::Admin);
        let member = store.find_member(class.id, alice.id).await.unwrap().unwrap();
        assert_eq!(member.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_redeem_checks_expiry_at_redemption_time() {
        let store = MemoryStore::new();
        let alice = store
            .create_account(&new_account("alice", "alice@example.com"))
            .await
            .unwrap();
        let bob = store
            .create_account(&new_account("bob", "bob@example.com"))
            .await
            .unwrap();
        let class = store.create_class("Math", "", alice.id).await.unwrap();
        let expires = Utc::now() + Duration::hours(1);
        store
            .replace_join_code_if_admin(class.id, alice.id, "CODE2345", expires)
            .await
            .unwrap();

        let late = store
            .redeem_join_code("CODE2345", bob.id, Role::User, expires)
            .await
            .unwrap();
        assert!(late.is_none());
        assert!(store.find_member(class.id, bob.id).await.unwrap().is_none());
    }
}
