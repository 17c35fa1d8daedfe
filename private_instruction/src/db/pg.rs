//! PostgreSQL implementation of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::time::Duration;

use super::{
    errors::StoreResult,
    repository::{AccountRepository, ClassRepository, HealthCheck, SessionRepository},
    timeouts::with_timeout,
};
use crate::auth::{Account, AccountId, AccountRecord, NewAccount, RefreshToken, SessionId};
use crate::class::{Class, ClassId, ClassMember, ClassSummary, JoinCode, JoinOutcome, Role};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, created_at";
const SESSION_COLUMNS: &str = "id, account_id, token_hash, expires_at, created_at";
const CLASS_COLUMNS: &str = "id, name, description, creator_id, created_at";

/// Repository implementation backed by a PostgreSQL pool.
///
/// Every statement runs under the query timeout; multi-statement units run in a
/// transaction under the transaction timeout and roll back when it fires.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
    transaction_timeout: Duration,
}

impl PgStore {
    /// Create a store over an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - Database connection pool
    /// * `query_timeout` - Upper bound for a single statement; transactions get twice as long
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
            transaction_timeout: query_timeout * 2,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    row.get::<String, _>("role")
        .parse::<Role>()
        .map_err(|e| sqlx::Error::Decode(e.into()))
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn record_from_row(row: &PgRow) -> AccountRecord {
    AccountRecord {
        account: account_from_row(row),
        password_hash: row.get("password_hash"),
    }
}

fn session_from_row(row: &PgRow) -> RefreshToken {
    RefreshToken {
        id: row.get("id"),
        account_id: row.get("account_id"),
        token_hash: row.get("token_hash"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }
}

fn class_from_row(row: &PgRow) -> Class {
    Class {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        creator_id: row.get("creator_id"),
        created_at: row.get("created_at"),
    }
}

fn join_code_from_row(row: &PgRow) -> JoinCode {
    JoinCode {
        class_id: row.get("class_id"),
        code: row.get("code"),
        expires_at: row.get("expires_at"),
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn create_account(&self, account: &NewAccount) -> StoreResult<Account> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                INSERT INTO accounts (username, email, password_hash)
                VALUES ($1, $2, $3)
                RETURNING id, username, email, created_at
                "#,
            )
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(account_from_row(&row))
    }

    async fn find_by_id(&self, account_id: AccountId) -> StoreResult<Option<AccountRecord>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query).bind(account_id).fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<AccountRecord>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query).bind(username).fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<AccountRecord>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query).bind(email).fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    async fn exists_by_username_or_email(&self, username: &str, email: &str) -> StoreResult<bool> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                "SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1 OR email = $2) AS taken",
            )
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(row.get("taken"))
    }

    async fn update_password_hash(
        &self,
        account_id: AccountId,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let result = with_timeout(
            self.query_timeout,
            sqlx::query(
                "UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(account_id)
            .bind(password_hash)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_profile(
        &self,
        account_id: AccountId,
        username: &str,
        email: &str,
    ) -> StoreResult<Option<Account>> {
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                UPDATE accounts
                SET username = $2, email = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING id, username, email, created_at
                "#,
            )
            .bind(account_id)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn delete_account(&self, account_id: AccountId) -> StoreResult<bool> {
        // Sessions and memberships go with it (ON DELETE CASCADE)
        let result = with_timeout(
            self.query_timeout,
            sqlx::query("DELETE FROM accounts WHERE id = $1")
                .bind(account_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn create_session(
        &self,
        account_id: AccountId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<RefreshToken> {
        let query = format!(
            "INSERT INTO refresh_tokens (account_id, token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING {SESSION_COLUMNS}"
        );
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query)
                .bind(account_id)
                .bind(token_hash)
                .bind(expires_at)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(session_from_row(&row))
    }

    async fn find_sessions_by_account(
        &self,
        account_id: AccountId,
    ) -> StoreResult<Vec<RefreshToken>> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM refresh_tokens WHERE account_id = $1 ORDER BY id"
        );
        let rows = with_timeout(
            self.query_timeout,
            sqlx::query(&query).bind(account_id).fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(session_from_row).collect())
    }

    async fn rotate_session(
        &self,
        session_id: SessionId,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // Compare-and-swap on the hash: a concurrent rotation of the same
        // secret updates zero rows here.
        let result = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                UPDATE refresh_tokens
                SET token_hash = $3, expires_at = $4
                WHERE id = $1 AND token_hash = $2
                "#,
            )
            .bind(session_id)
            .bind(current_hash)
            .bind(new_hash)
            .bind(new_expires_at)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_session(&self, session_id: SessionId) -> StoreResult<bool> {
        let result = with_timeout(
            self.query_timeout,
            sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
                .bind(session_id)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = with_timeout(
            self.query_timeout,
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
                .bind(now)
                .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ClassRepository for PgStore {
    async fn create_class(
        &self,
        name: &str,
        description: &str,
        creator_id: AccountId,
    ) -> StoreResult<Class> {
        let query = format!(
            "INSERT INTO classes (name, description, creator_id)
             VALUES ($1, $2, $3)
             RETURNING {CLASS_COLUMNS}"
        );

        with_timeout(self.transaction_timeout, async {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query(&query)
                .bind(name)
                .bind(description)
                .bind(creator_id)
                .fetch_one(&mut *tx)
                .await?;
            let class = class_from_row(&row);

            sqlx::query("INSERT INTO class_members (class_id, account_id, role) VALUES ($1, $2, $3)")
                .bind(class.id)
                .bind(creator_id)
                .bind(Role::Admin.as_str())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<_, sqlx::Error>(class)
        })
        .await
    }

    async fn find_class(&self, class_id: ClassId) -> StoreResult<Option<Class>> {
        let query = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1");
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query).bind(class_id).fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(class_from_row))
    }

    async fn find_member(
        &self,
        class_id: ClassId,
        account_id: AccountId,
    ) -> StoreResult<Option<ClassMember>> {
        with_timeout(self.query_timeout, async {
            let row = sqlx::query(
                r#"
                SELECT class_id, account_id, role, joined_at
                FROM class_members
                WHERE class_id = $1 AND account_id = $2
                "#,
            )
            .bind(class_id)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;

            row.map(|row| {
                Ok::<_, sqlx::Error>(ClassMember {
                    class_id: row.get("class_id"),
                    account_id: row.get("account_id"),
                    role: role_from_row(&row)?,
                    joined_at: row.get("joined_at"),
                })
            })
            .transpose()
        })
        .await
    }

    async fn list_classes_for(&self, account_id: AccountId) -> StoreResult<Vec<ClassSummary>> {
        with_timeout(self.query_timeout, async {
            let rows = sqlx::query(
                r#"
                SELECT c.id, c.name, c.description, m.role
                FROM classes c
                JOIN class_members m ON m.class_id = c.id
                WHERE m.account_id = $1
                ORDER BY c.id
                "#,
            )
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

            rows.iter()
                .map(|row| {
                    Ok::<_, sqlx::Error>(ClassSummary {
                        id: row.get("id"),
                        name: row.get("name"),
                        description: row.get("description"),
                        role: role_from_row(row)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    async fn update_class_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        name: &str,
        description: &str,
    ) -> StoreResult<Option<Class>> {
        let query = format!(
            "UPDATE classes
             SET name = $3, description = $4, updated_at = NOW()
             WHERE id = $1
               AND EXISTS (
                   SELECT 1 FROM class_members
                   WHERE class_id = $1 AND account_id = $2 AND role = $5
               )
             RETURNING {CLASS_COLUMNS}"
        );
        let row = with_timeout(
            self.query_timeout,
            sqlx::query(&query)
                .bind(class_id)
                .bind(admin_id)
                .bind(name)
                .bind(description)
                .bind(Role::Admin.as_str())
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(class_from_row))
    }

    async fn delete_class_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
    ) -> StoreResult<bool> {
        // Memberships and join codes go with it (ON DELETE CASCADE)
        let result = with_timeout(
            self.query_timeout,
            sqlx::query(
                r#"
                DELETE FROM classes
                WHERE id = $1
                  AND EXISTS (
                      SELECT 1 FROM class_members
                      WHERE class_id = $1 AND account_id = $2 AND role = $3
                  )
                "#,
            )
            .bind(class_id)
            .bind(admin_id)
            .bind(Role::Admin.as_str())
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_join_code_if_admin(
        &self,
        class_id: ClassId,
        admin_id: AccountId,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Option<JoinCode>> {
        with_timeout(self.transaction_timeout, async {
            let mut tx = self.pool.begin().await?;

            // Hold the admin row until commit so a concurrent demotion or class
            // deletion cannot interleave with the replacement
            let member = sqlx::query(
                "SELECT role FROM class_members WHERE class_id = $1 AND account_id = $2 FOR SHARE",
            )
            .bind(class_id)
            .bind(admin_id)
            .fetch_optional(&mut *tx)
            .await?;

            let is_admin = match member {
                Some(row) => role_from_row(&row)?.is_admin(),
                None => false,
            };
            if !is_admin {
                return Ok::<_, sqlx::Error>(None);
            }

            // One row per class: the upsert invalidates the previous code
            let row = sqlx::query(
                r#"
                INSERT INTO join_codes (class_id, code, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (class_id)
                DO UPDATE SET
                    code = EXCLUDED.code,
                    expires_at = EXCLUDED.expires_at,
                    created_at = NOW()
                RETURNING class_id, code, expires_at
                "#,
            )
            .bind(class_id)
            .bind(code)
            .bind(expires_at)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(Some(join_code_from_row(&row)))
        })
        .await
    }

    async fn redeem_join_code(
        &self,
        code: &str,
        account_id: AccountId,
        role: Role,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<JoinOutcome>> {
        // FOR SHARE holds off a concurrent replace until this statement commits;
        // a replace that committed first makes the row fail the code match.
        with_timeout(self.query_timeout, async {
            let row = sqlx::query(
                r#"
                WITH code AS (
                    SELECT class_id FROM join_codes
                    WHERE code = $1 AND expires_at > $3
                    FOR SHARE
                ),
                inserted AS (
                    INSERT INTO class_members (class_id, account_id, role)
                    SELECT class_id, $2, $4 FROM code
                    ON CONFLICT (class_id, account_id) DO NOTHING
                    RETURNING class_id, role
                )
                SELECT
                    code.class_id,
                    COALESCE(inserted.role, existing.role, $4) AS role,
                    inserted.class_id IS NULL AS already_member
                FROM code
                LEFT JOIN inserted ON inserted.class_id = code.class_id
                LEFT JOIN class_members existing
                    ON existing.class_id = code.class_id AND existing.account_id = $2
                "#,
            )
            .bind(code)
            .bind(account_id)
            .bind(now)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;

            row.map(|row| {
                Ok::<_, sqlx::Error>(JoinOutcome {
                    class_id: row.get("class_id"),
                    role: role_from_row(&row)?,
                    already_member: row.get("already_member"),
                })
            })
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        with_timeout(
            self.query_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await?;
        Ok(())
    }
}
