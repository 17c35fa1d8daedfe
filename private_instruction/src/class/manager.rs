//! Class manager implementation.

use super::{
    errors::{ClassError, ClassResult},
    join_code::{generate_join_code, normalize_join_code},
    models::{
        Class, ClassDetails, ClassId, ClassSummary, CreateClassRequest, DEFAULT_CLASS_NAME,
        JoinCode, JoinOutcome, Role, UpdateClassRequest,
    },
};
use crate::auth::AccountId;
use crate::db::{AccountRepository, ClassRepository, StoreError};
use chrono::{Duration, Utc};
use std::sync::Arc;

pub const MAX_CLASS_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 4096;

/// Attempts at drawing a join code not used by another class
const JOIN_CODE_ATTEMPTS: usize = 3;

/// Class manager
#[derive(Clone)]
pub struct ClassManager {
    classes: Arc<dyn ClassRepository>,
    accounts: Arc<dyn AccountRepository>,
    join_code_ttl: Duration,
}

impl ClassManager {
    /// Create a new class manager
    ///
    /// # Arguments
    ///
    /// * `classes` - Class, membership and join-code persistence
    /// * `accounts` - Account lookups for creator names
    /// * `join_code_ttl` - Lifetime of issued join codes
    pub fn new(
        classes: Arc<dyn ClassRepository>,
        accounts: Arc<dyn AccountRepository>,
        join_code_ttl: Duration,
    ) -> Self {
        Self {
            classes,
            accounts,
            join_code_ttl,
        }
    }

    /// Create a class with the caller as its admin
    ///
    /// An empty name becomes [`DEFAULT_CLASS_NAME`].
    ///
    /// # Errors
    ///
    /// * `ClassError::Validation` - Name or description too long
    /// * `ClassError::Unauthorized` - The caller's account no longer exists
    pub async fn create_class(
        &self,
        creator_id: AccountId,
        request: CreateClassRequest,
    ) -> ClassResult<Class> {
        let (name, description) = normalize_class_input(&request.name, &request.description)?;

        let class = self
            .classes
            .create_class(&name, &description, creator_id)
            .await
            .map_err(|e| match e {
                StoreError::ForeignKey(_) => ClassError::Unauthorized,
                other => ClassError::Internal(other),
            })?;

        log::info!("Account {creator_id} created class {} ({})", class.id, class.name);
        Ok(class)
    }

    /// Read a class as one of its members
    ///
    /// # Errors
    ///
    /// * `ClassError::ClassNotFound` - No such class
    /// * `ClassError::Unauthorized` - Caller is not a member
    pub async fn read_class(
        &self,
        class_id: ClassId,
        caller_id: AccountId,
    ) -> ClassResult<ClassDetails> {
        let class = self
            .classes
            .find_class(class_id)
            .await?
            .ok_or(ClassError::ClassNotFound)?;

        let member = self
            .classes
            .find_member(class_id, caller_id)
            .await?
            .ok_or(ClassError::Unauthorized)?;

        let created_by = match class.creator_id {
            Some(creator_id) => self
                .accounts
                .find_by_id(creator_id)
                .await?
                .map(|record| record.account.username),
            None => None,
        };

        Ok(ClassDetails {
            id: class.id,
            name: class.name,
            description: class.description,
            created_at: class.created_at,
            created_by,
            role: member.role,
        })
    }

    /// Every class the caller belongs to, with the caller's role
    pub async fn list_classes(&self, caller_id: AccountId) -> ClassResult<Vec<ClassSummary>> {
        Ok(self.classes.list_classes_for(caller_id).await?)
    }

    /// Update name and description
    ///
    /// # Errors
    ///
    /// * `ClassError::Validation` - Name or description too long
    /// * `ClassError::ClassNotFound` - No such class
    /// * `ClassError::Unauthorized` - Caller is not an admin of the class
    pub async fn update_class(
        &self,
        class_id: ClassId,
        caller_id: AccountId,
        request: UpdateClassRequest,
    ) -> ClassResult<Class> {
        let (name, description) = normalize_class_input(&request.name, &request.description)?;
        self.authorize_admin(class_id, caller_id).await?;

        match self
            .classes
            .update_class_if_admin(class_id, caller_id, &name, &description)
            .await?
        {
            Some(class) => {
                log::info!("Account {caller_id} updated class {class_id}");
                Ok(class)
            }
            None => Err(self.rejection(class_id, caller_id).await),
        }
    }

    /// Delete a class along with its memberships and join codes
    ///
    /// # Errors
    ///
    /// * `ClassError::ClassNotFound` - No such class
    /// * `ClassError::Unauthorized` - Caller is not an admin of the class
    pub async fn delete_class(&self, class_id: ClassId, caller_id: AccountId) -> ClassResult<()> {
        self.authorize_admin(class_id, caller_id).await?;

        if !self
            .classes
            .delete_class_if_admin(class_id, caller_id)
            .await?
        {
            return Err(self.rejection(class_id, caller_id).await);
        }

        log::info!("Account {caller_id} deleted class {class_id}");
        Ok(())
    }

    /// Issue a new join code for a class, invalidating the previous one
    ///
    /// # Errors
    ///
    /// * `ClassError::ClassNotFound` - No such class
    /// * `ClassError::Unauthorized` - Caller is not an admin of the class
    pub async fn generate_join_code(
        &self,
        class_id: ClassId,
        caller_id: AccountId,
    ) -> ClassResult<JoinCode> {
        self.authorize_admin(class_id, caller_id).await?;

        let mut last_conflict = None;
        for _ in 0..JOIN_CODE_ATTEMPTS {
            let code = generate_join_code();
            let expires_at = Utc::now() + self.join_code_ttl;

            match self
                .classes
                .replace_join_code_if_admin(class_id, caller_id, &code, expires_at)
                .await
            {
                Ok(Some(join_code)) => {
                    log::info!("Account {caller_id} issued a join code for class {class_id}");
                    return Ok(join_code);
                }
                Ok(None) => return Err(self.rejection(class_id, caller_id).await),
                Err(StoreError::Conflict(constraint)) => {
                    log::debug!("Join code collision on {constraint}, drawing again");
                    last_conflict = Some(StoreError::Conflict(constraint));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ClassError::Internal(last_conflict.unwrap_or_else(|| {
            StoreError::Conflict("join_codes_code_key".to_string())
        })))
    }

    /// Redeem a join code, becoming a regular member of its class
    ///
    /// Redeeming a code of a class the caller already belongs to succeeds and
    /// keeps the existing role.
    ///
    /// # Errors
    ///
    /// * `ClassError::Validation` - Empty code
    /// * `ClassError::ClassNotFound` - Unknown or expired code, or class gone
    pub async fn join_class(&self, caller_id: AccountId, code: &str) -> ClassResult<JoinOutcome> {
        let code = normalize_join_code(code);
        if code.is_empty() {
            return Err(ClassError::Validation("join code is required".to_string()));
        }

        let outcome = self
            .classes
            .redeem_join_code(&code, caller_id, Role::User, Utc::now())
            .await
            .map_err(|e| match e {
                StoreError::ForeignKey(_) => ClassError::ClassNotFound,
                other => ClassError::Internal(other),
            })?;

        let Some(outcome) = outcome else {
            log::info!("Account {caller_id} presented an unknown or expired join code");
            return Err(ClassError::ClassNotFound);
        };
        if !outcome.already_member {
            log::info!("Account {caller_id} joined class {}", outcome.class_id);
        }
        Ok(outcome)
    }

    /// Resolve the class, then the caller's admin membership
    async fn authorize_admin(&self, class_id: ClassId, caller_id: AccountId) -> ClassResult<()> {
        if self.classes.find_class(class_id).await?.is_none() {
            return Err(ClassError::ClassNotFound);
        }

        match self.classes.find_member(class_id, caller_id).await? {
            Some(member) if member.role.is_admin() => Ok(()),
            _ => {
                log::warn!("Account {caller_id} is not an admin of class {class_id}");
                Err(ClassError::Unauthorized)
            }
        }
    }

    /// Error for a guarded write whose guard no longer held
    async fn rejection(&self, class_id: ClassId, caller_id: AccountId) -> ClassError {
        match self.authorize_admin(class_id, caller_id).await {
            Err(e) => e,
            Ok(()) => ClassError::Unauthorized,
        }
    }
}

fn normalize_class_input(name: &str, description: &str) -> ClassResult<(String, String)> {
    let name = match name.trim() {
        "" => DEFAULT_CLASS_NAME.to_string(),
        trimmed => trimmed.to_string(),
    };
    if name.chars().count() > MAX_CLASS_NAME_LEN {
        return Err(ClassError::Validation(format!(
            "class name must be at most {MAX_CLASS_NAME_LEN} characters"
        )));
    }

    let description = description.trim().to_string();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ClassError::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }

    Ok((name, description))
}
