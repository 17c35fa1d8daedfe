//! Class, membership and join-code models.

use crate::auth::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Class ID type
pub type ClassId = i64;

/// Name given to classes created without one
pub const DEFAULT_CLASS_NAME: &str = "Unnamed Class";

/// Membership role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May update, delete and issue join codes for the class
    Admin,
    /// Regular member
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Also accepts the older `instructor`/`student` names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "instructor" => Ok(Role::Admin),
            "user" | "student" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Class model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub description: String,
    /// `None` once the creating account has been deleted
    pub creator_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
}

/// Membership of an account in a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMember {
    pub class_id: ClassId,
    pub account_id: AccountId,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Join code for a class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCode {
    pub class_id: ClassId,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl JoinCode {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Class creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateClassRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Class update request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateClassRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Class as seen by one of its members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDetails {
    pub id: ClassId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Username of the creator, if the account still exists
    pub created_by: Option<String>,
    /// Role of the caller
    pub role: Role,
}

/// Entry of the caller's class list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub id: ClassId,
    pub name: String,
    pub description: String,
    pub role: Role,
}

/// Result of redeeming a join code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    pub class_id: ClassId,
    pub role: Role,
    /// The caller was a member before redeeming the code
    pub already_member: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_legacy_role_names() {
        assert_eq!("instructor".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("Student".parse::<Role>().unwrap(), Role::User);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
    }
}
