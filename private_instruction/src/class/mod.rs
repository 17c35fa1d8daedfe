//! Classes, memberships and role-gated class operations.
//!
//! Every class has at least its creator as an admin member. Admins may update
//! or delete the class and issue join codes; anyone holding an unexpired code
//! joins as a regular user.

pub mod errors;
pub mod join_code;
pub mod manager;
pub mod models;

pub use errors::{ClassError, ClassResult};
pub use manager::ClassManager;
pub use models::{
    Class, ClassDetails, ClassId, ClassMember, ClassSummary, CreateClassRequest,
    DEFAULT_CLASS_NAME, JoinCode, JoinOutcome, Role, UpdateClassRequest,
};
