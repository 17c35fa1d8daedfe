//! # Private Instruction
//!
//! Credential, session and class-authorization core of a classroom backend.
//!
//! Accounts sign up and sign in with a password, receive a short-lived signed
//! access token plus a long-lived refresh secret that is rotated on every use,
//! and create or join classes whose mutations are gated on the caller's role.
//!
//! ## Core Modules
//!
//! - [`auth`]: Password hashing, token issuing, identity extraction and the
//!   sign-up / sign-in / refresh lifecycle
//! - [`account`]: Reading, updating and deleting the caller's account
//! - [`class`]: Classes, memberships, join codes and role checks
//! - [`db`]: Repository traits with PostgreSQL and in-memory implementations
//!
//! Services take a verified [`auth::Identity`]'s account id; none of them reads
//! identity from request bodies.

pub mod account;
pub mod auth;
pub mod class;
pub mod db;

pub use account::AccountManager;
pub use auth::{AuthConfig, AuthError, AuthManager, Identity};
pub use class::{ClassError, ClassManager, Role};
