//! Profile operations of the signed-in account.

pub mod manager;

pub use manager::{AccountManager, UpdateAccountRequest};
