//! HTTP server for the private instruction classroom service.
//!
//! The binary in `main.rs` wires configuration, the PostgreSQL store and the
//! managers of [`private_instruction`] into the router built by [`api`].

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
