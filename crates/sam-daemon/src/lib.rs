//! sam-daemon library target.
//!
//! Exposes the router, dispatcher and state for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod auth;
pub mod dispatch;
pub mod routes;
pub mod state;
