//! HTTP API layer.

pub mod auth;
pub mod routes;
pub mod tasks;
pub mod types;

pub use routes::{serve, AppState};
