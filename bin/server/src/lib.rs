//! openid-gate server.
//!
//! This crate hosts the authentication gate in an Axum application: every
//! route except a few public ones is reachable only after an OpenID Connect
//! round-trip has established a principal for the browser's session.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;

pub use app::app;
pub use error::StartupError;
