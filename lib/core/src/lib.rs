//! Core types shared by the openid-gate crates.
//!
//! This crate provides the `Result` alias used across layers and the
//! strongly-typed identifiers for sessions and saved requests.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId, SnapshotId};
