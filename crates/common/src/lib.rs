//! Stagecast Common Utilities
//!
//! Shared infrastructure for all Stagecast crates:
//! - Error types and result aliases
//! - Session clock utilities
//! - Tracing/logging initialization
//! - Session defaults loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
