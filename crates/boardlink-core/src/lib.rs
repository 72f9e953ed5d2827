//! Core types for Boardlink.
//!
//! This crate defines the foundational abstractions shared across the
//! workspace: the unified error type and the server configuration layer.

pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::{Error, Result};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::error::{Error, Result};
}
