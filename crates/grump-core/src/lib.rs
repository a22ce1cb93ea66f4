//! Grump Core - configuration, knowledge store and prompt integration
//!
//! This crate owns the process-wide state of the knowledge pipeline.
//!
//! # Modules
//!
//! - [`config`] - Knowledge base configuration (defaults, env, TOML)
//! - [`store`] - Single-writer snapshot store with atomic swap
//! - [`prompt`] - Per-backend system prompts with versioned knowledge splicing

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod prompt;
pub mod store;

pub use config::*;
pub use prompt::*;
pub use store::*;

use thiserror::Error;

/// Core error type for Grump
#[derive(Error, Debug)]
pub enum GrumpError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML or JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias using [`GrumpError`]
pub type Result<T> = std::result::Result<T, GrumpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_and_describe_themselves() {
        let err: GrumpError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, GrumpError::Io(_)));
        assert_eq!(err.to_string(), "IO error: gone");
        assert_eq!(
            GrumpError::Config("max_total_chars must be > 0".into()).to_string(),
            "Invalid configuration: max_total_chars must be > 0"
        );
    }
}
