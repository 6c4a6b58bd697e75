//! Error type shared by the insight crates
//!
//! Stage-specific failures live in `insight_pipeline::error`; this enum
//! covers what both crates touch: storage, files, configuration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite checkpoint database
    #[error("Checkpoint database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database stayed locked past the allowed wait
    #[error("{operation}: database locked after {attempts} attempts ({waited_ms} ms)")]
    LockTimeout {
        operation: String,
        attempts: u32,
        waited_ms: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad TOML, bad value, or out-of-range setting
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input directory or document missing
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
