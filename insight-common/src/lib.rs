//! # Insight Common Library
//!
//! Shared code for the insight pipeline workspace:
//! - Error types (`Error`, `Result`)
//! - TOML bootstrap configuration and pipeline tuning settings
//! - Tracing subscriber initialization

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
