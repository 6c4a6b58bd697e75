//! insight-pipeline library interface
//!
//! Turns a directory of free-text documents into themed, cross-referenced
//! chapters through four checkpointed stages:
//!
//! 1. **deconstruction** (`analysis`) - one structured record per document
//! 2. **categorization** (`recognizers`, `clustering`) - pattern facets, themes, orphans
//! 3. **synthesis** (`synthesis`) - one chapter per theme
//! 4. **validation** (`validators`) - quality checks, corrections, escalation
//!
//! `workflow::Orchestrator` runs the stages and owns recovery.

pub mod analysis;
pub mod checkpoint;
pub mod clustering;
pub mod error;
pub mod ingest;
pub mod models;
pub mod output;
pub mod recognizers;
pub mod synthesis;
pub mod types;
pub mod utils;
pub mod validators;
pub mod workflow;

pub use crate::error::{CheckpointError, PipelineError};
pub use crate::workflow::{Orchestrator, PipelineEvent, Stage};
