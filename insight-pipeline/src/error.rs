//! Error types for insight-pipeline
//!
//! Only structural failures surface as [`PipelineError`]. Per-item failures
//! (one document, one recognizer, one theme) are contained at their fan-out
//! boundary and recorded in the run's degradation manifest instead.

use crate::workflow::state::Stage;
use thiserror::Error;

/// Fatal pipeline error
///
/// Aborts the run. Checkpoints written before the failure are left intact.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Stage 1 must run but no documents were supplied
    #[error("Empty input: no documents to analyze")]
    EmptyInput,

    /// Fresh run requested under a run id that already has checkpoints
    #[error("Run id {run_id} already has {checkpoints} checkpoint(s); resume it or use a new id")]
    RunIdInUse { run_id: String, checkpoints: usize },

    /// Checkpoint could not be persisted
    #[error("Checkpoint write failed for stage {stage}: {source}")]
    CheckpointWrite {
        stage: Stage,
        #[source]
        source: CheckpointError,
    },

    /// Checkpoint could not be read back
    #[error("Checkpoint read failed for stage {stage}: {source}")]
    CheckpointRead {
        stage: Stage,
        #[source]
        source: CheckpointError,
    },

    /// Stored payload does not match its digest or does not decode
    #[error("Corrupted checkpoint for stage {stage}: {reason}")]
    CorruptedCheckpoint { stage: Stage, reason: String },

    /// Stored checkpoint was written by a different schema version
    #[error("Checkpoint schema mismatch for stage {stage}: found v{found}, expected v{expected}")]
    SchemaMismatch {
        stage: Stage,
        found: u32,
        expected: u32,
    },

    /// Resume requested from a point the stored checkpoints cannot support
    #[error("Invalid resume point {stage}: {reason}")]
    InvalidResumePoint { stage: Stage, reason: String },

    /// State machine refused a transition
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// A stage could not complete
    #[error("Stage {stage} failed (last completed: {}): {reason}", stage_label(.last_completed))]
    StageFailed {
        stage: Stage,
        last_completed: Option<Stage>,
        reason: String,
    },
}

fn stage_label(stage: &Option<Stage>) -> &'static str {
    stage.map(|s| s.as_str()).unwrap_or("none")
}

/// Checkpoint storage error
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Underlying storage failure (database, I/O)
    #[error("Storage error: {0}")]
    Storage(#[from] insight_common::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored row is unreadable
    #[error("Corrupted record: {0}")]
    Corrupted(String),
}

/// Pattern recognizer error (contained; the facet becomes absent)
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// Not enough usable documents for this facet
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Recognizer task panicked or was cancelled
    #[error("Recognizer task aborted: {0}")]
    Aborted(String),

    /// Internal processing error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Per-theme synthesis error (contained; the theme goes to pending review)
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Theme has no members
    #[error("Theme {0} has no member documents")]
    EmptyTheme(String),

    /// Theme references documents that were never analyzed
    #[error("Theme {theme_id} references unknown documents: {missing:?}")]
    MissingDocuments {
        theme_id: String,
        missing: Vec<String>,
    },

    /// Synthesizer call exhausted its retry budget
    #[error("Synthesis for theme {theme_id} exhausted {attempts} attempts: {reason}")]
    RetryExhausted {
        theme_id: String,
        attempts: u32,
        reason: String,
    },

    /// Internal processing error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Analysis transport error (HTTP capability internals)
///
/// Never escapes the capability: it is folded into the output's `failure`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("API error: status {status}: {body}")]
    Api { status: u16, body: String },

    /// Capability misconfigured
    #[error("Configuration error: {0}")]
    Config(String),
}
