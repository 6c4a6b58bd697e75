//! Pipeline workflow
//!
//! [`orchestrator::Orchestrator`] drives the stages in order and persists
//! each stage output as a checkpoint before the state machine in
//! [`state`] is allowed to move past it.
//!
//! # Stage outputs (checkpoint payloads)
//! 1. **deconstruction** - `Vec<AnalyzedDocument>`, sorted by document id
//! 2. **patterns** - [`PatternReport`](crate::models::PatternReport)
//! 3. **categorization** - [`ThemeStructure`](crate::models::ThemeStructure)
//! 4. **synthesis** - [`SynthesisOutput`]
//! 5. **validation** - [`ValidationOutput`]

pub mod orchestrator;
pub mod state;

pub use orchestrator::Orchestrator;
pub use state::{PipelineRun, PipelineState, Stage, StateTransition};

use crate::models::{DegradedItem, SynthesisChapter, ValidationReport};
use serde::{Deserialize, Serialize};

/// Stage 3 checkpoint payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutput {
    /// Sorted by theme id
    pub chapters: Vec<SynthesisChapter>,
    /// Themes whose synthesis failed, sorted by theme id
    pub pending_review: Vec<DegradedItem>,
}

/// Stage 4 checkpoint payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutput {
    /// One report per chapter, sorted by theme id
    pub reports: Vec<ValidationReport>,
    /// Chapters changed by corrections (version 2), sorted by theme id
    pub amended_chapters: Vec<SynthesisChapter>,
}

/// Progress event emitted while a run executes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Run accepted
    RunStarted {
        run_id: String,
        document_count: usize,
        resume_from: Option<Stage>,
    },

    /// Stage began computing
    StageStarted { run_id: String, stage: Stage },

    /// Stage output checkpointed (or loaded, when `resumed`)
    StageCompleted {
        run_id: String,
        stage: Stage,
        resumed: bool,
        /// Items in the stage output (documents, facets, themes, chapters, reports)
        items: usize,
    },

    /// Run stopped in a failed state
    RunFailed {
        run_id: String,
        stage: Stage,
        reason: String,
    },

    /// Run reached COMPLETE
    RunCompleted {
        run_id: String,
        chapters: usize,
        escalated: usize,
        degraded_items: usize,
    },
}
