//! Final report and degradation manifest

use super::document::AnalyzedDocument;
use super::patterns::PatternReport;
use super::synthesis::SynthesisChapter;
use super::theme::{Orphan, Theme};
use super::validation::ValidationReport;
use crate::workflow::state::{Stage, StateTransition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Item that did not go through the happy path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedItem {
    /// Document id, recognizer name or theme id
    pub item_id: String,
    pub reason: String,
}

/// Everything degraded or escalated during a run
///
/// Always part of the final report; an empty manifest means a clean run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationManifest {
    /// Stub documents (no capability answered)
    pub failed_analyses: Vec<DegradedItem>,
    /// Documents answered by the fallback capability
    pub fallback_analyses: Vec<DegradedItem>,
    pub recognizer_failures: Vec<DegradedItem>,
    /// No theme met the membership threshold
    pub all_orphaned: bool,
    /// Themes whose synthesis failed, escalated to human review
    pub pending_review: Vec<DegradedItem>,
    /// Chapters escalated by validation
    pub unvalidated_chapters: Vec<DegradedItem>,
}

impl DegradationManifest {
    pub fn is_clean(&self) -> bool {
        self.failed_analyses.is_empty()
            && self.fallback_analyses.is_empty()
            && self.recognizer_failures.is_empty()
            && !self.all_orphaned
            && self.pending_review.is_empty()
            && self.unvalidated_chapters.is_empty()
    }

    pub fn total(&self) -> usize {
        self.failed_analyses.len()
            + self.fallback_analyses.len()
            + self.recognizer_failures.len()
            + self.pending_review.len()
            + self.unvalidated_chapters.len()
            + usize::from(self.all_orphaned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub schema_version: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Last stage loaded from checkpoints instead of recomputed
    pub resumed_from: Option<Stage>,
    pub document_count: usize,
    pub failed_document_count: usize,
    pub theme_count: usize,
    pub orphan_count: usize,
    pub chapter_count: usize,
    pub escalated_count: usize,
    pub transitions: Vec<StateTransition>,
}

/// Aggregate result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub run_id: String,
    pub documents: Vec<AnalyzedDocument>,
    pub pattern_report: PatternReport,
    pub themes: Vec<Theme>,
    pub orphans: Vec<Orphan>,
    /// As synthesized (version 1), sorted by theme id
    pub chapters: Vec<SynthesisChapter>,
    /// Versions produced by applying validation corrections
    pub amended_chapters: Vec<SynthesisChapter>,
    /// Sorted by theme id
    pub validations: Vec<ValidationReport>,
    pub manifest: DegradationManifest,
    pub run_metadata: RunMetadata,
}

impl FinalReport {
    pub fn chapter(&self, theme_id: &str) -> Option<&SynthesisChapter> {
        self.chapters.iter().find(|c| c.theme_id == theme_id)
    }

    pub fn validation(&self, theme_id: &str) -> Option<&ValidationReport> {
        self.validations.iter().find(|v| v.theme_id == theme_id)
    }
}
