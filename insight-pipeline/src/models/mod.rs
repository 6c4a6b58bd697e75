//! Data model shared by every stage
//!
//! All stage outputs are plain serializable values. Collections that end up
//! in checkpoints use ordered containers so the same input always serializes
//! to the same bytes.

pub mod document;
pub mod patterns;
pub mod report;
pub mod synthesis;
pub mod theme;
pub mod validation;
pub mod vocabulary;

pub use document::{
    AnalysisOutput, AnalysisStatus, AnalyzedDocument, ContradictionRef, Document, Rules,
    FAILURE_TAG,
};
pub use patterns::{
    ConceptStat, ContradictionEntry, ContradictionFacet, ContradictionOrigin, CooccurrenceFacet,
    CooccurrencePair, EmotionalFacet, Facet, FrequencyFacet, LikelyRelationship,
    NegativeSpaceFacet, PatternReport, RecognizerFailure, ResolutionStatus, Significance,
    TemporalFacet,
};
pub use report::{DegradationManifest, DegradedItem, FinalReport, RunMetadata};
pub use synthesis::{
    ActionableRule, Contradiction, EngineFlag, Evolution, EvidenceRef, Position, Principle,
    ResolutionHypothesis, RuleKind, SynthesisChapter,
};
pub use theme::{CrossThemePattern, Orphan, Theme, ThemeStructure};
pub use validation::{CheckName, CheckOutcome, CheckResult, Correction, ValidationReport};
pub use vocabulary::Vocabulary;
