//! Core trait definitions
//!
//! The orchestrator only talks to its collaborators through these seams:
//! - **AnalysisCapability:** one document text → structured fields (stage 1)
//! - **PatternRecognizer:** full analyzed set → one report facet (stage 1b)
//! - **ChapterSynthesizer:** one theme → one chapter (stage 3)
//!
//! # Architecture
//! Implementations are selected at construction time and handed to the
//! orchestrator as trait objects; nothing downstream inspects which
//! implementation it got.

use crate::error::{RecognizerError, SynthesisError};
use crate::models::{
    AnalysisOutput, AnalyzedDocument, Facet, PatternReport, SynthesisChapter, Theme,
};

// ============================================================================
// Stage 1: Analysis Capability
// ============================================================================

/// Pluggable per-document analysis
///
/// Must be total: an implementation that cannot analyze a text returns
/// [`AnalysisOutput::failed`] rather than an error, and must never panic.
/// The orchestrator applies timeout and retry around every call.
///
/// # Example
/// ```rust,ignore
/// use insight_pipeline::types::AnalysisCapability;
/// use insight_pipeline::models::AnalysisOutput;
///
/// pub struct EchoCapability;
///
/// #[async_trait::async_trait]
/// impl AnalysisCapability for EchoCapability {
///     fn name(&self) -> &'static str { "echo" }
///
///     async fn analyze(&self, text: &str) -> AnalysisOutput {
///         AnalysisOutput {
///             core_principle: text.lines().next().unwrap_or_default().to_string(),
///             ..Default::default()
///         }
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait AnalysisCapability: Send + Sync {
    /// Capability name for logs and the degradation manifest
    fn name(&self) -> &'static str;

    /// Analyze one document text
    async fn analyze(&self, text: &str) -> AnalysisOutput;
}

// ============================================================================
// Stage 1b: Pattern Recognizers
// ============================================================================

/// One independent facet analyzer
///
/// Recognizers never see each other's output, which is what makes running
/// them concurrently safe. CPU-bound; run on the blocking pool.
pub trait PatternRecognizer: Send + Sync {
    /// Recognizer name; fan-in orders results by this key
    fn name(&self) -> &'static str;

    /// Compute this recognizer's facet over the full analyzed set
    ///
    /// # Errors
    /// Returns `RecognizerError` when the facet cannot be computed; the
    /// report records the facet as absent and the run continues.
    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError>;
}

// ============================================================================
// Stage 3: Chapter Synthesizer
// ============================================================================

/// Per-theme synthesis
#[async_trait::async_trait]
pub trait ChapterSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesize the chapter for one theme
    ///
    /// # Arguments
    /// * `theme` - Theme to synthesize
    /// * `documents` - Full analyzed set (members are looked up by id)
    /// * `report` - Pattern report; facets may be absent
    ///
    /// # Errors
    /// Returns `SynthesisError` for this theme only; other themes proceed.
    async fn synthesize(
        &self,
        theme: &Theme,
        documents: &[AnalyzedDocument],
        report: &PatternReport,
    ) -> Result<SynthesisChapter, SynthesisError>;
}
