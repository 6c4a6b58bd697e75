//! Stage 1b: pattern recognizers
//!
//! Six independent recognizers, each computing one facet of the
//! [`PatternReport`] over the full analyzed set.
//!
//! # Recognizers
//! 1. **frequency** - concept counts and significance
//! 2. **cooccurrence** - tag pairs appearing together
//! 3. **contradiction** - do vs don't rule conflicts on shared tags
//! 4. **temporal** - concepts per month, first/last seen
//! 5. **emotional** - emotional states and their mean quality
//! 6. **negative_space** - unused vocabulary and singleton tags
//!
//! # Parallel Execution
//! Every recognizer runs on the blocking pool. Fan-in sorts by recognizer
//! name, so the report never depends on completion order. A failing or
//! panicking recognizer leaves its facet absent; the others still land.
//!
//! Stub documents (analysis failed) are excluded from every statistic.

pub mod contradiction;
pub mod cooccurrence;
pub mod emotional;
pub mod frequency;
pub mod negative_space;
pub mod temporal;

pub use contradiction::{detect_contradictions, ContradictionRecognizer};
pub use cooccurrence::CooccurrenceRecognizer;
pub use emotional::EmotionalRecognizer;
pub use frequency::FrequencyRecognizer;
pub use negative_space::NegativeSpaceRecognizer;
pub use temporal::TemporalRecognizer;

use crate::error::RecognizerError;
use crate::models::{AnalyzedDocument, Facet, PatternReport, RecognizerFailure, Vocabulary};
use crate::types::PatternRecognizer;
use crate::utils::fanout::join_failure;
use futures::stream::{self, StreamExt};
use insight_common::config::PipelineSettings;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Documents whose analysis produced real fields
pub(crate) fn usable(documents: &[AnalyzedDocument]) -> impl Iterator<Item = &AnalyzedDocument> {
    documents.iter().filter(|d| !d.is_failed())
}

/// Fan-out executor for pattern recognizers
///
/// # Example
/// ```rust,ignore
/// let recognizers = ParallelRecognizers::standard(&settings, &vocabulary);
/// let report = recognizers.run_all(Arc::new(analyzed)).await;
///
/// for failure in &report.failures {
///     println!("{} failed: {}", failure.recognizer, failure.reason);
/// }
/// ```
pub struct ParallelRecognizers {
    recognizers: Vec<Arc<dyn PatternRecognizer>>,
    workers: usize,
}

impl ParallelRecognizers {
    pub fn new(recognizers: Vec<Arc<dyn PatternRecognizer>>, workers: usize) -> Self {
        Self {
            recognizers,
            workers: workers.max(1),
        }
    }

    /// The six standard recognizers configured from settings
    pub fn standard(settings: &PipelineSettings, vocabulary: &Vocabulary) -> Self {
        let recognizers: Vec<Arc<dyn PatternRecognizer>> = vec![
            Arc::new(FrequencyRecognizer::new(settings.frequency.clone())),
            Arc::new(CooccurrenceRecognizer::new(settings.cooccurrence.clone())),
            Arc::new(ContradictionRecognizer::new(settings.contradiction.clone())),
            Arc::new(TemporalRecognizer),
            Arc::new(EmotionalRecognizer),
            Arc::new(NegativeSpaceRecognizer::new(vocabulary.clone())),
        ];
        Self::new(recognizers, settings.workers)
    }

    pub fn count(&self) -> usize {
        self.recognizers.len()
    }

    /// Run every recognizer and merge the facets into one report
    pub async fn run_all(&self, documents: Arc<Vec<AnalyzedDocument>>) -> PatternReport {
        info!(
            recognizers = self.recognizers.len(),
            documents = documents.len(),
            "Running pattern recognizers"
        );

        let jobs: Vec<Arc<dyn PatternRecognizer>> = self.recognizers.clone();
        let mut outcomes: Vec<(&'static str, Result<Facet, RecognizerError>)> = stream::iter(jobs)
            .map(move |recognizer| {
                let documents = Arc::clone(&documents);
                async move {
                    let name = recognizer.name();
                    let joined =
                        tokio::task::spawn_blocking(move || recognizer.analyze(&documents)).await;
                    let result = match joined {
                        Ok(result) => result,
                        Err(e) => Err(RecognizerError::Aborted(join_failure(e))),
                    };
                    (name, result)
                }
            })
            .buffer_unordered(self.workers)
            .boxed()
            .collect()
            .await;

        outcomes.sort_by_key(|(name, _)| *name);

        let mut report = PatternReport::default();
        for (name, result) in outcomes {
            match result {
                Ok(facet) => {
                    debug!(recognizer = name, "Recognizer complete");
                    report.insert(facet);
                }
                Err(e) => {
                    warn!(recognizer = name, error = %e, "Recognizer failed, facet absent");
                    report.failures.push(RecognizerFailure {
                        recognizer: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            facets = report.present_facets(),
            failures = report.failures.len(),
            "Pattern recognition complete"
        );
        report
    }
}

// ============================================================================
// Test Support
// ============================================================================
