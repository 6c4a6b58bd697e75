//! Stage 1: document deconstruction
//!
//! Maps the configured [`AnalysisCapability`] over every document on a
//! bounded worker pool. Per-document failures never abort the batch:
//!
//! 1. Primary capability, each attempt under a timeout, retried with backoff
//! 2. On exhaustion, the fallback capability (rule-based) once, if enabled
//! 3. Otherwise a stub document (`quality_score = 0`, `analysis-failed` tag)
//!
//! # Capabilities
//! - **rule_based** - offline keyword heuristics (default)
//! - **http** - JSON endpoint, language-model backed

pub mod http_client;
pub mod rule_based;

pub use http_client::HttpAnalyzer;
pub use rule_based::RuleBasedAnalyzer;

use crate::models::{AnalysisStatus, AnalyzedDocument, Document, Vocabulary};
use crate::types::AnalysisCapability;
use crate::utils::fanout::{join_failure, spawn_bounded};
use crate::utils::retry::{call_with_retry, RetryPolicy};
use insight_common::config::{AnalysisProvider, AnalysisSettings};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the primary capability and optional fallback from settings
pub fn build_capabilities(
    settings: &AnalysisSettings,
    policy: &RetryPolicy,
) -> insight_common::Result<(Arc<dyn AnalysisCapability>, Option<Arc<dyn AnalysisCapability>>)> {
    let rule_based = || -> insight_common::Result<Arc<dyn AnalysisCapability>> {
        let analyzer = RuleBasedAnalyzer::new()
            .map_err(|e| {
                insight_common::Error::Internal(format!("Rule-based analyzer init failed: {}", e))
            })?;
        Ok(Arc::new(analyzer))
    };

    match settings.provider {
        AnalysisProvider::RuleBased => Ok((rule_based()?, None)),
        AnalysisProvider::Http => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                insight_common::Error::Config(
                    "analysis.endpoint is required for the http provider".to_string(),
                )
            })?;
            let analyzer = HttpAnalyzer::new(
                endpoint,
                settings.model.clone(),
                settings.api_key.clone(),
                policy.call_timeout,
            )
            .map_err(|e| insight_common::Error::Config(e.to_string()))?;

            let fallback = if settings.fallback_to_rules {
                Some(rule_based()?)
            } else {
                None
            };
            Ok((Arc::new(analyzer), fallback))
        }
    }
}

/// Capability wrapper applying the timeout/retry/fallback policy
///
/// Total: always returns an [`AnalyzedDocument`], possibly a stub.
#[derive(Clone)]
pub struct ResilientAnalyzer {
    primary: Arc<dyn AnalysisCapability>,
    fallback: Option<Arc<dyn AnalysisCapability>>,
    policy: RetryPolicy,
    vocabulary: Arc<Vocabulary>,
}

impl ResilientAnalyzer {
    pub fn new(
        primary: Arc<dyn AnalysisCapability>,
        fallback: Option<Arc<dyn AnalysisCapability>>,
        policy: RetryPolicy,
        vocabulary: Vocabulary,
    ) -> Self {
        Self {
            primary,
            fallback,
            policy,
            vocabulary: Arc::new(vocabulary),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Analyze one document
    pub async fn analyze_document(&self, document: &Document) -> AnalyzedDocument {
        let primary = Arc::clone(&self.primary);
        let text = document.raw_text.as_str();

        let attempt = call_with_retry(
            "analyze",
            &document.id,
            &self.policy,
            |_: &String| true,
            || {
                let primary = Arc::clone(&primary);
                async move {
                    let output = primary.analyze(text).await;
                    match &output.failure {
                        Some(reason) => Err(reason.clone()),
                        None => Ok(output),
                    }
                }
            },
        )
        .await;

        let exhausted = match attempt {
            Ok(output) => {
                debug!(
                    document_id = %document.id,
                    capability = self.primary.name(),
                    "Document analyzed"
                );
                return AnalyzedDocument::from_output(
                    document,
                    output,
                    &self.vocabulary,
                    AnalysisStatus::Complete,
                );
            }
            Err(exhausted) => exhausted,
        };

        let reason = format!("{}: {}", self.primary.name(), exhausted);

        if let Some(fallback) = &self.fallback {
            match tokio::time::timeout(self.policy.call_timeout, fallback.analyze(text)).await {
                Ok(output) if !output.is_failure() => {
                    warn!(
                        document_id = %document.id,
                        fallback = fallback.name(),
                        reason = %reason,
                        "Primary analysis exhausted, used fallback capability"
                    );
                    return AnalyzedDocument::from_output(
                        document,
                        output,
                        &self.vocabulary,
                        AnalysisStatus::Degraded { reason },
                    );
                }
                Ok(output) => {
                    warn!(
                        document_id = %document.id,
                        fallback = fallback.name(),
                        error = output.failure.as_deref().unwrap_or_default(),
                        "Fallback analysis failed"
                    );
                }
                Err(_) => {
                    warn!(
                        document_id = %document.id,
                        fallback = fallback.name(),
                        "Fallback analysis timed out"
                    );
                }
            }
        }

        warn!(document_id = %document.id, reason = %reason, "Analysis failed, recording stub");
        AnalyzedDocument::stub(document, reason)
    }

    /// Owned variant of [`Self::analyze_document`] for spawned tasks
    async fn analyze_owned(self, document: Document) -> AnalyzedDocument {
        self.analyze_document(&document).await
    }

    /// Analyze every document on a bounded pool of spawned tasks
    ///
    /// Output is sorted by document id regardless of completion order. A
    /// capability that panics yields a stub for that document only.
    pub async fn analyze_all(
        &self,
        documents: &[Document],
        workers: usize,
    ) -> Vec<AnalyzedDocument> {
        let total = documents.len();
        info!(documents = total, workers, "Starting document analysis");

        let mut jobs = Vec::with_capacity(total);
        for document in documents {
            jobs.push((document.clone(), self.clone().analyze_owned(document.clone())));
        }

        let mut analyzed: Vec<AnalyzedDocument> = spawn_bounded(jobs, workers)
            .await
            .into_iter()
            .map(|(document, joined)| match joined {
                Ok(analyzed) => analyzed,
                Err(e) => {
                    let reason = format!("{}: {}", self.primary.name(), join_failure(e));
                    warn!(
                        document_id = %document.id,
                        reason = %reason,
                        "Analysis task failed, recording stub"
                    );
                    AnalyzedDocument::stub(&document, reason)
                }
            })
            .collect();

        analyzed.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let failed = analyzed.iter().filter(|d| d.is_failed()).count();
        let degraded = analyzed.iter().filter(|d| d.is_degraded()).count();
        info!(documents = total, failed, degraded, "Document analysis complete");

        analyzed
    }
}
