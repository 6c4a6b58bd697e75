//! Pipeline orchestrator
//!
//! # State Progression
//! INIT → STAGE1_DONE → PATTERNS_DONE → STAGE2_DONE → STAGE3_DONE → STAGE4_DONE
//! → COMPLETE
//!
//! # Architecture
//! Each stage is computed (or, on resume, loaded), checkpointed, and only
//! then does the state machine move past it:
//!
//! 1. **deconstruction** - [`ResilientAnalyzer::analyze_all`] on the worker pool
//! 2. **patterns** - [`ParallelRecognizers::run_all`] fan-out/fan-in
//! 3. **categorization** - [`ThematicClusterer::cluster`]
//! 4. **synthesis** - one [`ChapterSynthesizer`] call per theme, retried, failures
//!    go to pending review
//! 5. **validation** - [`ValidationEngine::validate_all`] plus amended chapters
//!
//! # Resume
//! With `resume_from = Some(stage)`, every stage up to and including `stage`
//! is read back from the store (latest record, schema version and digest
//! verified) instead of recomputed. Later stages are recomputed and appended.
//!
//! # Example
//! ```rust,ignore
//! let store = Arc::new(SqliteCheckpointStore::open(&db_path).await?);
//! let orchestrator = Orchestrator::from_settings(config.pipeline.clone(), store)?;
//!
//! let report = orchestrator.run("run-42", documents, None).await?;
//! // after a crash during synthesis:
//! let report = orchestrator.run("run-42", Vec::new(), Some(Stage::Categorization)).await?;
//! ```

use super::state::{PipelineRun, PipelineState, Stage};
use super::{PipelineEvent, SynthesisOutput, ValidationOutput};
use crate::analysis::{build_capabilities, ResilientAnalyzer};
use crate::checkpoint::{Checkpoint, CheckpointStore, SCHEMA_VERSION};
use crate::clustering::ThematicClusterer;
use crate::error::{PipelineError, SynthesisError};
use crate::models::{
    AnalysisStatus, AnalyzedDocument, DegradationManifest, DegradedItem, Document, FinalReport,
    PatternReport, RunMetadata, SynthesisChapter, Theme, ThemeStructure, Vocabulary,
};
use crate::recognizers::ParallelRecognizers;
use crate::synthesis::SynthesisEngine;
use crate::types::ChapterSynthesizer;
use crate::utils::fanout::{join_failure, spawn_bounded};
use crate::utils::retry::{call_with_retry, RetryPolicy};
use crate::validators::ValidationEngine;
use chrono::Utc;
use insight_common::config::PipelineSettings;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub struct Orchestrator {
    settings: PipelineSettings,
    analyzer: ResilientAnalyzer,
    recognizers: ParallelRecognizers,
    clusterer: ThematicClusterer,
    synthesizer: Arc<dyn ChapterSynthesizer>,
    validator: ValidationEngine,
    store: Arc<dyn CheckpointStore>,
    policy: RetryPolicy,
    events: Option<UnboundedSender<PipelineEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator from explicit collaborators
    ///
    /// Recognizers, clusterer and validator are configured from `settings`;
    /// the recognizers use the analyzer's vocabulary.
    pub fn new(
        settings: PipelineSettings,
        analyzer: ResilientAnalyzer,
        synthesizer: Arc<dyn ChapterSynthesizer>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let recognizers = ParallelRecognizers::standard(&settings, analyzer.vocabulary());
        Self {
            recognizers,
            clusterer: ThematicClusterer::new(settings.clustering.clone()),
            validator: ValidationEngine::new(settings.validation.clone()),
            policy: RetryPolicy::from(&settings.retry),
            settings,
            analyzer,
            synthesizer,
            store,
            events: None,
        }
    }

    /// Create an orchestrator with the capabilities named in `settings`
    pub fn from_settings(
        settings: PipelineSettings,
        store: Arc<dyn CheckpointStore>,
    ) -> insight_common::Result<Self> {
        settings.validate()?;

        let policy = RetryPolicy::from(&settings.retry);
        let (primary, fallback) = build_capabilities(&settings.analysis, &policy)?;
        let vocabulary = Vocabulary::new(&settings.vocabulary);
        let analyzer = ResilientAnalyzer::new(primary, fallback, policy, vocabulary);
        let synthesizer = Arc::new(SynthesisEngine::new(
            settings.synthesis.clone(),
            settings.contradiction.match_threshold,
        ));

        info!(
            provider = ?settings.analysis.provider,
            workers = settings.workers,
            vocabulary = settings.vocabulary.len(),
            "Orchestrator initialized"
        );

        Ok(Self::new(settings, analyzer, synthesizer, store))
    }

    /// Send progress events to `sender`
    pub fn with_events(mut self, sender: UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Replace the standard recognizer set
    pub fn with_recognizers(mut self, recognizers: ParallelRecognizers) -> Self {
        self.recognizers = recognizers;
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            // Receiver may have gone away; progress is best-effort
            let _ = sender.send(event);
        }
    }

    /// Execute (or resume) a run
    ///
    /// `documents` is only read when stage 1 is computed; on resume it may be
    /// empty.
    pub async fn run(
        &self,
        run_id: &str,
        documents: Vec<Document>,
        resume_from: Option<Stage>,
    ) -> Result<FinalReport, PipelineError> {
        if resume_from.is_none() && documents.is_empty() {
            error!(run_id, "No documents supplied");
            return Err(PipelineError::EmptyInput);
        }
        if resume_from.is_none() {
            self.ensure_unused(run_id).await?;
        } else if !documents.is_empty() {
            debug!(run_id, "Resuming; supplied documents are ignored");
        }

        let mut run = PipelineRun::new(run_id);
        info!(
            run_id,
            documents = documents.len(),
            resume_from = ?resume_from,
            "Pipeline run started"
        );
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.to_string(),
            document_count: documents.len(),
            resume_from,
        });

        // Stage 1: deconstruction
        let analyzed: Vec<AnalyzedDocument> = self
            .stage(
                &mut run,
                Stage::Deconstruction,
                resume_from,
                |d: &Vec<AnalyzedDocument>| d.len(),
                || self.analyzer.analyze_all(&documents, self.settings.workers),
            )
            .await?;
        let analyzed = Arc::new(analyzed);

        // Stage 1b: patterns
        let report: PatternReport = self
            .stage(
                &mut run,
                Stage::Patterns,
                resume_from,
                PatternReport::present_facets,
                || self.recognizers.run_all(Arc::clone(&analyzed)),
            )
            .await?;
        let report = Arc::new(report);

        // Stage 2: categorization
        let (analyzed_ref, report_ref) = (analyzed.as_ref(), report.as_ref());
        let structure: ThemeStructure = self
            .stage(
                &mut run,
                Stage::Categorization,
                resume_from,
                |s: &ThemeStructure| s.themes.len(),
                || async move { self.clusterer.cluster(analyzed_ref, report_ref) },
            )
            .await?;

        // Stage 3: synthesis
        let synthesis: SynthesisOutput = self
            .stage(
                &mut run,
                Stage::Synthesis,
                resume_from,
                |s: &SynthesisOutput| s.chapters.len(),
                || {
                    self.synthesize_all(
                        &structure.themes,
                        Arc::clone(&analyzed),
                        Arc::clone(&report),
                    )
                },
            )
            .await?;

        // Stage 4: validation
        let chapters = synthesis.chapters.as_slice();
        let validation: ValidationOutput = self
            .stage(
                &mut run,
                Stage::Validation,
                resume_from,
                |v: &ValidationOutput| v.reports.len(),
                || async move {
                    let reports = self.validator.validate_all(chapters, analyzed_ref);
                    let amended_chapters = ValidationEngine::amend_all(chapters, &reports);
                    ValidationOutput {
                        reports,
                        amended_chapters,
                    }
                },
            )
            .await?;

        run.transition_to(PipelineState::Complete)?;

        let manifest = build_manifest(&analyzed, &report, &structure, &synthesis, &validation);
        let escalated_count = validation.reports.iter().filter(|r| r.escalate).count();

        info!(
            run_id,
            themes = structure.themes.len(),
            orphans = structure.orphans.len(),
            chapters = synthesis.chapters.len(),
            escalated = escalated_count,
            degraded_items = manifest.total(),
            "Pipeline run complete"
        );
        self.emit(PipelineEvent::RunCompleted {
            run_id: run_id.to_string(),
            chapters: synthesis.chapters.len(),
            escalated: escalated_count,
            degraded_items: manifest.total(),
        });

        let run_metadata = RunMetadata {
            run_id: run.run_id.clone(),
            schema_version: SCHEMA_VERSION,
            started_at: run.started_at,
            completed_at: run.ended_at.unwrap_or_else(Utc::now),
            resumed_from: resume_from,
            document_count: analyzed.len(),
            failed_document_count: analyzed.iter().filter(|d| d.is_failed()).count(),
            theme_count: structure.themes.len(),
            orphan_count: structure.orphans.len(),
            chapter_count: synthesis.chapters.len(),
            escalated_count,
            transitions: run.history.clone(),
        };

        Ok(FinalReport {
            run_id: run.run_id,
            documents: analyzed.as_ref().clone(),
            pattern_report: report.as_ref().clone(),
            themes: structure.themes,
            orphans: structure.orphans,
            chapters: synthesis.chapters,
            amended_chapters: validation.amended_chapters,
            validations: validation.reports,
            manifest,
            run_metadata,
        })
    }

    // ========================================================================
    // Stage plumbing
    // ========================================================================

    /// Load or compute one stage, checkpoint it, advance the state machine
    async fn stage<T, F, Fut>(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        resume_from: Option<Stage>,
        count: fn(&T) -> usize,
        compute: F,
    ) -> Result<T, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let resumed = resume_from.map(|last| stage <= last).unwrap_or(false);

        let outcome = if resumed {
            self.load(&run.run_id, stage).await
        } else {
            info!(run_id = %run.run_id, stage = %stage, "Stage started");
            self.emit(PipelineEvent::StageStarted {
                run_id: run.run_id.clone(),
                stage,
            });
            let output = compute().await;
            self.commit(run, stage, &output).await.map(|_| output)
        };

        let output = match outcome {
            Ok(output) => output,
            Err(e) => return Err(self.fail(run, stage, e)),
        };

        run.transition_to(stage.done_state())?;

        let items = count(&output);
        info!(run_id = %run.run_id, stage = %stage, resumed, items, "Stage complete");
        self.emit(PipelineEvent::StageCompleted {
            run_id: run.run_id.clone(),
            stage,
            resumed,
            items,
        });
        Ok(output)
    }

    /// A fresh run must not append onto another run's checkpoints
    async fn ensure_unused(&self, run_id: &str) -> Result<(), PipelineError> {
        let existing = self
            .store
            .list(run_id)
            .await
            .map_err(|source| PipelineError::CheckpointRead {
                stage: Stage::Deconstruction,
                source,
            })?;

        if existing.is_empty() {
            return Ok(());
        }
        error!(run_id, checkpoints = existing.len(), "Run id already in use");
        Err(PipelineError::RunIdInUse {
            run_id: run_id.to_string(),
            checkpoints: existing.len(),
        })
    }

    /// Read back a stage output for resume
    async fn load<T: DeserializeOwned>(
        &self,
        run_id: &str,
        stage: Stage,
    ) -> Result<T, PipelineError> {
        let checkpoint = self
            .store
            .latest(run_id, stage)
            .await
            .map_err(|source| PipelineError::CheckpointRead { stage, source })?
            .ok_or_else(|| PipelineError::InvalidResumePoint {
                stage,
                reason: format!("no checkpoint stored for run {}", run_id),
            })?;

        if checkpoint.schema_version != SCHEMA_VERSION {
            return Err(PipelineError::SchemaMismatch {
                stage,
                found: checkpoint.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        if !checkpoint.digest_matches() {
            return Err(PipelineError::CorruptedCheckpoint {
                stage,
                reason: "payload digest mismatch".to_string(),
            });
        }

        let output = checkpoint
            .decode()
            .map_err(|e| PipelineError::CorruptedCheckpoint {
                stage,
                reason: e.to_string(),
            })?;

        debug!(run_id, stage = %stage, created_at = %checkpoint.created_at, "Checkpoint loaded");
        Ok(output)
    }

    /// Persist a stage output
    ///
    /// A stage is only checkpointed directly after its predecessor.
    async fn commit<T: Serialize>(
        &self,
        run: &PipelineRun,
        stage: Stage,
        output: &T,
    ) -> Result<(), PipelineError> {
        if run.last_completed_stage() != stage.previous() {
            return Err(PipelineError::InvalidTransition {
                from: run.state.label(),
                to: stage.done_state().label(),
            });
        }

        let checkpoint = Checkpoint::new(&run.run_id, stage, output)
            .map_err(|source| PipelineError::CheckpointWrite { stage, source })?;
        self.store
            .append(&checkpoint)
            .await
            .map_err(|source| PipelineError::CheckpointWrite { stage, source })?;

        debug!(
            run_id = %run.run_id,
            stage = %stage,
            bytes = checkpoint.payload.len(),
            "Checkpoint written"
        );
        Ok(())
    }

    /// Move the run to FAILED and shape the error returned to the caller
    ///
    /// Errors raised while computing or writing a stage become
    /// [`PipelineError::StageFailed`]; resume errors keep their own variant.
    fn fail(&self, run: &mut PipelineRun, stage: Stage, error: PipelineError) -> PipelineError {
        let last_completed = run.last_completed_stage();
        let reason = error.to_string();

        error!(
            run_id = %run.run_id,
            stage = %stage,
            last_completed = ?last_completed,
            error = %reason,
            "Pipeline stage failed"
        );

        if let Err(e) = run.transition_to(PipelineState::Failed {
            stage,
            reason: reason.clone(),
        }) {
            warn!(run_id = %run.run_id, error = %e, "Could not record failed state");
        }
        self.emit(PipelineEvent::RunFailed {
            run_id: run.run_id.clone(),
            stage,
            reason: reason.clone(),
        });

        match error {
            PipelineError::InvalidResumePoint { .. }
            | PipelineError::CorruptedCheckpoint { .. }
            | PipelineError::SchemaMismatch { .. }
            | PipelineError::CheckpointRead { .. } => error,
            _ => PipelineError::StageFailed {
                stage,
                last_completed,
                reason,
            },
        }
    }

    // ========================================================================
    // Stage 3 fan-out
    // ========================================================================

    /// Synthesize every theme on a bounded pool of spawned tasks
    ///
    /// A theme whose synthesizer call exhausts its retry budget, fails with
    /// a non-retryable error, or panics is listed in `pending_review`; the
    /// others proceed.
    async fn synthesize_all(
        &self,
        themes: &[Theme],
        documents: Arc<Vec<AnalyzedDocument>>,
        report: Arc<PatternReport>,
    ) -> SynthesisOutput {
        info!(
            themes = themes.len(),
            synthesizer = self.synthesizer.name(),
            "Synthesizing chapters"
        );

        let mut jobs = Vec::with_capacity(themes.len());
        for theme in themes {
            let job = synthesize_theme(
                Arc::clone(&self.synthesizer),
                theme.clone(),
                Arc::clone(&documents),
                Arc::clone(&report),
                self.policy.clone(),
            );
            jobs.push((theme.id.clone(), job));
        }

        let mut output = SynthesisOutput::default();
        for (theme_id, joined) in spawn_bounded(jobs, self.settings.workers).await {
            let reason = match joined {
                Ok(Ok(chapter)) => {
                    output.chapters.push(chapter);
                    continue;
                }
                Ok(Err(error)) => error.to_string(),
                Err(e) => join_failure(e),
            };
            warn!(theme_id = %theme_id, reason = %reason, "Synthesis failed, theme pending review");
            output.pending_review.push(DegradedItem {
                item_id: theme_id,
                reason,
            });
        }
        output.chapters.sort_by(|a, b| a.theme_id.cmp(&b.theme_id));
        output.pending_review.sort_by(|a, b| a.item_id.cmp(&b.item_id));

        info!(
            chapters = output.chapters.len(),
            pending_review = output.pending_review.len(),
            "Synthesis complete"
        );
        output
    }
}

/// One theme's synthesis under the retry policy
async fn synthesize_theme(
    synthesizer: Arc<dyn ChapterSynthesizer>,
    theme: Theme,
    documents: Arc<Vec<AnalyzedDocument>>,
    report: Arc<PatternReport>,
    policy: RetryPolicy,
) -> Result<SynthesisChapter, SynthesisError> {
    let result = call_with_retry(
        "synthesize",
        &theme.id,
        &policy,
        |e: &SynthesisError| matches!(e, SynthesisError::Internal(_)),
        || synthesizer.synthesize(&theme, &documents, &report),
    )
    .await;

    result.map_err(|exhausted| SynthesisError::RetryExhausted {
        theme_id: theme.id.clone(),
        attempts: exhausted.attempts,
        reason: exhausted.last_error,
    })
}

/// Collect every degraded or escalated item of a run
pub fn build_manifest(
    documents: &[AnalyzedDocument],
    report: &PatternReport,
    structure: &ThemeStructure,
    synthesis: &SynthesisOutput,
    validation: &ValidationOutput,
) -> DegradationManifest {
    let mut manifest = DegradationManifest::default();

    for document in documents {
        match &document.status {
            AnalysisStatus::Complete => {}
            AnalysisStatus::Degraded { reason } => manifest.fallback_analyses.push(DegradedItem {
                item_id: document.document_id.clone(),
                reason: reason.clone(),
            }),
            AnalysisStatus::Failed { reason } => manifest.failed_analyses.push(DegradedItem {
                item_id: document.document_id.clone(),
                reason: reason.clone(),
            }),
        }
    }

    manifest.recognizer_failures = report
        .failures
        .iter()
        .map(|f| DegradedItem {
            item_id: f.recognizer.clone(),
            reason: f.reason.clone(),
        })
        .collect();

    manifest.all_orphaned = structure.all_orphaned();
    manifest.pending_review = synthesis.pending_review.clone();

    manifest.unvalidated_chapters = validation
        .reports
        .iter()
        .filter(|r| r.escalate)
        .map(|r| DegradedItem {
            item_id: r.theme_id.clone(),
            reason: if r.auto_rejected {
                format!("auto-rejected; failed checks: {}", r.failed_checks().join(", "))
            } else {
                format!("failed checks: {}", r.failed_checks().join(", "))
            },
        })
        .collect();

    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::mock::FlakyCapability;
    use crate::checkpoint::{CheckpointSummary, MemoryCheckpointStore};
    use crate::error::CheckpointError;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn settings() -> PipelineSettings {
        let mut settings = PipelineSettings::default();
        settings.retry.max_attempts = 2;
        settings.retry.initial_backoff_ms = 1;
        settings.retry.max_backoff_ms = 2;
        settings.retry.call_timeout_ms = 500;
        settings
    }

    fn orchestrator(store: Arc<dyn CheckpointStore>) -> Orchestrator {
        let settings = settings();
        let analyzer = ResilientAnalyzer::new(
            Arc::new(FlakyCapability::new(0, false)),
            None,
            RetryPolicy::from(&settings.retry),
            Vocabulary::new(["patience"]),
        );
        let synthesizer = Arc::new(SynthesisEngine::new(
            settings.synthesis.clone(),
            settings.contradiction.match_threshold,
        ));
        Orchestrator::new(settings, analyzer, synthesizer, store)
    }

    fn documents(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| {
                Document::new(
                    format!("doc_{:03}", i),
                    format!("Wait for the setup {}", i),
                    format!("/notes/{}.md", i),
                )
            })
            .collect()
    }

    /// Store whose appends fail from a given stage on
    struct FailingStore {
        inner: MemoryCheckpointStore,
        fail_from: Stage,
    }

    #[async_trait::async_trait]
    impl CheckpointStore for FailingStore {
        async fn append(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
            if checkpoint.stage >= self.fail_from {
                return Err(CheckpointError::Corrupted("disk full".into()));
            }
            self.inner.append(checkpoint).await
        }

        async fn latest(
            &self,
            run_id: &str,
            stage: Stage,
        ) -> Result<Option<Checkpoint>, CheckpointError> {
            self.inner.latest(run_id, stage).await
        }

        async fn list(&self, run_id: &str) -> Result<Vec<CheckpointSummary>, CheckpointError> {
            self.inner.list(run_id).await
        }
    }

    /// Synthesizer that always fails with a retryable error
    struct BrokenSynthesizer;

    #[async_trait::async_trait]
    impl ChapterSynthesizer for BrokenSynthesizer {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn synthesize(
            &self,
            theme: &Theme,
            _documents: &[AnalyzedDocument],
            _report: &PatternReport,
        ) -> Result<SynthesisChapter, SynthesisError> {
            Err(SynthesisError::Internal(format!("no model for {}", theme.id)))
        }
    }

    #[tokio::test]
    async fn test_full_run_writes_every_stage() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let report = orchestrator(store.clone()).run("run-1", documents(3), None).await.unwrap();

        assert_eq!(report.themes.len(), 1);
        assert_eq!(report.chapters.len(), 1);
        assert_eq!(report.validations.len(), 1);
        assert_eq!(report.run_metadata.resumed_from, None);

        let stored = store.list("run-1").await.unwrap();
        let stages: Vec<Stage> = stored.iter().map(|s| s.stage).collect();
        assert_eq!(stages, Stage::ALL.to_vec());

        let states: Vec<PipelineState> = report
            .run_metadata
            .transitions
            .iter()
            .map(|t| t.new_state.clone())
            .collect();
        assert_eq!(states.last(), Some(&PipelineState::Complete));
        assert_eq!(states.len(), 6);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let result = orchestrator(store.clone()).run("run-1", Vec::new(), None).await;

        assert!(matches!(result, Err(PipelineError::EmptyInput)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_resume_without_checkpoints_is_invalid() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let result = orchestrator(store).run("run-1", Vec::new(), Some(Stage::Patterns)).await;

        assert!(matches!(
            result,
            Err(PipelineError::InvalidResumePoint {
                stage: Stage::Deconstruction,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_resume_rejects_tampered_checkpoint() {
        let store = Arc::new(MemoryCheckpointStore::new());
        orchestrator(store.clone()).run("run-1", documents(3), None).await.unwrap();

        let mut tampered = store.latest("run-1", Stage::Patterns).await.unwrap().unwrap();
        tampered.payload.push(' ');
        store.append(&tampered).await.unwrap();

        let result = orchestrator(store).run("run-1", Vec::new(), Some(Stage::Patterns)).await;
        assert!(matches!(
            result,
            Err(PipelineError::CorruptedCheckpoint {
                stage: Stage::Patterns,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_resume_rejects_other_schema_version() {
        let store = Arc::new(MemoryCheckpointStore::new());
        orchestrator(store.clone()).run("run-1", documents(3), None).await.unwrap();

        let mut old = store.latest("run-1", Stage::Deconstruction).await.unwrap().unwrap();
        old.schema_version = SCHEMA_VERSION + 1;
        store.append(&old).await.unwrap();

        let result = orchestrator(store)
            .run("run-1", Vec::new(), Some(Stage::Deconstruction))
            .await;
        assert!(matches!(
            result,
            Err(PipelineError::SchemaMismatch { found, .. }) if found == SCHEMA_VERSION + 1
        ));
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_keeps_earlier_checkpoints() {
        let store = Arc::new(FailingStore {
            inner: MemoryCheckpointStore::new(),
            fail_from: Stage::Categorization,
        });
        let result = orchestrator(store.clone()).run("run-1", documents(3), None).await;

        match result {
            Err(PipelineError::StageFailed {
                stage,
                last_completed,
                ..
            }) => {
                assert_eq!(stage, Stage::Categorization);
                assert_eq!(last_completed, Some(Stage::Patterns));
            }
            other => panic!("expected stage failure, got {:?}", other.map(|r| r.run_id)),
        }
        assert_eq!(store.inner.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_synthesis_goes_to_pending_review() {
        let store = Arc::new(MemoryCheckpointStore::new());
        let settings = settings();
        let analyzer = ResilientAnalyzer::new(
            Arc::new(FlakyCapability::new(0, false)),
            None,
            RetryPolicy::from(&settings.retry),
            Vocabulary::new(["patience"]),
        );
        let orchestrator =
            Orchestrator::new(settings, analyzer, Arc::new(BrokenSynthesizer), store);

        let report = orchestrator.run("run-1", documents(3), None).await.unwrap();
        assert!(report.chapters.is_empty());
        assert_eq!(report.manifest.pending_review.len(), 1);
        assert_eq!(report.manifest.pending_review[0].item_id, "theme_001");
        assert!(report.manifest.pending_review[0].reason.contains("2 attempts"));
        assert_eq!(report.run_metadata.chapter_count, 0);
    }

    #[tokio::test]
    async fn test_events_follow_stage_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::new(MemoryCheckpointStore::new());
        orchestrator(store)
            .with_events(tx)
            .run("run-1", documents(3), None)
            .await
            .unwrap();

        let mut completed = Vec::new();
        let mut last = None;
        while let Ok(event) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            match event {
                Some(PipelineEvent::StageCompleted { stage, resumed, .. }) => {
                    assert!(!resumed);
                    completed.push(stage);
                }
                Some(other) => last = Some(other),
                None => break,
            }
        }
        assert_eq!(completed, Stage::ALL.to_vec());
        assert!(matches!(last, Some(PipelineEvent::RunCompleted { chapters: 1, .. })));
    }
}
