//! End-to-end pipeline tests
//!
//! Runs the full orchestrator over fixture documents with an in-memory
//! checkpoint store.

mod helpers;

use helpers::{
    agreeing_documents, doc, fixture_orchestrator, fixture_orchestrator_with,
    fixture_orchestrator_with_synthesizer, scenario_documents, test_settings,
};
use insight_pipeline::checkpoint::MemoryCheckpointStore;
use insight_pipeline::clustering::{REASON_ANALYSIS_FAILED, REASON_NO_THEME};
use insight_pipeline::error::SynthesisError;
use insight_pipeline::ingest::DocumentLoader;
use insight_pipeline::models::{
    AnalyzedDocument, CheckName, CheckOutcome, EngineFlag, FinalReport, PatternReport,
    SynthesisChapter, Theme,
};
use insight_pipeline::types::ChapterSynthesizer;
use insight_pipeline::output::write_report;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;

async fn run(documents: Vec<insight_pipeline::models::Document>) -> FinalReport {
    fixture_orchestrator(Arc::new(MemoryCheckpointStore::new()))
        .run("run-test", documents, None)
        .await
        .unwrap()
}

// ============================================================================
// Scenario: coffee / patience
// ============================================================================

#[tokio::test]
async fn test_scenario_frequency_counts() {
    let report = run(scenario_documents()).await;

    let frequency = report.pattern_report.frequency.as_ref().unwrap();
    assert_eq!(frequency.count("patience"), 3);
    assert_eq!(frequency.count("gain"), 3);
    assert_eq!(frequency.count("coffee"), 2);
    assert_eq!(frequency.count("loss"), 2);
    assert_eq!(frequency.corpus_size, 5);
}

#[tokio::test]
async fn test_scenario_patience_theme_and_coffee_orphans() {
    let report = run(scenario_documents()).await;

    // coffee pair is below the membership minimum: 1 theme + orphans
    assert_eq!(report.themes.len(), 1);
    let theme = &report.themes[0];
    let members: Vec<&str> = theme.document_ids.iter().map(String::as_str).collect();
    assert_eq!(members, vec!["doc_001", "doc_003", "doc_004"]);

    let orphans: Vec<(&str, &str)> = report
        .orphans
        .iter()
        .map(|o| (o.document_id.as_str(), o.reason.as_str()))
        .collect();
    assert_eq!(
        orphans,
        vec![("doc_000", REASON_NO_THEME), ("doc_002", REASON_NO_THEME)]
    );
    assert!(!report.manifest.all_orphaned);
}

#[tokio::test]
async fn test_scenario_principle_cites_exactly_patience_documents() {
    let report = run(scenario_documents()).await;

    let chapter = report.chapter(&report.themes[0].id).unwrap();
    let patience = chapter
        .core_principles
        .iter()
        .find(|p| p.concepts.iter().any(|c| c == "patience"))
        .expect("patience principle");

    let cited: BTreeSet<&str> = patience.evidence_ids();
    assert_eq!(
        cited,
        ["doc_001", "doc_003", "doc_004"].into_iter().collect::<BTreeSet<_>>()
    );
    assert!(chapter.actionable_rules.iter().any(|r| r.text == "wait for the close"));
}

// ============================================================================
// Determinism and containment
// ============================================================================

#[tokio::test]
async fn test_output_independent_of_input_order() {
    let forward = run(scenario_documents()).await;

    let mut reversed_docs = scenario_documents();
    reversed_docs.reverse();
    let reversed = run(reversed_docs).await;

    assert_eq!(forward.documents, reversed.documents);
    assert_eq!(forward.pattern_report, reversed.pattern_report);
    assert_eq!(forward.themes, reversed.themes);
    assert_eq!(forward.orphans, reversed.orphans);
    assert_eq!(forward.chapters, reversed.chapters);
    assert_eq!(forward.validations, reversed.validations);
}

#[tokio::test]
async fn test_failed_analysis_is_contained() {
    let mut documents = scenario_documents();
    documents.push(doc("doc_005", "tags: patience\nfail: capability refused"));

    let report = run(documents).await;

    assert_eq!(report.documents.len(), 6);
    let stub = report.documents.iter().find(|d| d.document_id == "doc_005").unwrap();
    assert!(stub.is_failed());
    assert_eq!(stub.quality_score, 0.0);

    let failed: Vec<&str> = report
        .manifest
        .failed_analyses
        .iter()
        .map(|i| i.item_id.as_str())
        .collect();
    assert_eq!(failed, vec!["doc_005"]);
    assert_eq!(report.run_metadata.failed_document_count, 1);

    assert!(report
        .orphans
        .iter()
        .any(|o| o.document_id == "doc_005" && o.reason == REASON_ANALYSIS_FAILED));
    assert_eq!(report.chapters.len(), 1);
}

#[tokio::test]
async fn test_stalled_capability_yields_stub_and_run_completes() {
    let mut settings = test_settings();
    settings.retry.call_timeout_ms = 50;

    let mut documents = scenario_documents();
    documents.push(doc("doc_005", "tags: patience\nstall: never answers"));

    let report = fixture_orchestrator_with(Arc::new(MemoryCheckpointStore::new()), settings)
        .run("run-stall", documents, None)
        .await
        .unwrap();

    let stub = report.documents.iter().find(|d| d.document_id == "doc_005").unwrap();
    assert!(stub.is_failed());
    assert_eq!(stub.quality_score, 0.0);

    assert_eq!(report.manifest.failed_analyses.len(), 1);
    let failed = &report.manifest.failed_analyses[0];
    assert_eq!(failed.item_id, "doc_005");
    assert!(failed.reason.contains("timed out"), "reason: {}", failed.reason);
    assert_eq!(report.run_metadata.failed_document_count, 1);

    assert!(report
        .orphans
        .iter()
        .any(|o| o.document_id == "doc_005" && o.reason == REASON_ANALYSIS_FAILED));
    assert_eq!(report.chapters.len(), 1);
}

#[tokio::test]
async fn test_panicking_capability_is_contained() {
    let mut documents = scenario_documents();
    documents.push(doc("doc_005", "tags: patience\npanic: capability bug"));

    let report = run(documents).await;

    let stub = report.documents.iter().find(|d| d.document_id == "doc_005").unwrap();
    assert!(stub.is_failed());
    let failed: Vec<&str> = report
        .manifest
        .failed_analyses
        .iter()
        .map(|i| i.item_id.as_str())
        .collect();
    assert_eq!(failed, vec!["doc_005"]);
    assert!(report.manifest.failed_analyses[0].reason.contains("capability bug"));
    assert_eq!(report.chapters.len(), 1);
}

/// Synthesizer with a bug: panics on every theme
struct PanickingSynthesizer;

#[async_trait::async_trait]
impl ChapterSynthesizer for PanickingSynthesizer {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn synthesize(
        &self,
        theme: &Theme,
        _documents: &[AnalyzedDocument],
        _report: &PatternReport,
    ) -> Result<SynthesisChapter, SynthesisError> {
        panic!("synthesizer bug on {}", theme.id);
    }
}

#[tokio::test]
async fn test_panicking_synthesizer_sends_theme_to_review() {
    let orchestrator = fixture_orchestrator_with_synthesizer(
        Arc::new(MemoryCheckpointStore::new()),
        test_settings(),
        Arc::new(PanickingSynthesizer),
    );

    let report = orchestrator.run("run-panic", scenario_documents(), None).await.unwrap();

    assert_eq!(report.themes.len(), 1);
    assert!(report.chapters.is_empty());
    assert!(report.validations.is_empty());

    let pending = &report.manifest.pending_review;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].item_id, report.themes[0].id);
    assert!(pending[0].reason.contains("synthesizer bug"), "reason: {}", pending[0].reason);
}

#[tokio::test]
async fn test_run_can_be_spawned() {
    let orchestrator = fixture_orchestrator(Arc::new(MemoryCheckpointStore::new()));

    let handle = tokio::spawn(async move {
        orchestrator.run("run-spawned", scenario_documents(), None).await
    });

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.run_id, "run-spawned");
    assert_eq!(report.themes.len(), 1);
}

#[tokio::test]
async fn test_conflicting_rules_surface_as_contradictions() {
    let documents = vec![
        doc("doc_000", "principle: Add to losers\ntags: risk\ndo: average down"),
        doc("doc_001", "principle: Cut losers\ntags: risk\ndont: never average down"),
        doc("doc_002", "principle: Size small\ntags: risk"),
    ];
    let report = run(documents).await;

    assert_eq!(report.themes.len(), 1);
    let chapter = &report.chapters[0];
    assert!(!chapter.contradictions.is_empty());

    let contradiction = &chapter.contradictions[0];
    let sides: BTreeSet<&str> = [
        contradiction.position_a.document_id.as_deref(),
        contradiction.position_b.document_id.as_deref(),
    ]
    .into_iter()
    .flatten()
    .collect();
    assert_eq!(sides, ["doc_000", "doc_001"].into_iter().collect::<BTreeSet<_>>());
}

#[tokio::test]
async fn test_large_agreeing_theme_is_escalated() {
    let report = run(agreeing_documents(10)).await;

    assert_eq!(report.themes.len(), 1);
    let theme_id = report.themes[0].id.clone();
    let chapter = report.chapter(&theme_id).unwrap();
    assert!(chapter.contradictions.is_empty());
    assert!(chapter.has_flag(EngineFlag::SuspiciousCoherence));

    let validation = report.validation(&theme_id).unwrap();
    assert!(validation.escalate);
    assert!(validation.auto_rejected);
    assert_eq!(
        validation.outcome(CheckName::ContradictionAcknowledgment),
        Some(CheckOutcome::Fail)
    );

    assert!(report
        .manifest
        .unvalidated_chapters
        .iter()
        .any(|i| i.item_id == theme_id));
    assert_eq!(report.run_metadata.escalated_count, 1);

    // the amended chapter carries the review flag
    let amended = report
        .amended_chapters
        .iter()
        .find(|c| c.theme_id == theme_id)
        .unwrap();
    assert_eq!(amended.version, 2);
    assert!(amended.has_flag(EngineFlag::NeedsReview));
}

// ============================================================================
// Ingestion and output
// ============================================================================

#[tokio::test]
async fn test_directory_run_writes_reports() {
    let input = TempDir::new().unwrap();
    for (i, document) in scenario_documents().iter().enumerate() {
        std::fs::write(input.path().join(format!("note-{}.md", i)), &document.raw_text).unwrap();
    }

    let documents = DocumentLoader::new().unwrap().load_dir(input.path()).unwrap();
    assert_eq!(documents.len(), 5);
    let report = run(documents).await;

    let output = TempDir::new().unwrap();
    let (json_path, markdown_path) = write_report(&report, output.path()).unwrap();

    let parsed: FinalReport =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed, report);

    let markdown = std::fs::read_to_string(&markdown_path).unwrap();
    assert!(markdown.starts_with("# Thematic Insight Extraction Report"));
    assert!(markdown.contains("## Synthesis by Theme"));
    assert!(markdown.contains("## Degraded Items"));
    assert!(markdown.contains(&report.themes[0].name));
}
