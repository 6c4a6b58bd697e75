//! Test Helper Utilities
//!
//! Shared fixtures for insight-pipeline integration tests. Documents are
//! written in a small line format that [`FixtureCapability`] reads back as
//! an analysis result, so tests control exactly what each document "says":
//!
//! ```text
//! principle: Let the trade come to you
//! tags: patience, gain
//! do: wait for the close
//! dont: chase entries
//! quality: 4
//! state: calm
//! evidence: Held for three weeks
//! fail: capability refused
//! stall: never answers
//! panic: capability bug
//! ```

#![allow(dead_code)]

use insight_common::config::PipelineSettings;
use insight_pipeline::analysis::ResilientAnalyzer;
use insight_pipeline::checkpoint::CheckpointStore;
use insight_pipeline::models::{AnalysisOutput, Document, Vocabulary};
use insight_pipeline::synthesis::SynthesisEngine;
use insight_pipeline::types::{AnalysisCapability, ChapterSynthesizer};
use insight_pipeline::utils::RetryPolicy;
use insight_pipeline::Orchestrator;
use std::sync::Arc;

/// Reads the fixture line format
///
/// `fail:` makes the call fail, `stall:` makes it never return, `panic:`
/// makes it panic.
pub struct FixtureCapability;

#[async_trait::async_trait]
impl AnalysisCapability for FixtureCapability {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn analyze(&self, text: &str) -> AnalysisOutput {
        if text.lines().any(|line| line.trim_start().starts_with("stall:")) {
            return std::future::pending().await;
        }
        parse_fixture(text)
    }
}

pub fn parse_fixture(text: &str) -> AnalysisOutput {
    let mut output = AnalysisOutput {
        quality_score: 3.0,
        ..Default::default()
    };

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "principle" => output.core_principle = value.to_string(),
            "tags" => output.tags.extend(
                value
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            ),
            "do" => output.rules.do_rules.push(value.to_string()),
            "dont" => output.rules.dont.push(value.to_string()),
            "quality" => output.quality_score = value.parse().unwrap_or(0.0),
            "state" => output.emotional_state = Some(value.to_string()),
            "evidence" => output.evidence.push(value.to_string()),
            "fail" => return AnalysisOutput::failed(value),
            "panic" => panic!("{}", value),
            _ => {}
        }
    }
    output
}

/// Settings with short retry timings
pub fn test_settings() -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.workers = 4;
    settings.retry.max_attempts = 2;
    settings.retry.initial_backoff_ms = 1;
    settings.retry.max_backoff_ms = 5;
    settings.retry.call_timeout_ms = 1_000;
    settings
}

/// Orchestrator over [`FixtureCapability`] with no fallback
pub fn fixture_orchestrator(store: Arc<dyn CheckpointStore>) -> Orchestrator {
    fixture_orchestrator_with(store, test_settings())
}

pub fn fixture_orchestrator_with(
    store: Arc<dyn CheckpointStore>,
    settings: PipelineSettings,
) -> Orchestrator {
    let synthesizer = Arc::new(SynthesisEngine::new(
        settings.synthesis.clone(),
        settings.contradiction.match_threshold,
    ));
    fixture_orchestrator_with_synthesizer(store, settings, synthesizer)
}

/// Fixture analysis with a caller-supplied synthesizer
pub fn fixture_orchestrator_with_synthesizer(
    store: Arc<dyn CheckpointStore>,
    settings: PipelineSettings,
    synthesizer: Arc<dyn ChapterSynthesizer>,
) -> Orchestrator {
    let analyzer = ResilientAnalyzer::new(
        Arc::new(FixtureCapability),
        None,
        RetryPolicy::from(&settings.retry),
        Vocabulary::new(&settings.vocabulary),
    );
    Orchestrator::new(settings, analyzer, synthesizer, store)
}

/// Document with the given fixture body
pub fn doc(id: &str, body: &str) -> Document {
    Document::new(id, body, format!("/fixtures/{}.md", id))
}

/// Five documents: two about coffee and loss, three about patience and gain
pub fn scenario_documents() -> Vec<Document> {
    vec![
        doc("doc_000", "principle: Morning coffee before the open\ntags: coffee, loss"),
        doc(
            "doc_001",
            "principle: Let the trade come to you\ntags: patience, gain\ndo: wait for the close",
        ),
        doc("doc_002", "principle: Skipped breakfast again\ntags: coffee, loss"),
        doc(
            "doc_003",
            "principle: Sitting on hands paid off\ntags: patience, gain\ndo: wait for the close",
        ),
        doc(
            "doc_004",
            "principle: Waiting beat forcing it\ntags: patience, gain\n\
             evidence: Held for three weeks",
        ),
    ]
}

/// `n` documents that all agree with each other
pub fn agreeing_documents(n: usize) -> Vec<Document> {
    (0..n)
        .map(|i| {
            doc(
                &format!("doc_{:03}", i),
                &format!("principle: Patience note {}\ntags: patience\ndo: wait for the setup", i),
            )
        })
        .collect()
}
