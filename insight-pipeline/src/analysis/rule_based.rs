//! Rule-based analysis capability
//!
//! Offline keyword heuristics. Used as the default capability and as the
//! fallback when the HTTP capability exhausts its retry budget.
//!
//! # Heuristics
//! - **Principle:** first line (>20 chars) containing lesson / principle /
//!   learned / key / important / realize; else the first line >30 chars
//! - **Rules:** lines (>10 chars) with don't / never / avoid / stop cues
//!   become don't-rules, lines with should / must / always / do: cues
//!   become do-rules; capped at 150 chars
//! - **Tags:** keyword taxonomy
//! - **Evidence:** first five numbers plus example / instance / case / trade
//!   lines, at most ten items
//! - **Quality:** 0-5 from length, evidence density and rule presence

use crate::models::{AnalysisOutput, Rules};
use crate::types::AnalysisCapability;
use regex::Regex;
use std::collections::BTreeSet;

const PRINCIPLE_CUES: &[&str] = &["lesson", "principle", "learned", "key", "important", "realize"];
const DO_CUES: &[&str] = &["should", "must", "always", "do:"];
const DONT_CUES: &[&str] = &["don't", "dont:", "never", "avoid", "stop"];
const EVIDENCE_CUES: &[&str] = &["example", "instance", "case", "trade"];
const DEFAULT_PRINCIPLE: &str = "Core principle extracted from document";
const MAX_RULE_CHARS: usize = 150;
const MAX_PRINCIPLE_CHARS: usize = 200;
const MAX_EVIDENCE: usize = 10;
const MAX_METRICS: usize = 5;

/// Tag → keywords
const TAXONOMY: &[(&str, &[&str])] = &[
    ("psychology", &["psychology", "mental", "emotional", "mind"]),
    ("risk-management", &["risk", "loss", "drawdown", "position size"]),
    ("technical-analysis", &["technical", "chart", "indicator", "pattern"]),
    ("fundamental-analysis", &["fundamental", "valuation", "earnings", "dcf"]),
    ("post-mortem", &["post-mortem", "review", "reflection", "mistake"]),
    ("strategy", &["strategy", "approach", "framework", "system"]),
    ("discipline", &["discipline", "rules", "process", "consistency"]),
];

/// State → cue words, checked in order
const EMOTIONAL_CUES: &[(&str, &[&str])] = &[
    ("calm", &["calm", "peaceful", "clear"]),
    ("restless", &["restless", "anxious", "stressed"]),
    ("caffeinated", &["coffee", "caffeinated"]),
];

pub struct RuleBasedAnalyzer {
    metric_pattern: Regex,
}

impl RuleBasedAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            metric_pattern: Regex::new(r"\d+(?:\.\d+)?%?")?,
        })
    }

    /// Synchronous core of [`AnalysisCapability::analyze`]
    pub fn analyze_text(&self, text: &str) -> AnalysisOutput {
        let rules = extract_rules(text);
        let evidence = self.extract_evidence(text);
        let quality_score = score_quality(text, &evidence, &rules);

        AnalysisOutput {
            core_principle: extract_principle(text),
            tags: generate_tags(text),
            emotional_state: detect_emotional_state(text),
            quality_score,
            rules,
            evidence,
            contradictions: Vec::new(),
            failure: None,
        }
    }

    fn extract_evidence(&self, text: &str) -> Vec<String> {
        let mut evidence: Vec<String> = self
            .metric_pattern
            .find_iter(text)
            .take(MAX_METRICS)
            .map(|m| format!("Metric: {}", m.as_str()))
            .collect();

        for line in text.lines().map(str::trim) {
            let lower = line.to_lowercase();
            if line.chars().count() > 20 && EVIDENCE_CUES.iter().any(|c| lower.contains(c)) {
                evidence.push(truncate(line, MAX_RULE_CHARS));
            }
        }

        evidence.truncate(MAX_EVIDENCE);
        evidence
    }
}

#[async_trait::async_trait]
impl AnalysisCapability for RuleBasedAnalyzer {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn analyze(&self, text: &str) -> AnalysisOutput {
        if text.trim().is_empty() {
            return AnalysisOutput::failed("document is empty");
        }
        self.analyze_text(text)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn extract_principle(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let keyed = lines.iter().find(|line| {
        let lower = line.to_lowercase();
        line.chars().count() > 20 && PRINCIPLE_CUES.iter().any(|c| lower.contains(c))
    });
    if let Some(line) = keyed {
        return truncate(line, MAX_PRINCIPLE_CHARS);
    }

    lines
        .iter()
        .find(|line| line.chars().count() > 30)
        .map(|line| truncate(line, MAX_PRINCIPLE_CHARS))
        .unwrap_or_else(|| DEFAULT_PRINCIPLE.to_string())
}

fn extract_rules(text: &str) -> Rules {
    let mut rules = Rules::default();

    for line in text.lines() {
        let line = line.trim().to_lowercase();
        if line.chars().count() <= 10 {
            continue;
        }
        if DONT_CUES.iter().any(|c| line.contains(c)) {
            rules.dont.push(truncate(&line, MAX_RULE_CHARS));
        } else if DO_CUES.iter().any(|c| line.contains(c)) {
            rules.do_rules.push(truncate(&line, MAX_RULE_CHARS));
        }
    }

    rules
}

fn generate_tags(text: &str) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    TAXONOMY
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

fn detect_emotional_state(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    EMOTIONAL_CUES
        .iter()
        .find(|(_, cues)| cues.iter().any(|c| lower.contains(c)))
        .map(|(state, _)| state.to_string())
}

fn score_quality(text: &str, evidence: &[String], rules: &Rules) -> f64 {
    let length = text.chars().count();
    let mut score = 0.0;

    if length > 100 {
        score += 1.0;
    }
    if length > 500 {
        score += 1.0;
    }
    if !evidence.is_empty() {
        score += 1.0;
    }
    if evidence.len() > 3 {
        score += 1.0;
    }
    if !rules.is_empty() {
        score += 1.0;
    }

    f64::min(score, 5.0)
}
