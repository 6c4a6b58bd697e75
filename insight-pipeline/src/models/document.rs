//! Document and analyzed-document models

use super::vocabulary::{normalize_tag, Vocabulary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Tag carried by stub documents whose analysis failed
pub const FAILURE_TAG: &str = "analysis-failed";

/// Upper bound of the per-document quality score
pub const MAX_QUALITY: f64 = 5.0;

/// Raw input document (immutable once ingested)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub raw_text: String,
    pub source_path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        raw_text: impl Into<String>,
        source_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
            source_path: source_path.into(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Do / don't rules extracted from one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(rename = "do", default)]
    pub do_rules: Vec<String>,
    #[serde(default)]
    pub dont: Vec<String>,
}

impl Rules {
    pub fn is_empty(&self) -> bool {
        self.do_rules.is_empty() && self.dont.is_empty()
    }

    pub fn len(&self) -> usize {
        self.do_rules.len() + self.dont.len()
    }
}

/// Contradiction declared by the analysis capability itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContradictionRef {
    pub description: String,
    /// Other document involved, when the capability could name one
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Structured output of one capability call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOutput {
    pub core_principle: String,
    pub rules: Rules,
    pub tags: BTreeSet<String>,
    pub quality_score: f64,
    pub contradictions: Vec<ContradictionRef>,
    pub evidence: Vec<String>,
    pub emotional_state: Option<String>,
    /// Set when the capability could not analyze the text
    pub failure: Option<String>,
}

impl AnalysisOutput {
    /// Structured stub for a failed call
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// How an analyzed document was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Primary capability succeeded
    Complete,
    /// Primary exhausted its budget; the fallback capability answered
    Degraded { reason: String },
    /// No capability answered; this is a stub
    Failed { reason: String },
}

/// Document after analysis (immutable once produced)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    pub document_id: String,
    pub source_path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub core_principle: String,
    pub rules: Rules,
    pub tags: BTreeSet<String>,
    /// Subset of `tags` outside the controlled vocabulary
    pub out_of_vocabulary: BTreeSet<String>,
    pub quality_score: f64,
    pub contradictions: Vec<ContradictionRef>,
    pub evidence: Vec<String>,
    pub emotional_state: Option<String>,
    pub status: AnalysisStatus,
}

impl AnalyzedDocument {
    /// Build from a capability output, normalizing tags and clamping the score
    pub fn from_output(
        document: &Document,
        output: AnalysisOutput,
        vocabulary: &Vocabulary,
        status: AnalysisStatus,
    ) -> Self {
        let tags: BTreeSet<String> = output
            .tags
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect();
        let out_of_vocabulary = vocabulary.out_of_vocabulary(&tags);

        let quality_score = if output.quality_score.is_finite() {
            output.quality_score.clamp(0.0, MAX_QUALITY)
        } else {
            0.0
        };

        Self {
            document_id: document.id.clone(),
            source_path: document.source_path.clone(),
            created_at: document.created_at,
            core_principle: output.core_principle.trim().to_string(),
            rules: Rules {
                do_rules: clean_lines(output.rules.do_rules),
                dont: clean_lines(output.rules.dont),
            },
            tags,
            out_of_vocabulary,
            quality_score,
            contradictions: output.contradictions,
            evidence: output.evidence,
            emotional_state: output
                .emotional_state
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            status,
        }
    }

    /// Low-confidence stub standing in for a document no capability could analyze
    pub fn stub(document: &Document, reason: impl Into<String>) -> Self {
        let tags: BTreeSet<String> = [FAILURE_TAG.to_string()].into_iter().collect();
        Self {
            document_id: document.id.clone(),
            source_path: document.source_path.clone(),
            created_at: document.created_at,
            core_principle: String::new(),
            rules: Rules::default(),
            out_of_vocabulary: tags.clone(),
            tags,
            quality_score: 0.0,
            contradictions: Vec::new(),
            evidence: Vec::new(),
            emotional_state: None,
            status: AnalysisStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, AnalysisStatus::Failed { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, AnalysisStatus::Degraded { .. })
    }

    /// Tags that carry meaning for statistics (excludes the failure marker)
    pub fn topical_tags(&self) -> impl Iterator<Item = &String> {
        self.tags.iter().filter(|t| t.as_str() != FAILURE_TAG)
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && seen.insert(l.clone()))
        .collect()
}
