//! Synthesis chapter models (stage 3 output)
//!
//! Chapters are immutable. Validation corrections are applied through
//! [`SynthesisChapter::amend`], which returns a new version.

use super::patterns::ResolutionStatus;
use super::validation::Correction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub document_id: String,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principle {
    pub statement: String,
    /// Concepts merged into this principle (identical support)
    pub concepts: Vec<String>,
    /// One entry per supporting document, sorted by id
    pub evidence: Vec<EvidenceRef>,
    /// 0.0-1.0
    pub confidence: f64,
    pub implications: Vec<String>,
}

impl Principle {
    pub fn evidence_ids(&self) -> BTreeSet<&str> {
        self.evidence.iter().map(|e| e.document_id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Do,
    Dont,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionableRule {
    pub kind: RuleKind,
    pub text: String,
    /// Documents stating the rule
    pub sources: Vec<String>,
}

/// Stance of member documents within one time bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStance {
    /// `2024-03`, `2024-Q1` or `2024`
    pub period: String,
    pub document_ids: Vec<String>,
    /// Concept → net endorsement in [-1, 1]
    pub stance: BTreeMap<String, f64>,
    /// Mean of `stance`
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceShift {
    pub concept: String,
    pub from_period: String,
    pub to_period: String,
    pub from_stance: f64,
    pub to_stance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evolution {
    /// Chronological
    pub periods: Vec<PeriodStance>,
    pub stance_shifts: Vec<StanceShift>,
    pub undated: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionHypothesis {
    /// The later position superseded the earlier one
    TimeEvolution,
    /// Each side applies under different conditions
    DifferingContext,
    /// Both sides hold and are held deliberately
    DualTruth,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub document_id: Option<String>,
    pub statement: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contradiction {
    pub id: String,
    pub description: String,
    pub tag: Option<String>,
    pub position_a: Position,
    pub position_b: Position,
    pub resolution_status: ResolutionStatus,
    pub hypothesis: ResolutionHypothesis,
    pub resolution_note: Option<String>,
}

impl Contradiction {
    /// Unresolved contradictions must be echoed in open questions or carry a note
    pub fn needs_acknowledgment(&self) -> bool {
        self.resolution_status == ResolutionStatus::Unresolved
    }
}

/// Finding the engine attaches to its own output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFlag {
    /// Large theme with no contradictions at all
    SuspiciousCoherence,
    /// Contradiction facet was missing; contradictions were recomputed locally
    ContradictionsRecomputed,
    /// Some member documents were analysis stubs
    ContainsFailedDocuments,
    /// Raised by validation for human review
    NeedsReview,
}

/// Synthesized narrative for one theme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisChapter {
    pub theme_id: String,
    pub theme_name: String,
    /// Starts at 1; each amendment increments it
    pub version: u32,
    pub document_ids: BTreeSet<String>,
    pub executive_summary: String,
    pub core_principles: Vec<Principle>,
    pub actionable_rules: Vec<ActionableRule>,
    pub evolution: Evolution,
    pub contradictions: Vec<Contradiction>,
    pub key_quotes: Vec<String>,
    pub second_order_implications: Vec<String>,
    pub open_questions: Vec<String>,
    pub engine_flags: BTreeSet<EngineFlag>,
}

impl SynthesisChapter {
    pub fn has_flag(&self, flag: EngineFlag) -> bool {
        self.engine_flags.contains(&flag)
    }

    /// Apply corrections into a new version
    ///
    /// Returns `None` when no correction changes anything.
    pub fn amend(&self, corrections: &[Correction]) -> Option<SynthesisChapter> {
        let mut next = self.clone();
        let mut changed = false;

        for correction in corrections {
            match correction {
                Correction::AddOpenQuestion { question, .. } => {
                    if !next.open_questions.contains(question) {
                        next.open_questions.push(question.clone());
                        changed = true;
                    }
                }
                Correction::DropPrinciple { statement, .. } => {
                    let before = next.core_principles.len();
                    next.core_principles.retain(|p| &p.statement != statement);
                    changed |= next.core_principles.len() != before;
                }
                Correction::AddFlag { flag, .. } => {
                    changed |= next.engine_flags.insert(*flag);
                }
            }
        }

        if changed {
            next.version = self.version + 1;
            Some(next)
        } else {
            None
        }
    }
}
