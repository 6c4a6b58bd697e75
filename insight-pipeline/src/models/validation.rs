//! Validation report models (stage 4 output)

use super::synthesis::EngineFlag;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    Pass,
    Warn,
    Fail,
}

/// The fixed checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    CherryPicking,
    Actionability,
    ContradictionAcknowledgment,
    EvolutionLinearity,
    EvidenceSampleSize,
    CrossChapterCoherence,
}

impl CheckName {
    pub const ALL: [CheckName; 6] = [
        CheckName::CherryPicking,
        CheckName::Actionability,
        CheckName::ContradictionAcknowledgment,
        CheckName::EvolutionLinearity,
        CheckName::EvidenceSampleSize,
        CheckName::CrossChapterCoherence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckName::CherryPicking => "cherry_picking",
            CheckName::Actionability => "actionability",
            CheckName::ContradictionAcknowledgment => "contradiction_acknowledgment",
            CheckName::EvolutionLinearity => "evolution_linearity",
            CheckName::EvidenceSampleSize => "evidence_sample_size",
            CheckName::CrossChapterCoherence => "cross_chapter_coherence",
        }
    }

    /// Failing a critical check forces escalation
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            CheckName::CherryPicking
                | CheckName::ContradictionAcknowledgment
                | CheckName::EvidenceSampleSize
        )
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub outcome: CheckOutcome,
    pub reason: String,
    pub critical: bool,
}

/// Fix a check proposes; applied by `SynthesisChapter::amend`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Correction {
    /// Record a question the chapter leaves open
    AddOpenQuestion { check: CheckName, question: String },
    /// Remove a principle whose evidence does not hold up
    DropPrinciple { check: CheckName, statement: String },
    /// Attach an engine flag for reviewers
    AddFlag { check: CheckName, flag: EngineFlag },
}

impl Correction {
    pub fn check(&self) -> CheckName {
        match self {
            Correction::AddOpenQuestion { check, .. }
            | Correction::DropPrinciple { check, .. }
            | Correction::AddFlag { check, .. } => *check,
        }
    }
}

/// Validation result for one chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub theme_id: String,
    pub chapter_version: u32,
    /// Fraction of checks passing (0.0-1.0)
    pub quality_score: f64,
    /// Keyed by check name
    pub checks: BTreeMap<String, CheckResult>,
    pub red_flags: Vec<String>,
    pub corrections: Vec<Correction>,
    pub auto_rejected: bool,
    pub escalate: bool,
}

impl ValidationReport {
    pub fn outcome(&self, check: CheckName) -> Option<CheckOutcome> {
        self.checks.get(check.as_str()).map(|c| c.outcome)
    }

    pub fn failed_checks(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, c)| c.outcome == CheckOutcome::Fail)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}
