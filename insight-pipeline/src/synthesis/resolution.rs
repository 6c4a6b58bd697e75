//! Best-effort contradiction resolution
//!
//! Hypotheses are tried in order; the first that applies wins:
//! 1. **time_evolution** - both sides dated at least `min_gap_days` apart;
//!    the later position supersedes the earlier one (resolved)
//! 2. **differing_context** - the sides come from different emotional
//!    states or from documents with little tag overlap (partially resolved)
//! 3. **dual_truth** - both documents are high quality (partially resolved)
//! 4. otherwise **unresolved**, which is a valid outcome

use crate::models::synthesis::Position;
use crate::models::{
    AnalyzedDocument, Contradiction, ContradictionEntry, ResolutionHypothesis, ResolutionStatus,
};
use std::collections::{BTreeMap, BTreeSet};

/// Quality at which both sides of a conflict are taken as deliberate
pub const DUAL_TRUTH_MIN_QUALITY: f64 = 4.0;

/// Tag overlap below which two documents are read as different contexts
const CONTEXT_OVERLAP: f64 = 0.5;

pub struct Resolver<'a> {
    documents: BTreeMap<&'a str, &'a AnalyzedDocument>,
    min_gap_days: i64,
}

impl<'a> Resolver<'a> {
    pub fn new(members: &[&'a AnalyzedDocument], min_gap_days: i64) -> Self {
        Self {
            documents: members.iter().map(|d| (d.document_id.as_str(), *d)).collect(),
            min_gap_days,
        }
    }

    fn position(&self, document_id: Option<&str>, statement: &str) -> Position {
        Position {
            document_id: document_id.map(str::to_string),
            statement: statement.to_string(),
            created_at: document_id
                .and_then(|id| self.documents.get(id))
                .and_then(|d| d.created_at),
        }
    }

    /// Turn a report entry into a chapter contradiction with a hypothesis
    pub fn resolve(&self, entry: &ContradictionEntry) -> Contradiction {
        let position_a = self.position(Some(entry.document_a.as_str()), &entry.statement_a);
        let position_b = self.position(entry.document_b.as_deref(), &entry.statement_b);

        let doc_a = self.documents.get(entry.document_a.as_str()).copied();
        let doc_b = entry
            .document_b
            .as_deref()
            .and_then(|id| self.documents.get(id))
            .copied();

        let (hypothesis, status, note) = match (doc_a, doc_b) {
            (Some(a), Some(b)) => self.classify(a, b, &position_a, &position_b),
            _ => (ResolutionHypothesis::Unresolved, ResolutionStatus::Unresolved, None),
        };

        let description = match &entry.tag {
            Some(tag) => format!(
                "Conflicting guidance on {}: \"{}\" vs \"{}\"",
                tag, entry.statement_a, entry.statement_b
            ),
            None => entry.statement_a.clone(),
        };

        Contradiction {
            id: entry.id.clone(),
            description,
            tag: entry.tag.clone(),
            position_a,
            position_b,
            resolution_status: status,
            hypothesis,
            resolution_note: note,
        }
    }

    fn classify(
        &self,
        a: &AnalyzedDocument,
        b: &AnalyzedDocument,
        position_a: &Position,
        position_b: &Position,
    ) -> (ResolutionHypothesis, ResolutionStatus, Option<String>) {
        if let (Some(at_a), Some(at_b)) = (a.created_at, b.created_at) {
            let gap = (at_b - at_a).num_days();
            if gap.abs() >= self.min_gap_days {
                let (earlier, later) = if gap > 0 {
                    (position_a, position_b)
                } else {
                    (position_b, position_a)
                };
                return (
                    ResolutionHypothesis::TimeEvolution,
                    ResolutionStatus::Resolved,
                    Some(format!(
                        "\"{}\" was superseded {} days later by \"{}\"",
                        earlier.statement,
                        gap.abs(),
                        later.statement
                    )),
                );
            }
        }

        let different_states = match (&a.emotional_state, &b.emotional_state) {
            (Some(x), Some(y)) => x != y,
            _ => false,
        };
        let tags_a: BTreeSet<&String> = a.topical_tags().collect();
        let tags_b: BTreeSet<&String> = b.topical_tags().collect();
        let union = tags_a.union(&tags_b).count();
        let overlap = if union == 0 {
            0.0
        } else {
            tags_a.intersection(&tags_b).count() as f64 / union as f64
        };

        if different_states || overlap < CONTEXT_OVERLAP {
            let note = if different_states {
                format!(
                    "Positions were taken in different states ({} vs {})",
                    a.emotional_state.as_deref().unwrap_or_default(),
                    b.emotional_state.as_deref().unwrap_or_default()
                )
            } else {
                "Positions come from documents about different situations".to_string()
            };
            return (
                ResolutionHypothesis::DifferingContext,
                ResolutionStatus::PartiallyResolved,
                Some(note),
            );
        }

        if a.quality_score >= DUAL_TRUTH_MIN_QUALITY && b.quality_score >= DUAL_TRUTH_MIN_QUALITY {
            return (
                ResolutionHypothesis::DualTruth,
                ResolutionStatus::PartiallyResolved,
                Some("Both positions are well supported and may hold together".to_string()),
            );
        }

        (ResolutionHypothesis::Unresolved, ResolutionStatus::Unresolved, None)
    }
}

/// Open question recorded for an unresolved contradiction
pub fn open_question(contradiction: &Contradiction) -> String {
    format!(
        "How should \"{}\" be reconciled with \"{}\"? ({})",
        contradiction.position_a.statement, contradiction.position_b.statement, contradiction.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContradictionOrigin;
    use crate::recognizers::test_support::{analyzed, dated};

    fn entry(a: &str, b: &str) -> ContradictionEntry {
        ContradictionEntry {
            id: "contra_001".into(),
            origin: ContradictionOrigin::RuleConflict,
            tag: Some("risk".into()),
            document_a: a.into(),
            document_b: Some(b.into()),
            statement_a: "average down".into(),
            statement_b: "never average down".into(),
            resolution_status: ResolutionStatus::Unresolved,
        }
    }

    #[test]
    fn test_time_evolution_when_far_apart() {
        let a = dated("doc_000", &["risk"], "2023-01-01");
        let b = dated("doc_001", &["risk"], "2023-06-01");
        let resolver = Resolver::new(&[&a, &b], 30);

        let resolved = resolver.resolve(&entry("doc_000", "doc_001"));
        assert_eq!(resolved.hypothesis, ResolutionHypothesis::TimeEvolution);
        assert_eq!(resolved.resolution_status, ResolutionStatus::Resolved);
        assert!(resolved.resolution_note.is_some());
    }

    #[test]
    fn test_differing_context_on_emotional_state() {
        let mut a = analyzed("doc_000", &["risk"], &[], &[]);
        a.emotional_state = Some("fearful".into());
        let mut b = analyzed("doc_001", &["risk"], &[], &[]);
        b.emotional_state = Some("confident".into());
        let resolver = Resolver::new(&[&a, &b], 30);

        let resolved = resolver.resolve(&entry("doc_000", "doc_001"));
        assert_eq!(resolved.hypothesis, ResolutionHypothesis::DifferingContext);
        assert_eq!(resolved.resolution_status, ResolutionStatus::PartiallyResolved);
    }

    #[test]
    fn test_dual_truth_for_high_quality_pair() {
        let mut a = analyzed("doc_000", &["risk"], &[], &[]);
        a.quality_score = 4.5;
        let mut b = analyzed("doc_001", &["risk"], &[], &[]);
        b.quality_score = 4.0;
        let resolver = Resolver::new(&[&a, &b], 30);

        assert_eq!(
            resolver.resolve(&entry("doc_000", "doc_001")).hypothesis,
            ResolutionHypothesis::DualTruth
        );
    }

    #[test]
    fn test_falls_back_to_unresolved() {
        let a = analyzed("doc_000", &["risk"], &[], &[]);
        let b = analyzed("doc_001", &["risk"], &[], &[]);
        let resolver = Resolver::new(&[&a, &b], 30);

        let resolved = resolver.resolve(&entry("doc_000", "doc_001"));
        assert_eq!(resolved.hypothesis, ResolutionHypothesis::Unresolved);
        assert!(resolved.needs_acknowledgment());
        assert!(open_question(&resolved).contains("contra_001"));
    }
}
