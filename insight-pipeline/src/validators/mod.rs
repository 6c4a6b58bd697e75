//! Stage 4: chapter validation
//!
//! Runs the fixed checklist over every chapter and produces one
//! [`ValidationReport`] per chapter.
//!
//! # Checks
//! 1. **cherry_picking** (critical) - principles rest on analyzed member documents
//! 2. **actionability** - the chapter yields rules
//! 3. **contradiction_acknowledgment** (critical) - unresolved contradictions are acknowledged
//! 4. **evolution_linearity** - the timeline is not perfectly monotonic
//! 5. **evidence_sample_size** (critical) - principles have enough sources
//! 6. **cross_chapter_coherence** - complete and distinct from sibling chapters
//!
//! # Scoring
//! - `quality_score` = passing checks / total checks
//! - Any critical failure sets `escalate`
//! - Auto-reject (zero contradictions in a large theme, or a strictly
//!   monotonic timeline across many periods) fails the check outright and
//!   escalates regardless of score
//!
//! # Example
//! ```rust,ignore
//! let engine = ValidationEngine::new(settings.validation.clone());
//! let reports = engine.validate_all(&chapters, &documents);
//!
//! for report in reports.iter().filter(|r| r.escalate) {
//!     println!("{} needs review: {:?}", report.theme_id, report.failed_checks());
//! }
//! ```

pub mod checks;

use crate::models::{
    AnalyzedDocument, CheckName, CheckOutcome, CheckResult, Correction, EngineFlag,
    SynthesisChapter,
    ValidationReport,
};
use checks::CheckContext;
use insight_common::config::ValidationSettings;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub struct ValidationEngine {
    settings: ValidationSettings,
}

impl ValidationEngine {
    pub fn new(settings: ValidationSettings) -> Self {
        Self { settings }
    }

    /// Validate one chapter against the analyzed documents and its siblings
    pub fn validate(
        &self,
        chapter: &SynthesisChapter,
        documents: &[AnalyzedDocument],
        siblings: &[&SynthesisChapter],
    ) -> ValidationReport {
        let by_id: BTreeMap<&str, &AnalyzedDocument> =
            documents.iter().map(|d| (d.document_id.as_str(), d)).collect();
        let ctx = CheckContext {
            chapter,
            documents: &by_id,
            siblings,
            settings: &self.settings,
        };

        let findings = checks::run_all(&ctx);

        let mut report_checks = BTreeMap::new();
        let mut red_flags = Vec::new();
        let mut corrections: Vec<Correction> = Vec::new();
        let mut auto_rejected = false;
        let mut critical_failure = None;

        for finding in findings {
            let critical = finding.check.is_critical();
            if finding.outcome == CheckOutcome::Fail && critical && critical_failure.is_none() {
                critical_failure = Some(finding.check);
            }
            auto_rejected |= finding.auto_reject;
            red_flags.extend(finding.red_flags);
            corrections.extend(finding.corrections);
            report_checks.insert(
                finding.check.as_str().to_string(),
                CheckResult {
                    outcome: finding.outcome,
                    reason: finding.reason,
                    critical,
                },
            );
        }

        let passed = report_checks
            .values()
            .filter(|c| c.outcome == CheckOutcome::Pass)
            .count();
        let quality_score = passed as f64 / report_checks.len().max(1) as f64;
        let escalate = auto_rejected || critical_failure.is_some();

        if escalate {
            // Non-critical auto-reject comes from the timeline check
            let check = critical_failure.unwrap_or(CheckName::EvolutionLinearity);
            corrections.push(Correction::AddFlag {
                check,
                flag: EngineFlag::NeedsReview,
            });
            warn!(
                theme_id = %chapter.theme_id,
                auto_rejected,
                failed = ?report_checks
                    .iter()
                    .filter(|(_, c)| c.outcome == CheckOutcome::Fail)
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>(),
                "Chapter escalated for review"
            );
        } else {
            debug!(theme_id = %chapter.theme_id, quality_score, "Chapter validated");
        }

        ValidationReport {
            theme_id: chapter.theme_id.clone(),
            chapter_version: chapter.version,
            quality_score,
            checks: report_checks,
            red_flags,
            corrections,
            auto_rejected,
            escalate,
        }
    }

    /// Validate every chapter; reports are sorted by theme id
    pub fn validate_all(
        &self,
        chapters: &[SynthesisChapter],
        documents: &[AnalyzedDocument],
    ) -> Vec<ValidationReport> {
        let mut reports: Vec<ValidationReport> = chapters
            .iter()
            .map(|chapter| {
                let siblings: Vec<&SynthesisChapter> =
                    chapters.iter().filter(|c| c.theme_id != chapter.theme_id).collect();
                self.validate(chapter, documents, &siblings)
            })
            .collect();
        reports.sort_by(|a, b| a.theme_id.cmp(&b.theme_id));
        reports
    }

    /// Apply each report's corrections; only chapters that changed are returned
    pub fn amend_all(
        chapters: &[SynthesisChapter],
        reports: &[ValidationReport],
    ) -> Vec<SynthesisChapter> {
        let mut amended: Vec<SynthesisChapter> = chapters
            .iter()
            .filter_map(|chapter| {
                reports
                    .iter()
                    .find(|r| r.theme_id == chapter.theme_id)
                    .and_then(|r| chapter.amend(&r.corrections))
            })
            .collect();
        amended.sort_by(|a, b| a.theme_id.cmp(&b.theme_id));
        amended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::synthesis::PeriodStance;
    use crate::models::{
        Contradiction, EvidenceRef, Evolution, Position, Principle, ResolutionHypothesis,
        ResolutionStatus,
    };
    use crate::recognizers::test_support::analyzed;
    use std::collections::BTreeSet;

    fn docs(n: usize) -> Vec<AnalyzedDocument> {
        (0..n)
            .map(|i| analyzed(&format!("doc_{:03}", i), &["patience"], &["wait"], &[]))
            .collect()
    }

    fn chapter(members: usize) -> SynthesisChapter {
        let ids: BTreeSet<String> = (0..members).map(|i| format!("doc_{:03}", i)).collect();
        SynthesisChapter {
            theme_id: "theme_001".into(),
            theme_name: "Patience".into(),
            version: 1,
            executive_summary: "Summary".into(),
            core_principles: vec![Principle {
                statement: "Wait for the setup".into(),
                concepts: vec!["patience".into()],
                evidence: ids
                    .iter()
                    .map(|id| EvidenceRef {
                        document_id: id.clone(),
                        excerpt: String::new(),
                    })
                    .collect(),
                confidence: 1.0,
                implications: vec![],
            }],
            document_ids: ids,
            actionable_rules: vec![crate::models::ActionableRule {
                kind: crate::models::RuleKind::Do,
                text: "wait".into(),
                sources: vec!["doc_000".into()],
            }],
            evolution: Evolution::default(),
            contradictions: vec![],
            key_quotes: vec![],
            second_order_implications: vec!["More patience".into()],
            open_questions: vec![],
            engine_flags: BTreeSet::new(),
        }
    }

    fn engine() -> ValidationEngine {
        ValidationEngine::new(ValidationSettings::default())
    }

    fn contradiction(note: Option<&str>) -> Contradiction {
        Contradiction {
            id: "contra_001".into(),
            description: "Conflicting guidance".into(),
            tag: Some("patience".into()),
            position_a: Position {
                document_id: Some("doc_000".into()),
                statement: "wait".into(),
                created_at: None,
            },
            position_b: Position {
                document_id: Some("doc_001".into()),
                statement: "never wait".into(),
                created_at: None,
            },
            resolution_status: ResolutionStatus::Unresolved,
            hypothesis: ResolutionHypothesis::Unresolved,
            resolution_note: note.map(str::to_string),
        }
    }

    #[test]
    fn test_large_theme_without_contradictions_auto_rejects() {
        let engine = ValidationEngine::new(ValidationSettings::default());
        let report = engine.validate(&chapter(10), &docs(10), &[]);

        assert!(report.auto_rejected);
        assert!(report.escalate);
        assert_eq!(
            report.outcome(CheckName::ContradictionAcknowledgment),
            Some(CheckOutcome::Fail)
        );
        assert!(!report.red_flags.is_empty());
    }

    #[test]
    fn test_small_theme_without_contradictions_is_a_red_flag() {
        let engine = ValidationEngine::new(ValidationSettings::default());
        let report = engine.validate(&chapter(3), &docs(3), &[]);

        assert!(!report.escalate);
        assert_eq!(
            report.outcome(CheckName::ContradictionAcknowledgment),
            Some(CheckOutcome::Warn)
        );
        assert_eq!(report.red_flags.len(), 1);
        assert!(report
            .corrections
            .iter()
            .any(|c| matches!(c, Correction::AddOpenQuestion { .. })));
        assert!((report.quality_score - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_unacknowledged_contradiction_escalates() {
        let mut ch = chapter(3);
        ch.contradictions.push(contradiction(None));
        let engine = ValidationEngine::new(ValidationSettings::default());

        let report = engine.validate(&ch, &docs(3), &[]);
        assert!(report.escalate);
        assert!(!report.auto_rejected);

        let amended = ch.amend(&report.corrections).unwrap();
        assert_eq!(amended.version, 2);
        assert!(amended.open_questions.iter().any(|q| q.contains("contra_001")));
        assert!(amended.has_flag(EngineFlag::NeedsReview));

        // the amended chapter acknowledges it
        let again = engine.validate(&amended, &docs(3), &[]);
        assert_eq!(again.outcome(CheckName::ContradictionAcknowledgment), Some(CheckOutcome::Pass));
    }

    #[test]
    fn test_resolution_note_counts_as_acknowledged() {
        let mut ch = chapter(3);
        ch.contradictions.push(contradiction(Some("context differs")));
        let report = engine().validate(&ch, &docs(3), &[]);
        assert_eq!(
            report.outcome(CheckName::ContradictionAcknowledgment),
            Some(CheckOutcome::Pass)
        );
    }

    #[test]
    fn test_monotonic_timeline_auto_rejects() {
        let mut ch = chapter(4);
        ch.contradictions.push(contradiction(Some("noted")));
        ch.evolution.periods = (0..4)
            .map(|i| PeriodStance {
                period: format!("2023-0{}", i + 1),
                document_ids: vec![format!("doc_{:03}", i)],
                stance: BTreeMap::new(),
                overall: i as f64 * 0.25,
            })
            .collect();

        let report = engine().validate(&ch, &docs(4), &[]);
        assert!(report.auto_rejected);
        assert!(report.escalate);
        assert_eq!(report.outcome(CheckName::EvolutionLinearity), Some(CheckOutcome::Fail));
    }

    #[test]
    fn test_principles_citing_stubs_fail_cherry_picking() {
        let mut documents = docs(3);
        documents[2] = crate::recognizers::test_support::stub("doc_002");
        let report = engine().validate(&chapter(3), &documents, &[]);

        assert_eq!(report.outcome(CheckName::CherryPicking), Some(CheckOutcome::Fail));
        assert!(report.escalate);
        assert!(report
            .corrections
            .iter()
            .any(|c| matches!(c, Correction::DropPrinciple { .. })));
    }

    #[test]
    fn test_validate_all_checks_sibling_overlap() {
        let a = chapter(3);
        let mut b = chapter(3);
        b.theme_id = "theme_002".into();
        b.core_principles[0].statement = "Different".into();

        let reports = engine().validate_all(&[b, a], &docs(3));
        assert_eq!(reports[0].theme_id, "theme_001");
        assert_eq!(reports[0].outcome(CheckName::CrossChapterCoherence), Some(CheckOutcome::Fail));
    }
}
