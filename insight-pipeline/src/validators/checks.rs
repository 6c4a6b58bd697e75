//! The six chapter checks
//!
//! Each check looks at one chapter (plus the analyzed documents and the
//! sibling chapters where it needs them) and returns a [`Finding`]: the
//! outcome with its reason, any red flags, and corrections that would fix
//! what it found.

use crate::models::{
    AnalyzedDocument, CheckName, CheckOutcome, Correction, EngineFlag, SynthesisChapter,
};
use crate::synthesis::evolution::is_strictly_monotonic;
use crate::synthesis::resolution::open_question;
use insight_common::config::ValidationSettings;
use std::collections::{BTreeMap, BTreeSet};

/// Share of usable members the principles must cite before cherry-picking is suspected
const MIN_CITED_SHARE: f64 = 0.5;

/// Coherence (summary, principles, rules, implications present) needed to pass
const MIN_COHERENCE: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct Finding {
    pub check: CheckName,
    pub outcome: CheckOutcome,
    pub reason: String,
    pub red_flags: Vec<String>,
    pub corrections: Vec<Correction>,
    /// Hard auto-reject condition hit
    pub auto_reject: bool,
}

impl Finding {
    fn new(check: CheckName, outcome: CheckOutcome, reason: impl Into<String>) -> Self {
        Self {
            check,
            outcome,
            reason: reason.into(),
            red_flags: Vec::new(),
            corrections: Vec::new(),
            auto_reject: false,
        }
    }

    fn pass(check: CheckName, reason: impl Into<String>) -> Self {
        Self::new(check, CheckOutcome::Pass, reason)
    }

    fn warn(check: CheckName, reason: impl Into<String>) -> Self {
        Self::new(check, CheckOutcome::Warn, reason)
    }

    fn fail(check: CheckName, reason: impl Into<String>) -> Self {
        Self::new(check, CheckOutcome::Fail, reason)
    }
}

/// Shared inputs for one chapter's checks
pub struct CheckContext<'a> {
    pub chapter: &'a SynthesisChapter,
    pub documents: &'a BTreeMap<&'a str, &'a AnalyzedDocument>,
    pub siblings: &'a [&'a SynthesisChapter],
    pub settings: &'a ValidationSettings,
}

impl CheckContext<'_> {
    fn usable_members(&self) -> usize {
        self.chapter
            .document_ids
            .iter()
            .filter(|id| {
                self.documents
                    .get(id.as_str())
                    .map(|d| !d.is_failed())
                    .unwrap_or(false)
            })
            .count()
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Principles must rest on member documents that were actually analyzed,
/// and together cite a fair share of the theme
pub fn cherry_picking(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::CherryPicking;
    let chapter = ctx.chapter;
    if chapter.core_principles.is_empty() {
        return Finding::warn(check, "No principles to check");
    }

    let mut finding = Finding::pass(check, "Principles cite member evidence");
    let mut bad = Vec::new();
    for principle in &chapter.core_principles {
        let unsound = principle.evidence.iter().any(|e| {
            !chapter.document_ids.contains(&e.document_id)
                || ctx
                    .documents
                    .get(e.document_id.as_str())
                    .map(|d| d.is_failed())
                    .unwrap_or(true)
        });
        if unsound {
            bad.push(principle.statement.clone());
            finding.corrections.push(Correction::DropPrinciple {
                check,
                statement: principle.statement.clone(),
            });
        }
    }

    if !bad.is_empty() {
        finding.outcome = CheckOutcome::Fail;
        finding.reason = format!(
            "{} principle(s) cite documents outside the theme or without analysis",
            bad.len()
        );
        return finding;
    }

    let cited: BTreeSet<&str> = chapter
        .core_principles
        .iter()
        .flat_map(|p| p.evidence_ids())
        .collect();
    let usable = ctx.usable_members();
    if usable > 0 && (cited.len() as f64) < usable as f64 * MIN_CITED_SHARE {
        finding.outcome = CheckOutcome::Warn;
        finding.reason = format!(
            "Principles cite only {} of {} member documents",
            cited.len(),
            usable
        );
    }
    finding
}

/// The chapter must tell the reader what to do
pub fn actionability(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::Actionability;
    let chapter = ctx.chapter;
    match (chapter.actionable_rules.is_empty(), chapter.core_principles.is_empty()) {
        (false, _) => Finding::pass(
            check,
            format!("{} actionable rule(s)", chapter.actionable_rules.len()),
        ),
        (true, false) => Finding::warn(check, "Principles without actionable rules"),
        (true, true) => Finding::fail(check, "Neither principles nor rules"),
    }
}

/// Unresolved contradictions must be acknowledged; none at all is suspicious
pub fn contradiction_acknowledgment(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::ContradictionAcknowledgment;
    let chapter = ctx.chapter;
    let members = chapter.document_ids.len();

    if chapter.contradictions.is_empty() {
        if members >= ctx.settings.large_theme {
            let mut finding = Finding::fail(
                check,
                format!("Universal agreement claimed across {} documents", members),
            );
            finding.auto_reject = true;
            finding.red_flags.push(format!(
                "No contradictions across {} documents in {}",
                members, chapter.theme_name
            ));
            finding.corrections.push(Correction::AddFlag {
                check,
                flag: EngineFlag::SuspiciousCoherence,
            });
            return finding;
        }
        if members > 1 {
            let mut finding = Finding::warn(check, "No contradictions identified");
            finding
                .red_flags
                .push(format!("No contradictions identified in {}", chapter.theme_name));
            finding.corrections.push(Correction::AddOpenQuestion {
                check,
                question: format!(
                    "Were contradictions genuinely absent in {}?",
                    chapter.theme_name
                ),
            });
            return finding;
        }
        return Finding::pass(check, "Single-document theme");
    }

    let unacknowledged: Vec<_> = chapter
        .contradictions
        .iter()
        .filter(|c| c.needs_acknowledgment())
        .filter(|c| c.resolution_note.is_none())
        .filter(|c| !chapter.open_questions.iter().any(|q| q.contains(&c.id)))
        .collect();

    if unacknowledged.is_empty() {
        return Finding::pass(
            check,
            format!("{} contradiction(s) acknowledged", chapter.contradictions.len()),
        );
    }

    let mut finding = Finding::fail(
        check,
        format!("{} unresolved contradiction(s) not acknowledged", unacknowledged.len()),
    );
    finding.corrections = unacknowledged
        .iter()
        .map(|c| Correction::AddOpenQuestion {
            check,
            question: open_question(c),
        })
        .collect();
    finding
}

/// A perfectly monotonic timeline over many periods reads as invented
pub fn evolution_linearity(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::EvolutionLinearity;
    let periods = ctx.chapter.evolution.periods.len();

    if periods < 2 {
        return Finding::pass(check, "Fewer than two dated periods");
    }
    if periods >= ctx.settings.monotonic_periods && is_strictly_monotonic(&ctx.chapter.evolution) {
        let mut finding = Finding::fail(
            check,
            format!("Stance is strictly monotonic across {} periods", periods),
        );
        finding.auto_reject = true;
        finding.red_flags.push(format!(
            "Perfectly linear evolution in {}",
            ctx.chapter.theme_name
        ));
        return finding;
    }
    Finding::pass(
        check,
        format!(
            "{} periods, {} stance shift(s)",
            periods,
            ctx.chapter.evolution.stance_shifts.len()
        ),
    )
}

/// Every principle needs `min_evidence` supporting documents
pub fn evidence_sample_size(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::EvidenceSampleSize;
    let chapter = ctx.chapter;
    let min = ctx.settings.min_evidence;
    if chapter.core_principles.is_empty() {
        let mut finding = Finding::warn(check, "No principles to check");
        finding
            .red_flags
            .push(format!("No core principles in {}", chapter.theme_name));
        return finding;
    }

    let weak: Vec<&str> = chapter
        .core_principles
        .iter()
        .filter(|p| p.evidence_ids().len() < min)
        .map(|p| p.statement.as_str())
        .collect();

    if weak.is_empty() {
        return Finding::pass(check, format!("Every principle has at least {} sources", min));
    }

    let mut finding = if weak.len() == chapter.core_principles.len() {
        Finding::fail(check, format!("No principle has {} or more sources", min))
    } else {
        Finding::warn(check, format!("{} principle(s) below {} sources", weak.len(), min))
    };
    finding.corrections = weak
        .into_iter()
        .map(|statement| Correction::DropPrinciple {
            check,
            statement: statement.to_string(),
        })
        .collect();
    finding
}

/// The chapter must be complete and must not repeat or overlap its siblings
pub fn cross_chapter_coherence(ctx: &CheckContext<'_>) -> Finding {
    let check = CheckName::CrossChapterCoherence;
    let chapter = ctx.chapter;

    let overlapping: Vec<&str> = ctx
        .siblings
        .iter()
        .filter(|s| !s.document_ids.is_disjoint(&chapter.document_ids))
        .map(|s| s.theme_id.as_str())
        .collect();
    if !overlapping.is_empty() {
        return Finding::fail(
            check,
            format!("Shares member documents with {}", overlapping.join(", ")),
        );
    }

    let statements: BTreeSet<&str> = chapter
        .core_principles
        .iter()
        .map(|p| p.statement.as_str())
        .collect();
    let repeated: Vec<&str> = ctx
        .siblings
        .iter()
        .filter(|s| s.core_principles.iter().any(|p| statements.contains(p.statement.as_str())))
        .map(|s| s.theme_id.as_str())
        .collect();

    let parts = [
        !chapter.executive_summary.is_empty(),
        !chapter.core_principles.is_empty(),
        !chapter.actionable_rules.is_empty(),
        !chapter.second_order_implications.is_empty(),
    ];
    let coherence = parts.iter().filter(|p| **p).count() as f64 / parts.len() as f64;

    if !repeated.is_empty() {
        return Finding::warn(
            check,
            format!("Principles repeated in {}", repeated.join(", ")),
        );
    }
    if coherence < MIN_COHERENCE {
        return Finding::warn(check, format!("Chapter completeness {:.2}", coherence));
    }
    Finding::pass(check, format!("Chapter completeness {:.2}", coherence))
}

/// Run every check in checklist order
pub fn run_all(ctx: &CheckContext<'_>) -> Vec<Finding> {
    CheckName::ALL
        .iter()
        .map(|check| match check {
            CheckName::CherryPicking => cherry_picking(ctx),
            CheckName::Actionability => actionability(ctx),
            CheckName::ContradictionAcknowledgment => contradiction_acknowledgment(ctx),
            CheckName::EvolutionLinearity => evolution_linearity(ctx),
            CheckName::EvidenceSampleSize => evidence_sample_size(ctx),
            CheckName::CrossChapterCoherence => cross_chapter_coherence(ctx),
        })
        .collect()
}
