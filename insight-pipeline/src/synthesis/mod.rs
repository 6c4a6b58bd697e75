//! Stage 3: per-theme synthesis
//!
//! [`SynthesisEngine`] turns one theme into one [`SynthesisChapter`]:
//! principles, actionable rules, evolution, contradictions with proposed
//! resolutions, quotes, implications, open questions.
//!
//! # Contradictions
//! Every contradiction entry from the pattern report whose documents are
//! all members of the theme is surfaced. When the contradiction facet is
//! absent (its recognizer failed) they are recomputed over the members and
//! the chapter carries `contradictions_recomputed`.
//!
//! # Engine Flags
//! - **suspicious_coherence:** no contradictions despite a large theme
//! - **contains_failed_documents:** some members are analysis stubs

pub mod evolution;
pub mod principles;
pub mod resolution;

use crate::error::SynthesisError;
use crate::models::{
    ActionableRule, AnalyzedDocument, EngineFlag, PatternReport, RuleKind, SynthesisChapter, Theme,
};
use crate::recognizers::detect_contradictions;
use crate::types::ChapterSynthesizer;
use insight_common::config::SynthesisSettings;
use resolution::Resolver;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Implication used when principles suggest none
const NO_IMPLICATIONS: &str = "Further analysis needed to identify implications";

/// Maximum implications listed per chapter
const MAX_IMPLICATIONS: usize = 5;

pub struct SynthesisEngine {
    settings: SynthesisSettings,
    /// Rule match threshold used when contradictions must be recomputed
    match_threshold: f64,
}

impl SynthesisEngine {
    pub fn new(settings: SynthesisSettings, match_threshold: f64) -> Self {
        Self {
            settings,
            match_threshold,
        }
    }

    /// Synchronous core of [`ChapterSynthesizer::synthesize`]
    pub fn build_chapter(
        &self,
        theme: &Theme,
        documents: &[AnalyzedDocument],
        report: &PatternReport,
    ) -> Result<SynthesisChapter, SynthesisError> {
        if theme.document_ids.is_empty() {
            return Err(SynthesisError::EmptyTheme(theme.id.clone()));
        }

        let by_id: BTreeMap<&str, &AnalyzedDocument> =
            documents.iter().map(|d| (d.document_id.as_str(), d)).collect();
        let missing: Vec<String> = theme
            .document_ids
            .iter()
            .filter(|id| !by_id.contains_key(id.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SynthesisError::MissingDocuments {
                theme_id: theme.id.clone(),
                missing,
            });
        }

        let all_members: Vec<&AnalyzedDocument> = theme
            .document_ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();
        let members: Vec<&AnalyzedDocument> =
            all_members.iter().copied().filter(|d| !d.is_failed()).collect();

        let mut engine_flags = BTreeSet::new();
        if members.len() < all_members.len() {
            engine_flags.insert(EngineFlag::ContainsFailedDocuments);
        }

        // Contradictions
        let entries = match &report.contradictions {
            Some(facet) => facet.within(&theme.document_ids).cloned().collect::<Vec<_>>(),
            None => {
                engine_flags.insert(EngineFlag::ContradictionsRecomputed);
                detect_contradictions(&members, self.match_threshold)
            }
        };
        let resolver = Resolver::new(&members, self.settings.min_resolution_gap_days);
        let contradictions: Vec<_> = entries.iter().map(|e| resolver.resolve(e)).collect();

        if contradictions.is_empty() && all_members.len() >= self.settings.suspicious_member_count {
            engine_flags.insert(EngineFlag::SuspiciousCoherence);
        }

        let core_principles =
            principles::extract(&members, &contradictions, self.settings.principle_confidence);
        let actionable_rules = self.actionable_rules(&members);
        let evolution = evolution::track(
            &members,
            &theme.key_concepts,
            self.settings.period,
            self.settings.stance_threshold,
        );

        let mut open_questions: Vec<String> = contradictions
            .iter()
            .filter(|c| c.needs_acknowledgment())
            .map(resolution::open_question)
            .collect();
        if core_principles.is_empty() {
            open_questions.push(
                "What additional evidence is needed to state a principle for this theme?".into(),
            );
        }
        if engine_flags.contains(&EngineFlag::ContainsFailedDocuments) {
            open_questions
                .push("Would the documents that failed analysis change this picture?".to_string());
        }

        let mut second_order_implications: Vec<String> = core_principles
            .iter()
            .filter_map(|p| p.implications.first().map(|i| format!("{}: {}", p.statement, i)))
            .chain(evolution.stance_shifts.iter().map(|s| {
                format!(
                    "Stance on {} moved from {:.2} ({}) to {:.2} ({})",
                    s.concept, s.from_stance, s.from_period, s.to_stance, s.to_period
                )
            }))
            .take(MAX_IMPLICATIONS)
            .collect();
        if second_order_implications.is_empty() {
            second_order_implications.push(NO_IMPLICATIONS.to_string());
        }

        let unresolved = contradictions.iter().filter(|c| c.needs_acknowledgment()).count();
        let executive_summary = format!(
            "{} encompasses {} documents examining {}. \
             {} principle(s), {} rule(s), {} contradiction(s) ({} unresolved).",
            theme.name,
            all_members.len(),
            theme.key_concepts.iter().take(3).cloned().collect::<Vec<_>>().join(", "),
            core_principles.len(),
            actionable_rules.len(),
            contradictions.len(),
            unresolved
        );

        debug!(
            theme_id = %theme.id,
            principles = core_principles.len(),
            contradictions = contradictions.len(),
            "Chapter synthesized"
        );

        Ok(SynthesisChapter {
            theme_id: theme.id.clone(),
            theme_name: theme.name.clone(),
            version: 1,
            document_ids: theme.document_ids.clone(),
            executive_summary,
            core_principles,
            actionable_rules,
            evolution,
            contradictions,
            key_quotes: self.key_quotes(&members),
            second_order_implications,
            open_questions,
            engine_flags,
        })
    }

    /// Rules stated by members, most widely stated first
    fn actionable_rules(&self, members: &[&AnalyzedDocument]) -> Vec<ActionableRule> {
        let mut grouped: BTreeMap<(RuleKind, String), (String, BTreeSet<String>)> = BTreeMap::new();
        for member in members {
            let rules = member
                .rules
                .do_rules
                .iter()
                .map(|r| (RuleKind::Do, r))
                .chain(member.rules.dont.iter().map(|r| (RuleKind::Dont, r)));
            for (kind, text) in rules {
                let (_, sources) = grouped
                    .entry((kind, text.to_lowercase()))
                    .or_insert_with(|| (text.clone(), BTreeSet::new()));
                sources.insert(member.document_id.clone());
            }
        }

        let mut rules: Vec<ActionableRule> = grouped
            .into_iter()
            .map(|((kind, _), (text, sources))| ActionableRule {
                kind,
                text,
                sources: sources.into_iter().collect(),
            })
            .collect();
        rules.sort_by(|a, b| {
            b.sources
                .len()
                .cmp(&a.sources.len())
                .then_with(|| a.kind.cmp(&b.kind))
                .then_with(|| a.text.cmp(&b.text))
        });
        rules.truncate(self.settings.max_rules);
        rules
    }

    /// One quote per member, highest quality first
    fn key_quotes(&self, members: &[&AnalyzedDocument]) -> Vec<String> {
        let mut ranked: Vec<&AnalyzedDocument> = members.to_vec();
        ranked.sort_by(|a, b| {
            b.quality_score
                .total_cmp(&a.quality_score)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });

        let mut seen = BTreeSet::new();
        ranked
            .iter()
            .filter_map(|d| d.evidence.first().or_else(|| Some(&d.core_principle)))
            .filter(|q| !q.is_empty())
            .filter(|q| seen.insert(q.to_string()))
            .take(self.settings.max_quotes)
            .cloned()
            .collect()
    }
}

#[async_trait::async_trait]
impl ChapterSynthesizer for SynthesisEngine {
    fn name(&self) -> &'static str {
        "synthesis_engine"
    }

    async fn synthesize(
        &self,
        theme: &Theme,
        documents: &[AnalyzedDocument],
        report: &PatternReport,
    ) -> Result<SynthesisChapter, SynthesisError> {
        self.build_chapter(theme, documents, report)
    }
}
