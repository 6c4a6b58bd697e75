//! Contradiction mapping
//!
//! Two documents contradict when they share a topical tag and a do-rule of
//! one matches a don't-rule of the other after normalization (cue words and
//! punctuation stripped). Matching is exact or normalized Levenshtein
//! similarity ≥ `match_threshold`.
//!
//! Contradictions the capability declared itself are added as `declared`
//! entries. Every entry starts `unresolved`; synthesis proposes resolutions.

use super::usable;
use crate::error::RecognizerError;
use crate::models::{
    AnalyzedDocument, ContradictionEntry, ContradictionFacet, ContradictionOrigin, Facet,
    ResolutionStatus,
};
use crate::types::PatternRecognizer;
use insight_common::config::ContradictionSettings;
use std::collections::{BTreeMap, BTreeSet};

/// Words that carry the polarity of a rule, not its action
const CUE_WORDS: &[&str] = &[
    "do", "don't", "dont", "not", "never", "avoid", "stop", "should", "shouldn't", "must",
    "mustn't", "always", "i", "you", "we",
];

/// Reduce a rule to its action: lowercase, no punctuation, no cue words
pub fn normalize_rule(rule: &str) -> String {
    rule.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty() && !CUE_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether two normalized rule actions describe the same action
pub fn actions_match(a: &str, b: &str, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || strsim::normalized_levenshtein(a, b) >= threshold
}

/// Rule conflicts between every ordered pair of documents sharing a tag
///
/// Shared by the recognizer and by synthesis when the facet is missing.
/// Entries are sorted and numbered `contra_001`, `contra_002`, ...
pub fn detect_contradictions(
    documents: &[&AnalyzedDocument],
    threshold: f64,
) -> Vec<ContradictionEntry> {
    let normalized: Vec<(Vec<(String, &String)>, Vec<(String, &String)>)> = documents
        .iter()
        .map(|d| {
            let dos = d.rules.do_rules.iter().map(|r| (normalize_rule(r), r)).collect();
            let donts = d.rules.dont.iter().map(|r| (normalize_rule(r), r)).collect();
            (dos, donts)
        })
        .collect();

    let known: BTreeSet<&str> = documents.iter().map(|d| d.document_id.as_str()).collect();
    let mut found: BTreeMap<(String, Option<String>, String, String), ContradictionEntry> =
        BTreeMap::new();

    for (i, doer) in documents.iter().enumerate() {
        for (j, avoider) in documents.iter().enumerate() {
            if i == j {
                continue;
            }
            let shared = doer
                .topical_tags()
                .find(|t| avoider.tags.contains(t.as_str()));
            let Some(tag) = shared else {
                continue;
            };

            for (do_norm, do_raw) in &normalized[i].0 {
                for (dont_norm, dont_raw) in &normalized[j].1 {
                    if !actions_match(do_norm, dont_norm, threshold) {
                        continue;
                    }
                    let key = (
                        doer.document_id.clone(),
                        Some(avoider.document_id.clone()),
                        (*do_raw).clone(),
                        (*dont_raw).clone(),
                    );
                    found.entry(key).or_insert_with(|| ContradictionEntry {
                        id: String::new(),
                        origin: ContradictionOrigin::RuleConflict,
                        tag: Some(tag.clone()),
                        document_a: doer.document_id.clone(),
                        document_b: Some(avoider.document_id.clone()),
                        statement_a: (*do_raw).clone(),
                        statement_b: (*dont_raw).clone(),
                        resolution_status: ResolutionStatus::Unresolved,
                    });
                }
            }
        }
    }

    for document in documents {
        for declared in &document.contradictions {
            let other = declared
                .document_id
                .as_deref()
                .filter(|id| known.contains(id) && *id != document.document_id)
                .map(str::to_string);
            let statement_b = other
                .as_deref()
                .and_then(|id| documents.iter().find(|d| d.document_id == id))
                .map(|d| d.core_principle.clone())
                .unwrap_or_else(|| "other documents".to_string());

            let key = (
                document.document_id.clone(),
                other.clone(),
                declared.description.clone(),
                statement_b.clone(),
            );
            found.entry(key).or_insert_with(|| ContradictionEntry {
                id: String::new(),
                origin: ContradictionOrigin::Declared,
                tag: None,
                document_a: document.document_id.clone(),
                document_b: other,
                statement_a: declared.description.clone(),
                statement_b,
                resolution_status: ResolutionStatus::Unresolved,
            });
        }
    }

    found
        .into_values()
        .enumerate()
        .map(|(n, mut entry)| {
            entry.id = format!("contra_{:03}", n + 1);
            entry
        })
        .collect()
}

pub struct ContradictionRecognizer {
    settings: ContradictionSettings,
}

impl ContradictionRecognizer {
    pub fn new(settings: ContradictionSettings) -> Self {
        Self { settings }
    }
}

impl PatternRecognizer for ContradictionRecognizer {
    fn name(&self) -> &'static str {
        "contradiction"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let corpus: Vec<&AnalyzedDocument> = usable(documents).collect();
        let entries = detect_contradictions(&corpus, self.settings.match_threshold);
        Ok(Facet::Contradiction(ContradictionFacet { entries }))
    }
}
