//! Co-occurrence recognizer
//!
//! Over topical tags: `rate = count_ab / min(count_a, count_b)`. Pairs are
//! reported when `count_ab ≥ min_pair_count` and `rate ≥ min_rate`.
//!
//! A `likely_relationship` hint is attached only when, for the majority of
//! dated co-occurring documents, one tag had already appeared without the
//! other in an earlier document while the other never appeared alone before.
//! It is an ordering heuristic, never a causal claim.

use super::usable;
use crate::error::RecognizerError;
use crate::models::{
    AnalyzedDocument, CooccurrenceFacet, CooccurrencePair, Facet, LikelyRelationship,
};
use crate::types::PatternRecognizer;
use insight_common::config::CooccurrenceSettings;
use std::collections::{BTreeMap, BTreeSet};

pub const RELATIONSHIP_LABEL: &str = "likely_relationship";

pub struct CooccurrenceRecognizer {
    settings: CooccurrenceSettings,
}

impl CooccurrenceRecognizer {
    pub fn new(settings: CooccurrenceSettings) -> Self {
        Self { settings }
    }
}

/// Which tag (if either) precedes the other in the majority of dated co-occurrences
fn likely_relationship(
    a: &str,
    b: &str,
    together: &BTreeSet<String>,
    corpus: &[&AnalyzedDocument],
) -> Option<LikelyRelationship> {
    let dated: Vec<&&AnalyzedDocument> = corpus
        .iter()
        .filter(|d| together.contains(&d.document_id) && d.created_at.is_some())
        .collect();
    if dated.is_empty() {
        return None;
    }

    let precedes = |first: &str, second: &str, at: &AnalyzedDocument| -> bool {
        let earlier = corpus
            .iter()
            .filter(|d| matches!((d.created_at, at.created_at), (Some(x), Some(y)) if x < y));
        let mut first_alone = false;
        for doc in earlier {
            match (doc.tags.contains(first), doc.tags.contains(second)) {
                (false, true) => return false,
                (true, false) => first_alone = true,
                _ => {}
            }
        }
        first_alone
    };

    let a_first = dated.iter().filter(|d| precedes(a, b, d)).count();
    let b_first = dated.iter().filter(|d| precedes(b, a, d)).count();
    let majority = dated.len() / 2 + 1;

    let (earlier, later, support) = if a_first >= majority {
        (a, b, a_first)
    } else if b_first >= majority {
        (b, a, b_first)
    } else {
        return None;
    };

    Some(LikelyRelationship {
        label: RELATIONSHIP_LABEL.to_string(),
        earlier: earlier.to_string(),
        later: later.to_string(),
        supporting_documents: support,
    })
}

impl PatternRecognizer for CooccurrenceRecognizer {
    fn name(&self) -> &'static str {
        "cooccurrence"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let corpus: Vec<&AnalyzedDocument> = usable(documents).collect();

        let mut holders: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for document in &corpus {
            for tag in document.topical_tags() {
                holders
                    .entry(tag.as_str())
                    .or_default()
                    .insert(document.document_id.clone());
            }
        }

        let tags: Vec<&str> = holders.keys().copied().collect();
        let mut pairs = Vec::new();

        for (i, a) in tags.iter().enumerate() {
            for b in &tags[i + 1..] {
                let docs_a = &holders[a];
                let docs_b = &holders[b];
                let together: BTreeSet<String> = docs_a.intersection(docs_b).cloned().collect();
                let count = together.len();
                if count == 0 || count < self.settings.min_pair_count {
                    continue;
                }

                let rate = count as f64 / docs_a.len().min(docs_b.len()) as f64;
                if rate < self.settings.min_rate {
                    continue;
                }

                pairs.push(CooccurrencePair {
                    likely_relationship: likely_relationship(a, b, &together, &corpus),
                    concept_a: a.to_string(),
                    concept_b: b.to_string(),
                    count,
                    rate,
                    document_ids: together,
                });
            }
        }

        pairs.sort_by(|x, y| {
            y.rate
                .total_cmp(&x.rate)
                .then_with(|| y.count.cmp(&x.count))
                .then_with(|| x.concept_a.cmp(&y.concept_a))
                .then_with(|| x.concept_b.cmp(&y.concept_b))
        });

        Ok(Facet::Cooccurrence(CooccurrenceFacet { pairs }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizers::test_support::{analyzed, dated};

    fn facet(documents: &[AnalyzedDocument]) -> CooccurrenceFacet {
        match CooccurrenceRecognizer::new(CooccurrenceSettings::default()).analyze(documents) {
            Ok(Facet::Cooccurrence(f)) => f,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_reports_strong_pairs_only() {
        let docs = vec![
            analyzed("doc_000", &["coffee", "loss"], &[], &[]),
            analyzed("doc_001", &["coffee", "loss"], &[], &[]),
            analyzed("doc_002", &["patience", "gain"], &[], &[]),
            analyzed("doc_003", &["patience", "gain"], &[], &[]),
            analyzed("doc_004", &["patience", "gain", "loss"], &[], &[]),
        ];

        let facet = facet(&docs);
        assert_eq!(facet.rate_between("coffee", "loss"), Some(1.0));
        assert_eq!(facet.rate_between("gain", "patience"), Some(1.0));
        // single co-occurrence is below min_pair_count
        assert_eq!(facet.rate_between("loss", "patience"), None);
    }

    #[test]
    fn test_directional_hint_needs_prior_solo_appearance() {
        let docs = vec![
            dated("doc_000", &["stress"], "2024-01-05"),
            dated("doc_001", &["stress", "overtrading"], "2024-02-05"),
            dated("doc_002", &["stress", "overtrading"], "2024-03-05"),
        ];

        let facet = facet(&docs);
        let pair = &facet.pairs[0];
        let hint = pair.likely_relationship.as_ref().unwrap();
        assert_eq!(hint.label, RELATIONSHIP_LABEL);
        assert_eq!(hint.earlier, "stress");
        assert_eq!(hint.later, "overtrading");
    }

    #[test]
    fn test_no_hint_for_undated_documents() {
        let docs = vec![
            analyzed("doc_000", &["a", "b"], &[], &[]),
            analyzed("doc_001", &["a", "b"], &[], &[]),
        ];
        let facet = facet(&docs);
        assert!(facet.pairs[0].likely_relationship.is_none());
    }
}
