//! Emotional-state recognizer

use super::usable;
use crate::error::RecognizerError;
use crate::models::patterns::EmotionalStat;
use crate::models::{AnalyzedDocument, EmotionalFacet, Facet};
use crate::types::PatternRecognizer;
use std::collections::{BTreeMap, BTreeSet};

/// Groups documents by declared emotional state with their mean quality
pub struct EmotionalRecognizer;

impl PatternRecognizer for EmotionalRecognizer {
    fn name(&self) -> &'static str {
        "emotional"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let mut groups: BTreeMap<String, (BTreeSet<String>, f64)> = BTreeMap::new();
        let mut unspecified = BTreeSet::new();

        for document in usable(documents) {
            match &document.emotional_state {
                Some(state) => {
                    let (ids, quality_sum) = groups.entry(state.clone()).or_default();
                    ids.insert(document.document_id.clone());
                    *quality_sum += document.quality_score;
                }
                None => {
                    unspecified.insert(document.document_id.clone());
                }
            }
        }

        let states = groups
            .into_iter()
            .map(|(state, (document_ids, quality_sum))| {
                let count = document_ids.len();
                (
                    state,
                    EmotionalStat {
                        count,
                        mean_quality: quality_sum / count as f64,
                        document_ids,
                    },
                )
            })
            .collect();

        Ok(Facet::Emotional(EmotionalFacet { states, unspecified }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizers::test_support::analyzed;

    #[test]
    fn test_groups_states_with_mean_quality() {
        let mut calm = analyzed("doc_000", &["patience"], &[], &[]);
        calm.emotional_state = Some("calm".into());
        calm.quality_score = 4.0;
        let mut calm2 = analyzed("doc_001", &["patience"], &[], &[]);
        calm2.emotional_state = Some("calm".into());
        calm2.quality_score = 2.0;
        let plain = analyzed("doc_002", &["risk"], &[], &[]);

        let facet = match EmotionalRecognizer.analyze(&[calm, calm2, plain]).unwrap() {
            Facet::Emotional(f) => f,
            other => panic!("unexpected: {:?}", other),
        };

        let stat = &facet.states["calm"];
        assert_eq!(stat.count, 2);
        assert!((stat.mean_quality - 3.0).abs() < 1e-9);
        assert!(facet.unspecified.contains("doc_002"));
    }
}
