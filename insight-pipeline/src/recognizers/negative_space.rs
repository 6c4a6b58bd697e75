//! Negative-space recognizer
//!
//! What the corpus does not talk about: vocabulary terms no document was
//! tagged with, and tags only a single document carries.

use super::usable;
use crate::error::RecognizerError;
use crate::models::{AnalyzedDocument, Facet, NegativeSpaceFacet, Vocabulary};
use crate::types::PatternRecognizer;
use std::collections::BTreeMap;

pub struct NegativeSpaceRecognizer {
    vocabulary: Vocabulary,
}

impl NegativeSpaceRecognizer {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }
}

impl PatternRecognizer for NegativeSpaceRecognizer {
    fn name(&self) -> &'static str {
        "negative_space"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let mut holders: BTreeMap<&str, usize> = BTreeMap::new();
        for document in usable(documents) {
            for tag in document.topical_tags() {
                *holders.entry(tag.as_str()).or_default() += 1;
            }
        }

        let unused_vocabulary = self
            .vocabulary
            .terms()
            .iter()
            .filter(|term| !holders.contains_key(term.as_str()))
            .cloned()
            .collect();
        let singleton_tags = holders
            .iter()
            .filter(|(_, count)| **count == 1)
            .map(|(tag, _)| tag.to_string())
            .collect();

        Ok(Facet::NegativeSpace(NegativeSpaceFacet {
            unused_vocabulary,
            singleton_tags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizers::test_support::{analyzed, stub};

    #[test]
    fn test_unused_vocabulary_and_singletons() {
        let recognizer =
            NegativeSpaceRecognizer::new(Vocabulary::new(["strategy", "discipline", "psychology"]));
        let docs = vec![
            analyzed("doc_000", &["strategy", "coffee"], &[], &[]),
            analyzed("doc_001", &["strategy"], &[], &[]),
            stub("doc_002"),
        ];

        let facet = match recognizer.analyze(&docs).unwrap() {
            Facet::NegativeSpace(f) => f,
            other => panic!("unexpected: {:?}", other),
        };

        let unused: Vec<_> = facet.unused_vocabulary.iter().map(String::as_str).collect();
        assert_eq!(unused, vec!["discipline", "psychology"]);
        let singletons: Vec<_> = facet.singleton_tags.iter().map(String::as_str).collect();
        assert_eq!(singletons, vec!["coffee"]);
    }
}
