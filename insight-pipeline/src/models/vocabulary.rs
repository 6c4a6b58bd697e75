//! Controlled tag vocabulary

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fixed set of tags the taxonomy recognizes
///
/// Tags outside the set are kept on the document but also listed as
/// out-of-vocabulary, so downstream stages can see where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    terms: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| normalize_tag(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.terms.contains(tag)
    }

    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    /// Tags from `tags` not covered by this vocabulary
    pub fn out_of_vocabulary(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        tags.iter().filter(|t| !self.contains(t)).cloned().collect()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new(insight_common::config::default_vocabulary())
    }
}

/// Lowercase, trim, and collapse inner whitespace to `-`
pub fn normalize_tag(tag: &str) -> String {
    tag.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}
