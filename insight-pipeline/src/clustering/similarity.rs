//! Pairwise document similarity
//!
//! `similarity = tag_weight * jaccard(tags_a, tags_b) + affinity_weight * affinity`
//!
//! Affinity is the strongest co-occurrence rate linking a tag of one
//! document to a different tag of the other. It pulls together documents
//! whose tags travel together in the corpus even when they share few tags.

use crate::models::{AnalyzedDocument, CooccurrenceFacet};
use insight_common::config::ClusteringSettings;
use std::collections::BTreeSet;

/// Symmetric similarity matrix over an ordered document list
pub struct SimilarityMatrix {
    values: Vec<Vec<f64>>,
}

impl SimilarityMatrix {
    pub fn build(
        documents: &[&AnalyzedDocument],
        cooccurrence: Option<&CooccurrenceFacet>,
        settings: &ClusteringSettings,
    ) -> Self {
        let tag_sets: Vec<BTreeSet<&str>> = documents
            .iter()
            .map(|d| d.topical_tags().map(String::as_str).collect())
            .collect();

        let n = documents.len();
        let mut values = vec![vec![0.0; n]; n];
        for i in 0..n {
            values[i][i] = 1.0;
            for j in (i + 1)..n {
                let jaccard = jaccard(&tag_sets[i], &tag_sets[j]);
                let affinity = cooccurrence
                    .map(|facet| affinity(&tag_sets[i], &tag_sets[j], facet))
                    .unwrap_or(0.0);
                let score = settings.tag_weight * jaccard + settings.affinity_weight * affinity;
                values[i][j] = score;
                values[j][i] = score;
            }
        }

        Self { values }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Mean similarity across every pair in `members` (1.0 for a singleton)
    pub fn mean_intra(&self, members: &[usize]) -> f64 {
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k + 1..] {
                total += self.values[a][b];
                pairs += 1;
            }
        }
        if pairs == 0 {
            1.0
        } else {
            total / pairs as f64
        }
    }

    /// Average-linkage distance between two clusters, as a similarity
    pub fn linkage(&self, a: &[usize], b: &[usize]) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let total: f64 = a
            .iter()
            .flat_map(|&x| b.iter().map(move |&y| (x, y)))
            .map(|(x, y)| self.values[x][y])
            .sum();
        total / (a.len() * b.len()) as f64
    }
}

pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

fn affinity(a: &BTreeSet<&str>, b: &BTreeSet<&str>, facet: &CooccurrenceFacet) -> f64 {
    let mut best: f64 = 0.0;
    for x in a {
        for y in b {
            if x == y {
                continue;
            }
            if let Some(rate) = facet.rate_between(x, y) {
                best = best.max(rate);
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CooccurrencePair;
    use crate::recognizers::test_support::analyzed;

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<&str> = ["patience", "gain"].into_iter().collect();
        let b: BTreeSet<&str> = ["patience"].into_iter().collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_affinity_links_disjoint_tags() {
        let a = analyzed("doc_000", &["stress"], &[], &[]);
        let b = analyzed("doc_001", &["overtrading"], &[], &[]);
        let facet = CooccurrenceFacet {
            pairs: vec![CooccurrencePair {
                concept_a: "overtrading".into(),
                concept_b: "stress".into(),
                count: 4,
                rate: 0.8,
                document_ids: BTreeSet::new(),
                likely_relationship: None,
            }],
        };

        let settings = ClusteringSettings::default();
        let without = SimilarityMatrix::build(&[&a, &b], None, &settings);
        let with = SimilarityMatrix::build(&[&a, &b], Some(&facet), &settings);

        assert_eq!(without.get(0, 1), 0.0);
        assert!((with.get(0, 1) - 0.3 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_mean_intra_and_linkage() {
        let docs = [
            analyzed("doc_000", &["a"], &[], &[]),
            analyzed("doc_001", &["a"], &[], &[]),
            analyzed("doc_002", &["b"], &[], &[]),
        ];
        let refs: Vec<&AnalyzedDocument> = docs.iter().collect();
        let matrix = SimilarityMatrix::build(&refs, None, &ClusteringSettings::default());

        assert!((matrix.mean_intra(&[0, 1]) - 0.7).abs() < 1e-9);
        assert_eq!(matrix.linkage(&[0, 1], &[2]), 0.0);
        assert_eq!(matrix.mean_intra(&[2]), 1.0);
    }
}
