//! Pattern report and its facets
//!
//! One facet per recognizer. A facet is `None` when its recognizer failed;
//! the failure itself is listed in [`PatternReport::failures`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Frequency
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    CoreBelief,
    Notable,
    Incidental,
}

/// Statistics for one concept key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptStat {
    pub concept: String,
    /// Number of distinct documents mentioning the concept
    pub count: usize,
    pub document_ids: BTreeSet<String>,
    pub significance: Significance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFacet {
    /// Usable (non-stub) documents the counts are relative to
    pub corpus_size: usize,
    /// Descending by count, ties alphabetical
    pub ranked: Vec<ConceptStat>,
    /// Concept counts per bucket (`1-5`, `6-10`, `11-20`, `20+`)
    pub distribution: BTreeMap<String, usize>,
}

impl FrequencyFacet {
    pub fn get(&self, concept: &str) -> Option<&ConceptStat> {
        self.ranked.iter().find(|s| s.concept == concept)
    }

    pub fn count(&self, concept: &str) -> usize {
        self.get(concept).map(|s| s.count).unwrap_or(0)
    }
}

// ============================================================================
// Co-occurrence
// ============================================================================

/// Heuristic ordering hint; never a causal claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikelyRelationship {
    pub label: String,
    pub earlier: String,
    pub later: String,
    /// Co-occurring documents that support the ordering
    pub supporting_documents: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooccurrencePair {
    /// Alphabetically first concept
    pub concept_a: String,
    pub concept_b: String,
    pub count: usize,
    /// `count / min(count_a, count_b)`
    pub rate: f64,
    pub document_ids: BTreeSet<String>,
    pub likely_relationship: Option<LikelyRelationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CooccurrenceFacet {
    /// Descending by rate, then by count, then by names
    pub pairs: Vec<CooccurrencePair>,
}

impl CooccurrenceFacet {
    /// Rate of a reported pair, in either order
    pub fn rate_between(&self, a: &str, b: &str) -> Option<f64> {
        let (x, y) = if a <= b { (a, b) } else { (b, a) };
        self.pairs
            .iter()
            .find(|p| p.concept_a == x && p.concept_b == y)
            .map(|p| p.rate)
    }
}

// ============================================================================
// Contradictions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Unresolved,
    PartiallyResolved,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionOrigin {
    /// A do-rule in one document matches a don't-rule in another
    RuleConflict,
    /// Declared by the analysis capability
    Declared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContradictionEntry {
    pub id: String,
    pub origin: ContradictionOrigin,
    /// Shared tag the conflict was matched on
    pub tag: Option<String>,
    /// Document holding the "do" side (or the declaring document)
    pub document_a: String,
    /// Document holding the "don't" side, if known
    pub document_b: Option<String>,
    pub statement_a: String,
    pub statement_b: String,
    pub resolution_status: ResolutionStatus,
}

impl ContradictionEntry {
    /// True when every named document is in `ids`
    pub fn within(&self, ids: &BTreeSet<String>) -> bool {
        ids.contains(&self.document_a)
            && self.document_b.as_ref().map(|b| ids.contains(b)).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContradictionFacet {
    pub entries: Vec<ContradictionEntry>,
}

impl ContradictionFacet {
    pub fn within<'a>(
        &'a self,
        ids: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a ContradictionEntry> {
        self.entries.iter().filter(move |e| e.within(ids))
    }
}

// ============================================================================
// Temporal / emotional / negative space
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodConcepts {
    pub document_ids: BTreeSet<String>,
    pub concepts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalFacet {
    /// Keyed by `YYYY-MM`
    pub periods: BTreeMap<String, PeriodConcepts>,
    /// Concept → first period seen
    pub first_seen: BTreeMap<String, String>,
    /// Concept → last period seen
    pub last_seen: BTreeMap<String, String>,
    pub undated: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalStat {
    pub count: usize,
    pub document_ids: BTreeSet<String>,
    pub mean_quality: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalFacet {
    pub states: BTreeMap<String, EmotionalStat>,
    pub unspecified: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NegativeSpaceFacet {
    /// Vocabulary tags no document used
    pub unused_vocabulary: BTreeSet<String>,
    /// Tags carried by exactly one document
    pub singleton_tags: BTreeSet<String>,
}

// ============================================================================
// Report
// ============================================================================

/// Output of one recognizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "facet", rename_all = "snake_case")]
pub enum Facet {
    Frequency(FrequencyFacet),
    Cooccurrence(CooccurrenceFacet),
    Contradiction(ContradictionFacet),
    Temporal(TemporalFacet),
    Emotional(EmotionalFacet),
    NegativeSpace(NegativeSpaceFacet),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizerFailure {
    pub recognizer: String,
    pub reason: String,
}

/// Aggregate of all facets for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub frequency: Option<FrequencyFacet>,
    pub cooccurrence: Option<CooccurrenceFacet>,
    pub contradictions: Option<ContradictionFacet>,
    pub temporal: Option<TemporalFacet>,
    pub emotional: Option<EmotionalFacet>,
    pub negative_space: Option<NegativeSpaceFacet>,
    /// Sorted by recognizer name
    pub failures: Vec<RecognizerFailure>,
}

impl PatternReport {
    /// Place a facet in its fixed slot
    pub fn insert(&mut self, facet: Facet) {
        match facet {
            Facet::Frequency(f) => self.frequency = Some(f),
            Facet::Cooccurrence(f) => self.cooccurrence = Some(f),
            Facet::Contradiction(f) => self.contradictions = Some(f),
            Facet::Temporal(f) => self.temporal = Some(f),
            Facet::Emotional(f) => self.emotional = Some(f),
            Facet::NegativeSpace(f) => self.negative_space = Some(f),
        }
    }

    pub fn present_facets(&self) -> usize {
        [
            self.frequency.is_some(),
            self.cooccurrence.is_some(),
            self.contradictions.is_some(),
            self.temporal.is_some(),
            self.emotional.is_some(),
            self.negative_space.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_between_is_order_insensitive() {
        let facet = CooccurrenceFacet {
            pairs: vec![CooccurrencePair {
                concept_a: "gain".into(),
                concept_b: "patience".into(),
                count: 3,
                rate: 1.0,
                document_ids: BTreeSet::new(),
                likely_relationship: None,
            }],
        };

        assert_eq!(facet.rate_between("patience", "gain"), Some(1.0));
        assert_eq!(facet.rate_between("gain", "patience"), Some(1.0));
        assert_eq!(facet.rate_between("gain", "coffee"), None);
    }

    #[test]
    fn test_insert_fills_fixed_slot() {
        let mut report = PatternReport::default();
        report.insert(Facet::NegativeSpace(NegativeSpaceFacet::default()));

        assert!(report.negative_space.is_some());
        assert!(report.frequency.is_none());
        assert_eq!(report.present_facets(), 1);
    }

    #[test]
    fn test_entry_within_requires_both_sides() {
        let entry = ContradictionEntry {
            id: "contra_001".into(),
            origin: ContradictionOrigin::RuleConflict,
            tag: Some("risk".into()),
            document_a: "doc_000".into(),
            document_b: Some("doc_003".into()),
            statement_a: "average down".into(),
            statement_b: "average down".into(),
            resolution_status: ResolutionStatus::Unresolved,
        };
        let ids: BTreeSet<String> = ["doc_000".to_string()].into_iter().collect();
        assert!(!entry.within(&ids));

        let ids: BTreeSet<String> = ["doc_000", "doc_003"].iter().map(|s| s.to_string()).collect();
        assert!(entry.within(&ids));
    }
}
