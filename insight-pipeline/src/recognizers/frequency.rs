//! Frequency recognizer
//!
//! Concepts are a document's topical tags plus the significant words of its
//! core principle and rules. A concept's count is the number of distinct
//! documents mentioning it.
//!
//! # Significance
//! - **core_belief:** count ≥ `notable_min` and count/corpus ≥ `core_belief_ratio`
//! - **notable:** count ≥ `notable_min`
//! - **incidental:** everything else

use super::usable;
use crate::error::RecognizerError;
use crate::models::{AnalyzedDocument, ConceptStat, Facet, FrequencyFacet, Significance};
use crate::types::PatternRecognizer;
use insight_common::config::FrequencySettings;
use std::collections::{BTreeMap, BTreeSet};

/// Words too common to be concepts
const STOP_WORDS: &[&str] = &[
    "about", "after", "again", "always", "because", "before", "being", "could", "didn't",
    "doesn't", "don't", "every", "first", "going", "never", "other", "really", "should",
    "since", "something", "their", "there", "these", "thing", "things", "think", "those",
    "through", "today", "under", "until", "where", "which", "while", "would",
];

/// Minimum length (exclusive) of a significant word
const MIN_WORD_CHARS: usize = 4;

pub struct FrequencyRecognizer {
    settings: FrequencySettings,
}

impl FrequencyRecognizer {
    pub fn new(settings: FrequencySettings) -> Self {
        Self { settings }
    }

    fn classify(&self, count: usize, corpus_size: usize) -> Significance {
        let ratio = if corpus_size == 0 {
            0.0
        } else {
            count as f64 / corpus_size as f64
        };

        if count >= self.settings.notable_min && ratio >= self.settings.core_belief_ratio {
            Significance::CoreBelief
        } else if count >= self.settings.notable_min {
            Significance::Notable
        } else {
            Significance::Incidental
        }
    }
}

/// Concepts one document mentions (each once)
pub fn document_concepts(document: &AnalyzedDocument) -> BTreeSet<String> {
    let mut concepts: BTreeSet<String> = document.topical_tags().cloned().collect();

    let texts = std::iter::once(&document.core_principle)
        .chain(document.rules.do_rules.iter())
        .chain(document.rules.dont.iter());
    for text in texts {
        concepts.extend(significant_words(text));
    }

    concepts
}

/// Lowercased words longer than four characters that are not stop words
pub fn significant_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '-'))
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '-').to_lowercase())
        .filter(|w| w.chars().count() > MIN_WORD_CHARS)
        .filter(|w| !w.chars().all(|c| c.is_numeric()))
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

fn bucket(count: usize) -> &'static str {
    match count {
        0..=5 => "1-5",
        6..=10 => "6-10",
        11..=20 => "11-20",
        _ => "20+",
    }
}

impl PatternRecognizer for FrequencyRecognizer {
    fn name(&self) -> &'static str {
        "frequency"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let corpus: Vec<&AnalyzedDocument> = usable(documents).collect();
        if corpus.is_empty() {
            return Err(RecognizerError::InsufficientData(
                "no successfully analyzed documents".to_string(),
            ));
        }

        let mut mentions: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for document in &corpus {
            for concept in document_concepts(document) {
                mentions
                    .entry(concept)
                    .or_default()
                    .insert(document.document_id.clone());
            }
        }

        let corpus_size = corpus.len();
        let mut ranked: Vec<ConceptStat> = mentions
            .into_iter()
            .map(|(concept, document_ids)| {
                let count = document_ids.len();
                ConceptStat {
                    significance: self.classify(count, corpus_size),
                    concept,
                    count,
                    document_ids,
                }
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.concept.cmp(&b.concept)));

        let mut distribution: BTreeMap<String, usize> = ["1-5", "6-10", "11-20", "20+"]
            .iter()
            .map(|b| (b.to_string(), 0))
            .collect();
        for stat in &ranked {
            *distribution.entry(bucket(stat.count).to_string()).or_default() += 1;
        }

        Ok(Facet::Frequency(FrequencyFacet {
            corpus_size,
            ranked,
            distribution,
        }))
    }
}
