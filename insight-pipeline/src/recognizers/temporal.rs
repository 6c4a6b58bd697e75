//! Temporal recognizer
//!
//! Buckets dated documents by calendar month (`YYYY-MM`) and records which
//! concepts appear in each bucket, plus the first and last bucket each
//! concept was seen in. Undated documents are listed, not bucketed.

use super::frequency::document_concepts;
use super::usable;
use crate::error::RecognizerError;
use crate::models::patterns::PeriodConcepts;
use crate::models::{AnalyzedDocument, Facet, TemporalFacet};
use crate::types::PatternRecognizer;

pub struct TemporalRecognizer;

impl PatternRecognizer for TemporalRecognizer {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn analyze(&self, documents: &[AnalyzedDocument]) -> Result<Facet, RecognizerError> {
        let mut facet = TemporalFacet::default();

        for document in usable(documents) {
            let Some(created_at) = document.created_at else {
                facet.undated.insert(document.document_id.clone());
                continue;
            };

            let period = created_at.format("%Y-%m").to_string();
            let bucket: &mut PeriodConcepts = facet.periods.entry(period).or_default();
            bucket.document_ids.insert(document.document_id.clone());
            for concept in document_concepts(document) {
                *bucket.concepts.entry(concept).or_default() += 1;
            }
        }

        // Periods iterate chronologically, so the first hit is the earliest
        for (period, bucket) in &facet.periods {
            for concept in bucket.concepts.keys() {
                facet
                    .first_seen
                    .entry(concept.clone())
                    .or_insert_with(|| period.clone());
                facet.last_seen.insert(concept.clone(), period.clone());
            }
        }

        Ok(Facet::Temporal(facet))
    }
}
