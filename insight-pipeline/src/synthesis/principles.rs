//! Principle extraction
//!
//! One candidate per concept group: member tags are grouped when they are
//! carried by exactly the same member documents. For a group supported by
//! `s` of `n` usable members, `c` of which take part in a contradiction on
//! one of the group's concepts:
//!
//! `confidence = (s / n) * (1 - 0.5 * c / s)`
//!
//! Candidates below the configured confidence are dropped.

use crate::models::{AnalyzedDocument, Contradiction, EvidenceRef, Principle};
use std::collections::{BTreeMap, BTreeSet};

/// Statement length cap (characters)
const MAX_STATEMENT_CHARS: usize = 200;

fn excerpt(document: &AnalyzedDocument) -> String {
    document
        .evidence
        .first()
        .or_else(|| Some(&document.core_principle).filter(|p| !p.is_empty()))
        .or_else(|| document.rules.do_rules.first())
        .or_else(|| document.rules.dont.first())
        .cloned()
        .unwrap_or_default()
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_STATEMENT_CHARS).collect()
}

/// Extract principles from usable theme members
pub fn extract(
    members: &[&AnalyzedDocument],
    contradictions: &[Contradiction],
    min_confidence: f64,
) -> Vec<Principle> {
    let total = members.len();
    if total == 0 {
        return Vec::new();
    }

    let mut support: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for member in members {
        for tag in member.topical_tags() {
            support
                .entry(tag.as_str())
                .or_default()
                .insert(member.document_id.as_str());
        }
    }

    // Identical support sets merge into one group
    let mut groups: BTreeMap<BTreeSet<&str>, Vec<&str>> = BTreeMap::new();
    for (concept, ids) in support {
        groups.entry(ids).or_default().push(concept);
    }

    let by_id: BTreeMap<&str, &AnalyzedDocument> =
        members.iter().map(|d| (d.document_id.as_str(), *d)).collect();

    let mut used_statements: BTreeSet<String> = BTreeSet::new();
    let mut candidates: Vec<(BTreeSet<&str>, Vec<&str>, f64)> = groups
        .into_iter()
        .map(|(ids, concepts)| {
            let contested: BTreeSet<&str> = contradictions
                .iter()
                .filter(|c| c.tag.as_deref().map(|t| concepts.contains(&t)).unwrap_or(false))
                .flat_map(|c| {
                    [
                        c.position_a.document_id.as_deref(),
                        c.position_b.document_id.as_deref(),
                    ]
                })
                .flatten()
                .filter(|id| ids.contains(id))
                .collect();
            let s = ids.len() as f64;
            let density = s / total as f64;
            let confidence = density * (1.0 - 0.5 * contested.len() as f64 / s);
            (ids, concepts, confidence)
        })
        .filter(|(_, _, confidence)| *confidence >= min_confidence)
        .collect();

    // Strongest first; concept names break ties
    candidates.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.1.cmp(&b.1)));

    candidates
        .into_iter()
        .map(|(ids, concepts, confidence)| {
            let supporters: Vec<&AnalyzedDocument> =
                ids.iter().filter_map(|id| by_id.get(id).copied()).collect();

            // Best-rated supporting principle, unless another principle already used it
            let mut ranked = supporters.clone();
            ranked.sort_by(|a, b| {
                b.quality_score
                    .total_cmp(&a.quality_score)
                    .then_with(|| a.document_id.cmp(&b.document_id))
            });
            let statement = ranked
                .iter()
                .map(|d| truncate(&d.core_principle))
                .find(|p| !p.is_empty() && !used_statements.contains(p))
                .unwrap_or_else(|| {
                    format!(
                        "{} recurs across {} of {} documents",
                        concepts.join(" & "),
                        ids.len(),
                        total
                    )
                });
            used_statements.insert(statement.clone());

            Principle {
                statement,
                concepts: concepts.iter().map(|c| c.to_string()).collect(),
                evidence: supporters
                    .iter()
                    .map(|d| EvidenceRef {
                        document_id: d.document_id.clone(),
                        excerpt: excerpt(d),
                    })
                    .collect(),
                confidence,
                implications: vec![format!("Based on {} documents", ids.len())],
            }
        })
        .collect()
}
