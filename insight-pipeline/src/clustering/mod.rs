//! Stage 2: thematic clustering
//!
//! Deterministic average-linkage agglomeration over the analyzed documents,
//! sorted by id so input order never changes membership.
//!
//! # Algorithm
//! 1. Every usable document starts as its own cluster
//! 2. Repeatedly merge the pair with the highest average linkage (ties go
//!    to the pair with the smallest document ids)
//! 3. Stop when the merged cluster's mean intra-cluster similarity would
//!    fall below `merge_threshold`, or once `target_clusters` is reached
//! 4. Clusters smaller than `max(min_members, 3)` are dissolved into orphans
//!
//! No surviving theme is a valid outcome ("all documents orphaned").

pub mod similarity;

pub use similarity::SimilarityMatrix;

use crate::models::{
    AnalyzedDocument, CrossThemePattern, Orphan, PatternReport, Theme, ThemeStructure,
};
use insight_common::config::ClusteringSettings;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Absolute floor on theme membership
pub const MIN_THEME_MEMBERS: usize = 3;

pub const REASON_NO_THEME: &str = "No matching theme found";
pub const REASON_ANALYSIS_FAILED: &str = "Analysis failed; excluded from clustering";

pub struct ThematicClusterer {
    settings: ClusteringSettings,
}

impl ThematicClusterer {
    pub fn new(settings: ClusteringSettings) -> Self {
        Self { settings }
    }

    fn min_members(&self) -> usize {
        self.settings.min_members.max(MIN_THEME_MEMBERS)
    }

    /// Group analyzed documents into themes
    pub fn cluster(
        &self,
        documents: &[AnalyzedDocument],
        report: &PatternReport,
    ) -> ThemeStructure {
        let mut sorted: Vec<&AnalyzedDocument> = documents.iter().collect();
        sorted.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let mut orphans: Vec<Orphan> = Vec::new();
        let mut candidates: Vec<&AnalyzedDocument> = Vec::new();
        for document in sorted {
            if document.is_failed() {
                orphans.push(Orphan {
                    document_id: document.document_id.clone(),
                    reason: REASON_ANALYSIS_FAILED.to_string(),
                });
            } else {
                candidates.push(document);
            }
        }

        let matrix =
            SimilarityMatrix::build(&candidates, report.cooccurrence.as_ref(), &self.settings);
        let clusters = self.agglomerate(&matrix);

        let mut kept: Vec<Vec<&AnalyzedDocument>> = Vec::new();
        for cluster in clusters {
            let members: Vec<&AnalyzedDocument> = cluster.iter().map(|&i| candidates[i]).collect();
            if members.len() >= self.min_members() {
                kept.push(members);
            } else {
                orphans.extend(members.iter().map(|d| Orphan {
                    document_id: d.document_id.clone(),
                    reason: REASON_NO_THEME.to_string(),
                }));
            }
        }
        orphans.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        // Largest first; members are id-sorted so the first id breaks ties
        kept.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| a[0].document_id.cmp(&b[0].document_id))
        });

        let total = documents.len();
        let mut themes: Vec<Theme> = kept
            .iter()
            .enumerate()
            .map(|(n, members)| self.build_theme(format!("theme_{:03}", n + 1), members, total))
            .collect();

        link_themes(&mut themes, &candidates);
        let cross_theme_patterns = cross_theme_patterns(&themes);

        info!(
            themes = themes.len(),
            orphans = orphans.len(),
            "Clustering complete"
        );

        ThemeStructure {
            themes,
            orphans,
            cross_theme_patterns,
        }
    }

    /// Average-linkage merging; returns clusters of matrix indices
    fn agglomerate(&self, matrix: &SimilarityMatrix) -> Vec<Vec<usize>> {
        let mut clusters: Vec<Vec<usize>> = (0..matrix.len()).map(|i| vec![i]).collect();
        let target = self.settings.target_clusters;

        while clusters.len() > 1 {
            if let Some(target) = target {
                if clusters.len() <= target {
                    break;
                }
            }

            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..clusters.len() {
                for j in (i + 1)..clusters.len() {
                    let score = matrix.linkage(&clusters[i], &clusters[j]);
                    if best.map(|(_, _, s)| score > s).unwrap_or(true) {
                        best = Some((i, j, score));
                    }
                }
            }
            let Some((i, j, score)) = best else {
                break;
            };

            let mut merged = clusters[i].clone();
            merged.extend(clusters[j].iter().copied());
            merged.sort_unstable();

            if target.is_none() && matrix.mean_intra(&merged) < self.settings.merge_threshold {
                debug!(linkage = score, "Next merge below threshold, stopping");
                break;
            }

            clusters.remove(j);
            clusters[i] = merged;
        }

        // Clusters stay ordered by their smallest index
        clusters.sort_by_key(|c| c.first().copied().unwrap_or(usize::MAX));
        clusters
    }

    fn build_theme(&self, id: String, members: &[&AnalyzedDocument], total: usize) -> Theme {
        let mut tag_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for member in members {
            for tag in member.topical_tags() {
                *tag_counts.entry(tag.as_str()).or_default() += 1;
            }
        }
        let mut ranked: Vec<(&str, usize)> = tag_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let key_concepts: Vec<String> = ranked
            .iter()
            .take(self.settings.max_key_concepts.max(1))
            .map(|(tag, _)| tag.to_string())
            .collect();

        let name = key_concepts
            .first()
            .map(|c| theme_name(c))
            .unwrap_or_else(|| "Untitled Theme".to_string());
        let description = format!(
            "Theme covering {} documents related to {}",
            members.len(),
            if key_concepts.is_empty() {
                "no shared tags".to_string()
            } else {
                key_concepts.join(", ")
            }
        );

        Theme {
            id,
            name,
            description,
            document_ids: members.iter().map(|d| d.document_id.clone()).collect(),
            key_concepts,
            importance_score: importance(members.len(), total),
            cross_references: BTreeSet::new(),
            related_theme_ids: Vec::new(),
        }
    }
}

/// Human-readable name for a theme's leading concept
pub fn theme_name(concept: &str) -> String {
    match concept {
        "psychology" => "Investment Psychology & Mental States".to_string(),
        "risk-management" => "Risk Management & Position Sizing".to_string(),
        "technical-analysis" => "Technical Analysis Approach".to_string(),
        "fundamental-analysis" => "Fundamental Analysis Framework".to_string(),
        "post-mortem" => "Learning from Mistakes".to_string(),
        "strategy" => "Investment Strategy & Philosophy".to_string(),
        "discipline" => "Discipline & Process".to_string(),
        other => other
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Share of the corpus scaled to 0-10
pub fn importance(members: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (members as f64 / total as f64 * 30.0).min(10.0)
}

/// Fill cross references (non-members sharing a key concept) and related themes
fn link_themes(themes: &mut [Theme], candidates: &[&AnalyzedDocument]) {
    let concept_sets: Vec<BTreeSet<String>> = themes
        .iter()
        .map(|t| t.key_concepts.iter().cloned().collect())
        .collect();

    for (idx, theme) in themes.iter_mut().enumerate() {
        let concepts = &concept_sets[idx];

        theme.cross_references = candidates
            .iter()
            .filter(|d| !theme.document_ids.contains(&d.document_id))
            .filter(|d| d.topical_tags().any(|t| concepts.contains(t)))
            .map(|d| d.document_id.clone())
            .collect();

        theme.related_theme_ids = concept_sets
            .iter()
            .enumerate()
            .filter(|(other, set)| *other != idx && !set.is_disjoint(concepts))
            .map(|(other, _)| format!("theme_{:03}", other + 1))
            .collect();
    }
}

fn cross_theme_patterns(themes: &[Theme]) -> Vec<CrossThemePattern> {
    let mut by_concept: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for theme in themes {
        for concept in &theme.key_concepts {
            by_concept
                .entry(concept.as_str())
                .or_default()
                .push(theme.id.clone());
        }
    }

    by_concept
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(concept, theme_ids)| CrossThemePattern {
            concept: concept.to_string(),
            theme_ids,
        })
        .collect()
}
