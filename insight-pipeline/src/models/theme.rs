//! Theme models (stage 2 output)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Cluster of documents sharing a conceptual thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    /// `theme_001`, `theme_002`, ... by descending size
    pub id: String,
    pub name: String,
    pub description: String,
    /// Primary members; never empty
    pub document_ids: BTreeSet<String>,
    pub key_concepts: Vec<String>,
    /// 0-10
    pub importance_score: f64,
    /// Non-member documents that share this theme's key concepts
    pub cross_references: BTreeSet<String>,
    pub related_theme_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orphan {
    pub document_id: String,
    pub reason: String,
}

/// Concept shared by more than one theme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossThemePattern {
    pub concept: String,
    pub theme_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeStructure {
    pub themes: Vec<Theme>,
    /// Sorted by document id
    pub orphans: Vec<Orphan>,
    pub cross_theme_patterns: Vec<CrossThemePattern>,
}

impl ThemeStructure {
    /// No theme survived the membership threshold
    pub fn all_orphaned(&self) -> bool {
        self.themes.is_empty() && !self.orphans.is_empty()
    }

    pub fn theme(&self, theme_id: &str) -> Option<&Theme> {
        self.themes.iter().find(|t| t.id == theme_id)
    }

    /// Primary theme of a document
    pub fn theme_of(&self, document_id: &str) -> Option<&Theme> {
        self.themes
            .iter()
            .find(|t| t.document_ids.contains(document_id))
    }
}
