//! Document ingestion
//!
//! Loads every `*.md` / `*.txt` file under a directory (recursively, in path
//! order) as a [`Document`]. Ids are assigned `doc_000`, `doc_001`, ... in
//! that order, so the same directory always yields the same ids.
//!
//! # Dates
//! A document is dated from, in order:
//! 1. a `YYYY-MM-DD` in the file name
//! 2. a `Date: YYYY-MM-DD` header line within the first lines of the text
//!
//! Undated documents are kept; they are simply absent from the timeline.

use crate::models::Document;
use chrono::{DateTime, NaiveDate, Utc};
use insight_common::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions read as documents
const EXTENSIONS: [&str; 2] = ["md", "txt"];

/// Lines searched for a `Date:` header
const HEADER_LINES: usize = 10;

pub struct DocumentLoader {
    date_pattern: Regex,
    header_pattern: Regex,
}

impl DocumentLoader {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Internal(format!("Invalid date pattern: {}", e)))
        };
        Ok(Self {
            date_pattern: compile(r"(\d{4})-(\d{2})-(\d{2})")?,
            header_pattern: compile(r"(?i)^\s*date:\s*(\d{4})-(\d{2})-(\d{2})")?,
        })
    }

    /// Load every document under `root`
    pub fn load_dir(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.exists() {
            return Err(Error::NotFound(format!("Input directory {}", root.display())));
        }
        if !root.is_dir() {
            return Err(Error::InvalidInput(format!("Not a directory: {}", root.display())));
        }

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            match entry {
                Ok(entry)
                    if entry.file_type().is_file() && has_document_extension(entry.path()) =>
                {
                    paths.push(entry.into_path());
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable entry"),
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path)?;
            if text.trim().is_empty() {
                tracing::debug!(path = %path.display(), "Skipping empty file");
                continue;
            }
            let id = format!("doc_{:03}", documents.len());
            let mut document = Document::new(id, text, path.clone());
            if let Some(created_at) = self.date_of(&path, &document.raw_text) {
                document = document.with_created_at(created_at);
            }
            documents.push(document);
        }

        tracing::info!(
            root = %root.display(),
            documents = documents.len(),
            dated = documents.iter().filter(|d| d.created_at.is_some()).count(),
            "Documents loaded"
        );
        Ok(documents)
    }

    fn date_of(&self, path: &Path, text: &str) -> Option<DateTime<Utc>> {
        let from_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| self.date_pattern.captures(name))
            .and_then(|caps| date_from(&caps));

        from_name.or_else(|| {
            text.lines()
                .take(HEADER_LINES)
                .find_map(|line| self.header_pattern.captures(line))
                .and_then(|caps| date_from(&caps))
        })
    }
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn date_from(caps: &regex::Captures<'_>) -> Option<DateTime<Utc>> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_loads_documents_in_path_order() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "b.md", "Second");
        write(dir.path(), "a.txt", "First");
        write(dir.path(), "c.json", "{}");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(&dir.path().join("nested"), "d.md", "Third");

        let docs = DocumentLoader::new().unwrap().load_dir(dir.path()).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.raw_text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second", "Third"]);
        assert_eq!(docs[2].id, "doc_002");
    }

    #[test]
    fn test_dates_from_name_then_header() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "2023-03-14-journal.md", "Date: 2020-01-01\nHeld the position");
        write(dir.path(), "notes.md", "Title\nDate: 2023-05-02\nWaited");
        write(dir.path(), "undated.md", "No date here");

        let docs = DocumentLoader::new().unwrap().load_dir(dir.path()).unwrap();
        let dates: Vec<Option<String>> = docs
            .iter()
            .map(|d| d.created_at.map(|t| t.format("%Y-%m-%d").to_string()))
            .collect();
        assert_eq!(
            dates,
            vec![Some("2023-03-14".to_string()), Some("2023-05-02".to_string()), None]
        );
    }

    #[test]
    fn test_invalid_date_is_ignored() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "2023-13-40.md", "Bad month");

        let docs = DocumentLoader::new().unwrap().load_dir(dir.path()).unwrap();
        assert!(docs[0].created_at.is_none());
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let result = DocumentLoader::new()
            .unwrap()
            .load_dir(Path::new("/nonexistent/insight-input"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
