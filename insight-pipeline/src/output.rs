//! Report output
//!
//! Writes a [`FinalReport`] as pretty JSON (`<run_id>.json`) and as a
//! markdown summary (`<run_id>.md`) into the output directory.

use crate::models::{CheckOutcome, FinalReport, ResolutionStatus, RuleKind, SynthesisChapter};
use insight_common::Result;
use std::path::{Path, PathBuf};

/// Concepts listed in the markdown pattern section
const TOP_CONCEPTS: usize = 10;

/// Evidence excerpts shown per principle
const EVIDENCE_SHOWN: usize = 3;

/// Write both renderings; returns `(json_path, markdown_path)`
pub fn write_report(report: &FinalReport, output_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    std::fs::create_dir_all(output_dir)?;

    let json_path = output_dir.join(format!("{}.json", report.run_id));
    std::fs::write(&json_path, serde_json::to_string_pretty(report)?)?;

    let markdown_path = output_dir.join(format!("{}.md", report.run_id));
    std::fs::write(&markdown_path, render_markdown(report))?;

    tracing::info!(
        json = %json_path.display(),
        markdown = %markdown_path.display(),
        "Report written"
    );
    Ok((json_path, markdown_path))
}

fn resolution_label(status: ResolutionStatus) -> &'static str {
    match status {
        ResolutionStatus::Unresolved => "unresolved",
        ResolutionStatus::PartiallyResolved => "partially resolved",
        ResolutionStatus::Resolved => "resolved",
    }
}

fn outcome_label(outcome: CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Pass => "pass",
        CheckOutcome::Warn => "warn",
        CheckOutcome::Fail => "FAIL",
    }
}

/// Render the markdown summary
pub fn render_markdown(report: &FinalReport) -> String {
    let meta = &report.run_metadata;
    let mut out = String::new();

    out.push_str("# Thematic Insight Extraction Report\n\n");
    out.push_str(&format!("**Run:** `{}`\n\n", report.run_id));

    // Overview
    out.push_str("## Overview\n\n");
    out.push_str(&format!("- **Total Documents Analyzed:** {}\n", meta.document_count));
    out.push_str(&format!("- **Failed Analyses:** {}\n", meta.failed_document_count));
    out.push_str(&format!("- **Themes Identified:** {}\n", meta.theme_count));
    out.push_str(&format!("- **Orphaned Documents:** {}\n", meta.orphan_count));
    out.push_str(&format!("- **Chapters:** {}\n", meta.chapter_count));
    out.push_str(&format!("- **Escalated for Review:** {}\n", meta.escalated_count));
    if let Some(stage) = meta.resumed_from {
        out.push_str(&format!("- **Resumed After:** {}\n", stage));
    }
    out.push_str("\n---\n\n");

    // Chapters (amended version when validation changed one)
    out.push_str("## Synthesis by Theme\n\n");
    for chapter in &report.chapters {
        let shown = report
            .amended_chapters
            .iter()
            .find(|c| c.theme_id == chapter.theme_id)
            .unwrap_or(chapter);
        write_chapter(&mut out, shown);
    }

    // Validation
    out.push_str("## Validation Summary\n\n");
    for validation in &report.validations {
        out.push_str(&format!(
            "### {} (quality {:.2}{})\n\n",
            validation.theme_id,
            validation.quality_score,
            if validation.escalate { ", escalated" } else { "" }
        ));
        for (name, check) in &validation.checks {
            out.push_str(&format!(
                "- **{}:** {} ({})\n",
                name,
                outcome_label(check.outcome),
                check.reason
            ));
        }
        if !validation.red_flags.is_empty() {
            out.push_str("\n*Red flags:*\n");
            for flag in &validation.red_flags {
                out.push_str(&format!("- {}\n", flag));
            }
        }
        out.push('\n');
    }
    out.push_str("---\n\n");

    // Degraded items
    let manifest = &report.manifest;
    out.push_str("## Degraded Items\n\n");
    if manifest.is_clean() {
        out.push_str("None.\n\n");
    } else {
        let sections = [
            ("Failed analyses", &manifest.failed_analyses),
            ("Fallback analyses", &manifest.fallback_analyses),
            ("Recognizer failures", &manifest.recognizer_failures),
            ("Pending review", &manifest.pending_review),
            ("Unvalidated chapters", &manifest.unvalidated_chapters),
        ];
        for (title, items) in sections.iter().filter(|(_, items)| !items.is_empty()) {
            out.push_str(&format!("### {}\n\n", title));
            for item in items.iter() {
                out.push_str(&format!("- `{}`: {}\n", item.item_id, item.reason));
            }
            out.push('\n');
        }
        if manifest.all_orphaned {
            out.push_str(
                "- No theme reached the membership threshold; every document is orphaned\n\n",
            );
        }
    }
    out.push_str("---\n\n");

    // Patterns
    out.push_str("## Patterns\n\n");
    match &report.pattern_report.frequency {
        Some(frequency) => {
            out.push_str("### Top Concepts\n\n");
            for stat in frequency.ranked.iter().take(TOP_CONCEPTS) {
                out.push_str(&format!("- {} ({} documents)\n", stat.concept, stat.count));
            }
            out.push('\n');
        }
        None => out.push_str("Frequency analysis unavailable.\n\n"),
    }
    if let Some(contradictions) = &report.pattern_report.contradictions {
        out.push_str(&format!(
            "- **Contradictions detected:** {}\n\n",
            contradictions.entries.len()
        ));
    }

    out
}

fn write_chapter(out: &mut String, chapter: &SynthesisChapter) {
    out.push_str(&format!("### {}\n\n", chapter.theme_name));
    if chapter.version > 1 {
        out.push_str(&format!("*Revised after validation (v{})*\n\n", chapter.version));
    }

    out.push_str("#### Executive Summary\n\n");
    out.push_str(&format!("{}\n\n", chapter.executive_summary));

    if !chapter.core_principles.is_empty() {
        out.push_str("#### Core Principles\n\n");
        for (i, principle) in chapter.core_principles.iter().enumerate() {
            out.push_str(&format!("**{}. {}**\n\n", i + 1, principle.statement));
            let excerpts: Vec<_> = principle
                .evidence
                .iter()
                .filter(|e| !e.excerpt.is_empty())
                .take(EVIDENCE_SHOWN)
                .collect();
            if !excerpts.is_empty() {
                out.push_str("*Evidence:*\n");
                for evidence in excerpts {
                    out.push_str(&format!("- {} (`{}`)\n", evidence.excerpt, evidence.document_id));
                }
                out.push('\n');
            }
            out.push_str(&format!("*Confidence:* {:.2}\n\n", principle.confidence));
        }
    }

    for (kind, title) in [(RuleKind::Do, "DO"), (RuleKind::Dont, "DON'T")] {
        let rules: Vec<_> = chapter.actionable_rules.iter().filter(|r| r.kind == kind).collect();
        if !rules.is_empty() {
            out.push_str(&format!("#### {}:\n\n", title));
            for rule in rules {
                out.push_str(&format!("- {}\n", rule.text));
            }
            out.push('\n');
        }
    }

    if !chapter.contradictions.is_empty() {
        out.push_str("#### Contradictions Identified\n\n");
        for contradiction in &chapter.contradictions {
            out.push_str(&format!("- **{}**\n", contradiction.description));
            out.push_str(&format!(
                "  - Status: {}\n",
                resolution_label(contradiction.resolution_status)
            ));
            if let Some(note) = &contradiction.resolution_note {
                out.push_str(&format!("  - Resolution: {}\n", note));
            }
        }
        out.push('\n');
    }

    if !chapter.key_quotes.is_empty() {
        out.push_str("#### Key Quotes\n\n");
        for quote in &chapter.key_quotes {
            out.push_str(&format!("> {}\n\n", quote));
        }
    }

    if !chapter.open_questions.is_empty() {
        out.push_str("#### Open Questions\n\n");
        for question in &chapter.open_questions {
            out.push_str(&format!("- {}\n", question));
        }
        out.push('\n');
    }

    out.push_str("---\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DegradationManifest, DegradedItem, PatternReport, RunMetadata};
    use crate::workflow::state::Stage;
    use chrono::Utc;
    use tempfile::TempDir;

    fn empty_report(manifest: DegradationManifest) -> FinalReport {
        let now = Utc::now();
        FinalReport {
            run_id: "run-out".to_string(),
            documents: Vec::new(),
            pattern_report: PatternReport::default(),
            themes: Vec::new(),
            orphans: Vec::new(),
            chapters: Vec::new(),
            amended_chapters: Vec::new(),
            validations: Vec::new(),
            manifest,
            run_metadata: RunMetadata {
                run_id: "run-out".to_string(),
                schema_version: 1,
                started_at: now,
                completed_at: now,
                resumed_from: Some(Stage::Patterns),
                document_count: 0,
                failed_document_count: 0,
                theme_count: 0,
                orphan_count: 0,
                chapter_count: 0,
                escalated_count: 0,
                transitions: Vec::new(),
            },
        }
    }

    #[test]
    fn test_clean_run_lists_no_degraded_items() {
        let markdown = render_markdown(&empty_report(DegradationManifest::default()));

        assert!(markdown.contains("## Degraded Items\n\nNone."));
        assert!(markdown.contains("Frequency analysis unavailable."));
        assert!(markdown.contains("**Resumed After:**"));
    }

    #[test]
    fn test_degraded_items_are_grouped() {
        let manifest = DegradationManifest {
            failed_analyses: vec![DegradedItem {
                item_id: "doc_007".to_string(),
                reason: "timed out".to_string(),
            }],
            all_orphaned: true,
            ..Default::default()
        };
        let markdown = render_markdown(&empty_report(manifest));

        assert!(markdown.contains("### Failed analyses"));
        assert!(markdown.contains("- `doc_007`: timed out"));
        assert!(markdown.contains("every document is orphaned"));
        assert!(!markdown.contains("### Pending review"));
    }

    #[test]
    fn test_write_report_creates_missing_output_dir() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("reports").join("nested");

        let report = empty_report(DegradationManifest::default());
        let (json, markdown) = write_report(&report, &target).unwrap();

        assert_eq!(json.file_name().unwrap(), "run-out.json");
        assert_eq!(markdown.file_name().unwrap(), "run-out.md");
        assert!(json.exists() && markdown.exists());
    }
}
