//! Chronological evolution of a theme
//!
//! Dated members are bucketed by period. A document's stance is its net
//! rule endorsement `(do - dont) / (do + dont)`; a concept's stance in a
//! period is the mean stance of the period's documents tagged with it.
//! A stance shift is recorded whenever a concept's position (above
//! `+threshold`, below `-threshold`, or neutral) changes between two
//! consecutive periods in which it appears.

use crate::models::synthesis::{PeriodStance, StanceShift};
use crate::models::{AnalyzedDocument, Evolution};
use chrono::{DateTime, Datelike, Utc};
use insight_common::config::PeriodGranularity;
use std::collections::BTreeMap;

/// Bucket key for a timestamp; sorts chronologically as a string
pub fn period_key(at: &DateTime<Utc>, granularity: PeriodGranularity) -> String {
    match granularity {
        PeriodGranularity::Month => format!("{:04}-{:02}", at.year(), at.month()),
        PeriodGranularity::Quarter => format!("{:04}-Q{}", at.year(), (at.month() - 1) / 3 + 1),
        PeriodGranularity::Year => format!("{:04}", at.year()),
    }
}

/// Net endorsement of a document's rules in [-1, 1]
pub fn document_stance(document: &AnalyzedDocument) -> f64 {
    let dos = document.rules.do_rules.len() as f64;
    let donts = document.rules.dont.len() as f64;
    if dos + donts == 0.0 {
        0.0
    } else {
        (dos - donts) / (dos + donts)
    }
}

fn position(stance: f64, threshold: f64) -> i8 {
    if stance >= threshold {
        1
    } else if stance <= -threshold {
        -1
    } else {
        0
    }
}

/// Build the evolution of `members` over `concepts`
pub fn track(
    members: &[&AnalyzedDocument],
    concepts: &[String],
    granularity: PeriodGranularity,
    threshold: f64,
) -> Evolution {
    let mut buckets: BTreeMap<String, Vec<&AnalyzedDocument>> = BTreeMap::new();
    let mut undated = Vec::new();

    for member in members {
        match &member.created_at {
            Some(at) => buckets.entry(period_key(at, granularity)).or_default().push(*member),
            None => undated.push(member.document_id.clone()),
        }
    }

    let periods: Vec<PeriodStance> = buckets
        .into_iter()
        .map(|(period, docs)| {
            let mut stance = BTreeMap::new();
            for concept in concepts {
                let holders: Vec<f64> = docs
                    .iter()
                    .filter(|d| d.tags.contains(concept))
                    .map(|d| document_stance(d))
                    .collect();
                if !holders.is_empty() {
                    let mean = holders.iter().sum::<f64>() / holders.len() as f64;
                    stance.insert(concept.clone(), mean);
                }
            }
            let overall = if stance.is_empty() {
                0.0
            } else {
                stance.values().sum::<f64>() / stance.len() as f64
            };
            let mut document_ids: Vec<String> =
                docs.iter().map(|d| d.document_id.clone()).collect();
            document_ids.sort();

            PeriodStance {
                period,
                document_ids,
                stance,
                overall,
            }
        })
        .collect();

    let mut stance_shifts = Vec::new();
    for concept in concepts {
        let appearances: Vec<(&str, f64)> = periods
            .iter()
            .filter_map(|p| p.stance.get(concept).map(|s| (p.period.as_str(), *s)))
            .collect();
        for pair in appearances.windows(2) {
            let (from_period, from_stance) = pair[0];
            let (to_period, to_stance) = pair[1];
            if position(from_stance, threshold) != position(to_stance, threshold) {
                stance_shifts.push(StanceShift {
                    concept: concept.clone(),
                    from_period: from_period.to_string(),
                    to_period: to_period.to_string(),
                    from_stance,
                    to_stance,
                });
            }
        }
    }

    undated.sort();
    Evolution {
        periods,
        stance_shifts,
        undated,
    }
}

/// True when `overall` strictly increases or strictly decreases across every period
pub fn is_strictly_monotonic(evolution: &Evolution) -> bool {
    let values: Vec<f64> = evolution.periods.iter().map(|p| p.overall).collect();
    if values.len() < 2 {
        return false;
    }
    let rising = values.windows(2).all(|w| w[1] > w[0]);
    let falling = values.windows(2).all(|w| w[1] < w[0]);
    rising || falling
}
