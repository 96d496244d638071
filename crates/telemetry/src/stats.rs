use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset};

use crate::event::{EventKind, Record};

/// Aggregated counts over a slice of the telemetry log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    pub matches_by_skill: BTreeMap<String, u64>,
    pub matches_by_insert: BTreeMap<String, u64>,
    pub skips_by_insert: BTreeMap<String, u64>,
    pub no_match_by_skill: BTreeMap<String, u64>,
    pub completions_by_skill: BTreeMap<String, u64>,
    pub total: u64,
}

/// Read every well-formed record from the log. Malformed lines (including a
/// truncated final line from a killed writer) and unknown event kinds are
/// skipped; a missing file reads as empty.
pub fn read_records(path: &Path) -> Vec<Record> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| serde_json::from_str::<Record>(line).ok())
        .collect()
}

/// Count events, optionally restricted to one session or to records at or
/// after `since`.
pub fn aggregate(
    records: &[Record],
    session: Option<u32>,
    since: Option<DateTime<FixedOffset>>,
) -> Aggregates {
    let mut agg = Aggregates::default();
    for record in records {
        if session.is_some_and(|s| record.session != s) {
            continue;
        }
        if let Some(cutoff) = since {
            match DateTime::parse_from_rfc3339(&record.ts) {
                Ok(ts) if ts >= cutoff => {}
                _ => continue,
            }
        }
        agg.total += 1;
        match &record.kind {
            EventKind::Match { skill, insert, .. } => {
                *agg.matches_by_skill.entry(skill.clone()).or_default() += 1;
                *agg.matches_by_insert.entry(insert.clone()).or_default() += 1;
            }
            EventKind::ConditionSkip { insert, .. } => {
                *agg.skips_by_insert.entry(insert.clone()).or_default() += 1;
            }
            EventKind::NoMatch { skill, .. } => {
                *agg.no_match_by_skill.entry(skill.clone()).or_default() += 1;
            }
            EventKind::SkillComplete { skill } => {
                *agg.completions_by_skill.entry(skill.clone()).or_default() += 1;
            }
        }
    }
    agg
}

/// Compact human-readable block used by the `session-stats` dynamic handler.
/// Empty when the log holds nothing, so the resolver falls back to static text.
pub fn render_session_stats(agg: &Aggregates) -> String {
    if agg.total == 0 {
        return String::new();
    }
    let mut out = String::from("## Session stats\n");
    if !agg.matches_by_skill.is_empty() {
        out.push_str(&format!("Matches: {}\n", counts(&agg.matches_by_skill)));
    }
    if !agg.skips_by_insert.is_empty() {
        out.push_str(&format!(
            "Condition skips: {}\n",
            counts(&agg.skips_by_insert)
        ));
    }
    if !agg.no_match_by_skill.is_empty() {
        out.push_str(&format!(
            "No coverage: {}\n",
            counts(&agg.no_match_by_skill)
        ));
    }
    if !agg.completions_by_skill.is_empty() {
        out.push_str(&format!(
            "Completions: {}\n",
            counts(&agg.completions_by_skill)
        ));
    }
    out
}

fn counts(map: &BTreeMap<String, u64>) -> String {
    map.iter()
        .map(|(name, n)| format!("{} ×{}", name, n))
        .collect::<Vec<_>>()
        .join(", ")
}
