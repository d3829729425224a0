//! Machine-readable tables: work-level CSV, vigilance CSV, stats JSON.

use crate::models::{CorpusStatistics, VigilanceOutcomeRow, WorkRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Column order of the work-level evidence map.
pub const WORK_MAP_COLUMNS: [&str; 23] = [
    "short_id",
    "eligibility_tier",
    "publication_year",
    "citation",
    "doi",
    "primary_intervention_category",
    "intervention_categories",
    "primary_setting",
    "settings",
    "n_total",
    "exposure_days_min",
    "exposure_days_max",
    "outcome_domains",
    "has_vigilance_outcome",
    "vigilance_effect_summary",
    "habituation_signal_any",
    "low_baseline_arousal_class",
    "repeated_use_class",
    "habituation_class",
    "rob_overall",
    "rob_tool",
    "abstract_only_flag",
    "notes",
];

/// Column order of the vigilance outcome ledger.
pub const VIGILANCE_COLUMNS: [&str; 13] = [
    "short_id",
    "eligibility_tier",
    "citation",
    "publication_year",
    "primary_intervention_category",
    "exposure_duration_days",
    "outcome_measure",
    "outcome_timepoint",
    "effect_direction",
    "effect_size_reported",
    "habituation_or_tolerance_signal",
    "rob_overall",
    "abstract_only_flag",
];

/// Write `rows` as CSV with an explicit header, so empty tables still
/// carry their columns.
fn write_csv<W: Write, T: Serialize>(writer: W, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    wtr.write_record(columns)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;

    Ok(())
}

/// Render the work-level evidence map as CSV text.
pub fn work_map_csv(works: &[WorkRecord]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, &WORK_MAP_COLUMNS, works)?;
    Ok(String::from_utf8(buf)?)
}

/// Render the vigilance outcome ledger as CSV text.
pub fn vigilance_csv(rows: &[VigilanceOutcomeRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, &VIGILANCE_COLUMNS, rows)?;
    Ok(String::from_utf8(buf)?)
}

/// Render the statistics snapshot as pretty JSON with sorted keys.
pub fn stats_json(stats: &CorpusStatistics) -> Result<String> {
    // serde_json::Value maps are ordered, which sorts the top-level keys too.
    let value = serde_json::to_value(stats)?;
    serde_json::to_string_pretty(&value).map_err(Into::into)
}

/// Write text to `path`, naming the file in any error.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VigilanceSummary;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn work(id: &str) -> WorkRecord {
        WorkRecord {
            short_id: id.to_string(),
            eligibility_tier: "T1_core".to_string(),
            publication_year: "2018".to_string(),
            citation: "Doe, J. (2018). Light, sleep & shifts".to_string(),
            doi: "10.1000/x".to_string(),
            primary_intervention_category: "light".to_string(),
            intervention_categories: "light; sleep_timing".to_string(),
            primary_setting: "field".to_string(),
            settings: "field".to_string(),
            n_total: "24".to_string(),
            exposure_days_min: Some(7.0),
            exposure_days_max: Some(28.0),
            outcome_domains: "sleepiness; vigilance".to_string(),
            has_vigilance_outcome: true,
            vigilance_effect_summary: VigilanceSummary::Improves,
            habituation_signal_any: false,
            low_baseline_arousal_class: "proxy".to_string(),
            repeated_use_class: "weeks".to_string(),
            habituation_class: "not_tested".to_string(),
            rob_overall: "some_concerns".to_string(),
            rob_tool: "RoB2".to_string(),
            abstract_only_flag: false,
            notes: String::new(),
        }
    }

    #[test]
    fn test_work_map_header_and_values() {
        let mut no_duration = work("S02");
        no_duration.exposure_days_min = None;
        no_duration.exposure_days_max = None;
        no_duration.vigilance_effect_summary = VigilanceSummary::NoVigilance;
        no_duration.has_vigilance_outcome = false;

        let csv_text = work_map_csv(&[work("S01"), no_duration]).unwrap();
        let mut lines = csv_text.lines();

        assert_eq!(lines.next().unwrap(), WORK_MAP_COLUMNS.join(","));
        let first = lines.next().unwrap();
        assert!(first.starts_with("S01,T1_core,2018,\"Doe, J. (2018). Light, sleep & shifts\""));
        assert!(first.contains(",7,28,"));
        assert!(first.contains(",yes,improves,no,"));
        let second = lines.next().unwrap();
        assert!(second.contains(",24,,,sleepiness; vigilance,no,no_vigilance,"));
    }

    #[test]
    fn test_fractional_durations_keep_their_fraction() {
        let mut half_days = work("S03");
        half_days.exposure_days_min = Some(0.5);
        half_days.exposure_days_max = Some(3.5);

        let csv_text = work_map_csv(&[half_days]).unwrap();
        assert!(csv_text.contains(",0.5,3.5,"));
    }

    #[test]
    fn test_work_map_reads_back() {
        let works = vec![work("S01"), work("S02")];
        let csv_text = work_map_csv(&works).unwrap();

        let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
        let parsed: Vec<WorkRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed, works);
    }

    #[test]
    fn test_empty_tables_keep_headers() {
        let csv_text = vigilance_csv(&[]).unwrap();
        assert_eq!(csv_text, format!("{}\n", VIGILANCE_COLUMNS.join(",")));
    }

    #[test]
    fn test_stats_json_sorted_top_level() {
        let stats = CorpusStatistics {
            generated_utc: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            locked_question: "Q".to_string(),
            n_unique_works: 1,
            n_outcome_rows: 2,
            works_by_tier: BTreeMap::from([("T1_core".to_string(), 1)]),
            works_by_primary_intervention_category: BTreeMap::new(),
            works_with_vigilance_outcomes: 1,
            vigilance_effect_summary_counts: BTreeMap::new(),
            habituation_signal_any_counts: BTreeMap::new(),
            risk_of_bias_overall_counts: BTreeMap::new(),
        };

        let json = stats_json(&stats).unwrap();
        let generated = json.find("\"generated_utc\"").unwrap();
        let habituation = json.find("\"habituation_signal_any_counts\"").unwrap();
        let works_by_tier = json.find("\"works_by_tier\"").unwrap();
        assert!(generated < habituation && habituation < works_by_tier);
        assert!(json.contains("2026-03-01T12:00:00Z"));
    }
}
