//! Work-level aggregation.
//!
//! Joins the outcome, risk-of-bias and manifest streams on `short_id` and
//! collapses each study's outcome rows into a single [`WorkRecord`].

use super::classifier::vigilance_summary;
use super::reducers::{reduce_mode, reduce_numeric_range, reduce_unique_join};
use crate::error::{Result, SynthesisError};
use crate::models::{
    InputStream, ManifestRow, OutcomeRow, RiskOfBiasRow, SynthesisInput, WorkRecord,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

const ABSTRACT_ONLY_MARKER: &str = "abstract-only";

/// Options controlling aggregation policy.
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Fail on duplicate manifest / risk-of-bias identifiers instead of
    /// keeping the last row.
    pub strict_duplicates: bool,
}

/// Group outcome rows by trimmed study identifier, in ascending id order.
///
/// Rows with a blank identifier are dropped.
pub fn group_by_work(rows: &[OutcomeRow]) -> BTreeMap<&str, Vec<&OutcomeRow>> {
    let mut grouped: BTreeMap<&str, Vec<&OutcomeRow>> = BTreeMap::new();
    let mut dropped = 0usize;

    for row in rows {
        let id = row.short_id.trim();
        if id.is_empty() {
            dropped += 1;
            continue;
        }
        grouped.entry(id).or_default().push(row);
    }

    if dropped > 0 {
        debug!("Dropped {} outcome rows without a short_id", dropped);
    }

    grouped
}

/// Index one-row-per-work records by identifier.
///
/// Duplicates keep the last row (with a warning) unless `strict` is set.
fn index_by_id<'a, T>(
    rows: &'a [T],
    id_of: impl Fn(&T) -> &str,
    stream: InputStream,
    strict: bool,
) -> Result<HashMap<&'a str, &'a T>> {
    let mut index: HashMap<&'a str, &'a T> = HashMap::new();

    for row in rows {
        let id = id_of(row).trim();
        if id.is_empty() {
            continue;
        }
        if index.insert(id, row).is_some() {
            if strict {
                return Err(SynthesisError::DuplicateIdentifier {
                    stream,
                    short_id: id.to_string(),
                });
            }
            warn!("Duplicate short_id '{}' in {}; keeping the last row", id, stream);
        }
    }

    Ok(index)
}

/// Heuristic abstract-only detection over free text.
///
/// Matches the literal marker "abstract-only" in the citation or notes,
/// ignoring case. It is a text match, not a verified retrieval status.
pub fn detect_abstract_only(citation: &str, notes: &str) -> bool {
    citation.to_lowercase().contains(ABSTRACT_ONLY_MARKER)
        || notes.to_lowercase().contains(ABSTRACT_ONLY_MARKER)
}

/// Build one work record per distinct outcome-row identifier, ascending.
///
/// Manifest or risk-of-bias rows whose identifier has no outcome rows are
/// ignored.
pub fn build_work_records(
    input: &SynthesisInput,
    options: &AggregateOptions,
) -> Result<Vec<WorkRecord>> {
    let grouped = group_by_work(&input.outcomes);
    let manifest = index_by_id(
        &input.manifest,
        |r: &ManifestRow| r.short_id.as_str(),
        InputStream::Manifest,
        options.strict_duplicates,
    )?;
    let rob = index_by_id(
        &input.risk_of_bias,
        |r: &RiskOfBiasRow| r.short_id.as_str(),
        InputStream::RiskOfBias,
        options.strict_duplicates,
    )?;

    let works: Vec<WorkRecord> = grouped
        .iter()
        .map(|(id, rows)| build_work(id, rows, manifest.get(id).copied(), rob.get(id).copied()))
        .collect();

    debug!(
        "Aggregated {} outcome rows into {} works",
        input.outcomes.len(),
        works.len()
    );

    Ok(works)
}

/// Values of one outcome-row column across a work's rows.
fn column<'a>(
    rows: &'a [&'a OutcomeRow],
    f: fn(&OutcomeRow) -> &str,
) -> impl Iterator<Item = &'a str> + 'a {
    rows.iter().map(move |r| f(r))
}

/// Trimmed value of an optional joined row, empty when the row is absent.
fn joined_field<T>(row: Option<&T>, f: fn(&T) -> &str) -> String {
    row.map(|r| f(r).trim().to_string()).unwrap_or_default()
}

/// Collapse the outcome rows of a single work.
fn build_work(
    short_id: &str,
    rows: &[&OutcomeRow],
    manifest: Option<&ManifestRow>,
    rob: Option<&RiskOfBiasRow>,
) -> WorkRecord {
    let mut publication_year = reduce_mode(column(rows, |r| r.publication_year.as_str()));
    if publication_year.is_empty() {
        publication_year = joined_field(manifest, |m| m.publication_year.as_str());
    }
    let citation = reduce_mode(column(rows, |r| r.citation.as_str()));
    let notes = joined_field(manifest, |m| m.notes.as_str());

    let range = reduce_numeric_range(column(rows, |r| r.exposure_duration_days.as_str()));

    let structured_abstract_only = joined_field(manifest, |m| m.abstract_only.as_str());
    let abstract_only_flag = if structured_abstract_only.is_empty() {
        detect_abstract_only(&citation, &notes)
    } else {
        structured_abstract_only.eq_ignore_ascii_case("yes")
    };

    WorkRecord {
        short_id: short_id.to_string(),
        eligibility_tier: joined_field(manifest, |m| m.eligibility_tier.as_str()),
        publication_year,
        citation,
        doi: joined_field(manifest, |m| m.doi.as_str()),
        primary_intervention_category: reduce_mode(column(rows, |r| r.intervention_category.as_str())),
        intervention_categories: reduce_unique_join(column(rows, |r| r.intervention_category.as_str())),
        primary_setting: reduce_mode(column(rows, |r| r.setting.as_str())),
        settings: reduce_unique_join(column(rows, |r| r.setting.as_str())),
        n_total: reduce_mode(column(rows, |r| r.n_total.as_str())),
        exposure_days_min: range.map(|(lo, _)| lo),
        exposure_days_max: range.map(|(_, hi)| hi),
        outcome_domains: reduce_unique_join(column(rows, |r| r.outcome_domain.as_str())),
        has_vigilance_outcome: rows.iter().any(|r| r.is_vigilance()),
        vigilance_effect_summary: vigilance_summary(rows),
        habituation_signal_any: rows.iter().any(|r| r.signals_habituation()),
        low_baseline_arousal_class: joined_field(manifest, |m| m.low_baseline_arousal_class.as_str()),
        repeated_use_class: joined_field(manifest, |m| m.repeated_use_class.as_str()),
        habituation_class: joined_field(manifest, |m| m.habituation_class.as_str()),
        rob_overall: joined_field(rob, |r| r.rob_overall.as_str()),
        rob_tool: joined_field(rob, |r| r.rob_tool.as_str()),
        abstract_only_flag,
        notes,
    }
}

/// Index work records by identifier.
pub fn works_by_id(works: &[WorkRecord]) -> HashMap<&str, &WorkRecord> {
    works.iter().map(|w| (w.short_id.as_str(), w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VigilanceSummary;

    fn outcome(id: &str, domain: &str, direction: &str) -> OutcomeRow {
        OutcomeRow {
            short_id: id.to_string(),
            outcome_domain: domain.to_string(),
            effect_direction: direction.to_string(),
            ..OutcomeRow::default()
        }
    }

    fn manifest(id: &str, tier: &str) -> ManifestRow {
        ManifestRow {
            short_id: id.to_string(),
            eligibility_tier: tier.to_string(),
            ..ManifestRow::default()
        }
    }

    fn rob(id: &str, overall: &str) -> RiskOfBiasRow {
        RiskOfBiasRow {
            short_id: id.to_string(),
            rob_overall: overall.to_string(),
            rob_tool: "RoB2".to_string(),
        }
    }

    fn aggregate(input: &SynthesisInput) -> Vec<WorkRecord> {
        build_work_records(input, &AggregateOptions::default()).unwrap()
    }

    #[test]
    fn test_one_record_per_id_in_ascending_order() {
        let input = SynthesisInput {
            outcomes: vec![
                outcome("S03", "vigilance", "improves"),
                outcome("S01", "fatigue", "null"),
                outcome("S03", "sleepiness", "improves"),
                outcome("S02", "vigilance", "null"),
            ],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        let ids: Vec<&str> = works.iter().map(|w| w.short_id.as_str()).collect();
        assert_eq!(ids, vec!["S01", "S02", "S03"]);
    }

    #[test]
    fn test_blank_ids_are_dropped_everywhere() {
        let input = SynthesisInput {
            outcomes: vec![outcome("  ", "vigilance", "improves"), outcome("S01", "", "")],
            manifest: vec![manifest("", "T1_core")],
            risk_of_bias: vec![rob(" ", "low")],
        };

        let works = aggregate(&input);
        assert_eq!(works.len(), 1);
        assert_eq!(works[0].short_id, "S01");
        assert_eq!(works[0].eligibility_tier, "");
        assert_eq!(works[0].rob_overall, "");
    }

    #[test]
    fn test_ids_are_trimmed_for_joining() {
        let input = SynthesisInput {
            outcomes: vec![outcome(" S01 ", "vigilance", "improves")],
            manifest: vec![manifest("S01", "T1_core")],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert_eq!(works[0].short_id, "S01");
        assert_eq!(works[0].eligibility_tier, "T1_core");
    }

    #[test]
    fn test_manifest_only_ids_are_ignored() {
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "improves")],
            manifest: vec![manifest("S01", "T1_core"), manifest("S99", "T2_context")],
            risk_of_bias: vec![rob("S98", "high")],
        };

        let works = aggregate(&input);
        assert_eq!(works.len(), 1);
    }

    #[test]
    fn test_no_vigilance_sentinel() {
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "sleepiness", "improves"), outcome("S01", "fatigue", "worsens")],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert!(!works[0].has_vigilance_outcome);
        assert_eq!(works[0].vigilance_effect_summary, VigilanceSummary::NoVigilance);
        assert_eq!(works[0].outcome_domains, "fatigue; sleepiness");
    }

    #[test]
    fn test_vigilance_summary_ignores_other_domains() {
        let input = SynthesisInput {
            outcomes: vec![
                outcome("S01", "vigilance", "improves"),
                outcome("S01", "sleepiness", "worsens"),
            ],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert!(works[0].has_vigilance_outcome);
        assert_eq!(works[0].vigilance_effect_summary, VigilanceSummary::Improves);
    }

    #[test]
    fn test_descriptive_fields_reduced() {
        let mut a = outcome("S01", "vigilance", "improves");
        a.intervention_category = "light".to_string();
        a.setting = "field".to_string();
        a.exposure_duration_days = "7".to_string();
        a.n_total = "24".to_string();
        let mut b = outcome("S01", "vigilance", "improves");
        b.intervention_category = "sleep_timing".to_string();
        b.setting = "home".to_string();
        b.exposure_duration_days = "abc".to_string();
        b.n_total = "24".to_string();
        let mut c = outcome("S01", "sleepiness", "null");
        c.intervention_category = "light".to_string();
        c.setting = "home".to_string();
        c.exposure_duration_days = "28".to_string();

        let input = SynthesisInput {
            outcomes: vec![a, b, c],
            ..SynthesisInput::default()
        };

        let work = &aggregate(&input)[0];
        assert_eq!(work.primary_intervention_category, "light");
        assert_eq!(work.intervention_categories, "light; sleep_timing");
        assert_eq!(work.primary_setting, "home");
        assert_eq!(work.settings, "field; home");
        assert_eq!(work.n_total, "24");
        assert_eq!(work.exposure_days_min, Some(7.0));
        assert_eq!(work.exposure_days_max, Some(28.0));
    }

    #[test]
    fn test_missing_durations_stay_empty() {
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "improves")],
            ..SynthesisInput::default()
        };

        let work = &aggregate(&input)[0];
        assert_eq!(work.exposure_days_min, None);
        assert_eq!(work.exposure_days_max, None);
    }

    #[test]
    fn test_publication_year_falls_back_to_manifest() {
        let mut m = manifest("S01", "T1_core");
        m.publication_year = "2019".to_string();
        let mut with_year = outcome("S02", "vigilance", "null");
        with_year.publication_year = "2021".to_string();
        let mut m2 = manifest("S02", "T2_context");
        m2.publication_year = "1999".to_string();

        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "null"), with_year],
            manifest: vec![m, m2],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert_eq!(works[0].publication_year, "2019");
        assert_eq!(works[1].publication_year, "2021");
    }

    #[test]
    fn test_habituation_any_row_case_insensitive() {
        let mut flagged = outcome("S01", "fatigue", "null");
        flagged.habituation_or_tolerance_signal = "YES".to_string();
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "improves"), flagged, outcome("S02", "vigilance", "null")],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert!(works[0].habituation_signal_any);
        assert!(!works[1].habituation_signal_any);
    }

    #[test]
    fn test_abstract_only_heuristic() {
        assert!(detect_abstract_only("Smith 2020 (Abstract-Only)", ""));
        assert!(detect_abstract_only("", "paywalled; ABSTRACT-ONLY extraction"));
        assert!(!detect_abstract_only("Smith 2020", "abstract only"));
    }

    #[test]
    fn test_abstract_only_from_notes_and_override() {
        let mut noted = manifest("S01", "T2_context");
        noted.notes = "abstract-only; paywalled".to_string();
        let mut overridden = manifest("S02", "T2_context");
        overridden.notes = "abstract-only".to_string();
        overridden.abstract_only = "no".to_string();
        let mut forced = manifest("S03", "T2_context");
        forced.abstract_only = "Yes".to_string();

        let input = SynthesisInput {
            outcomes: vec![
                outcome("S01", "vigilance", "null"),
                outcome("S02", "vigilance", "null"),
                outcome("S03", "vigilance", "null"),
            ],
            manifest: vec![noted, overridden, forced],
            ..SynthesisInput::default()
        };

        let works = aggregate(&input);
        assert!(works[0].abstract_only_flag);
        assert!(!works[1].abstract_only_flag);
        assert!(works[2].abstract_only_flag);
    }

    #[test]
    fn test_duplicate_manifest_last_write_wins() {
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "improves")],
            manifest: vec![manifest("S01", "T2_context"), manifest("S01", "T1_core")],
            risk_of_bias: vec![rob("S01", "high"), rob("S01", "low")],
        };

        let works = aggregate(&input);
        assert_eq!(works[0].eligibility_tier, "T1_core");
        assert_eq!(works[0].rob_overall, "low");
        assert_eq!(works[0].rob_tool, "RoB2");
    }

    #[test]
    fn test_duplicate_manifest_strict_errors() {
        let input = SynthesisInput {
            outcomes: vec![outcome("S01", "vigilance", "improves")],
            manifest: vec![manifest("S01", "T2_context"), manifest("S01", "T1_core")],
            ..SynthesisInput::default()
        };

        let options = AggregateOptions {
            strict_duplicates: true,
        };
        let err = build_work_records(&input, &options).unwrap_err();
        assert!(matches!(
            err,
            SynthesisError::DuplicateIdentifier { stream: InputStream::Manifest, ref short_id } if short_id == "S01"
        ));
    }

    #[test]
    fn test_input_order_does_not_change_records() {
        let mut rows = vec![
            outcome("S02", "vigilance", "worsens"),
            outcome("S01", "vigilance", "improves"),
            outcome("S02", "vigilance", "improves"),
            outcome("S01", "fatigue", "null"),
        ];
        rows[0].setting = "lab".to_string();
        rows[2].setting = "field".to_string();

        let forward = aggregate(&SynthesisInput {
            outcomes: rows.clone(),
            ..SynthesisInput::default()
        });
        rows.reverse();
        let backward = aggregate(&SynthesisInput {
            outcomes: rows,
            ..SynthesisInput::default()
        });

        assert_eq!(forward, backward);
        assert_eq!(forward[1].primary_setting, "field");
    }
}
