//! Vigilance outcome ledger.
//!
//! Re-keys vigilance-domain outcome rows onto their work records so the
//! endpoint-level table can be read next to the work-level map.

use super::aggregator::works_by_id;
use crate::models::{OutcomeRow, VigilanceOutcomeRow, WorkRecord};
use std::cmp::Reverse;

/// Ledger sort key: core tier first, newest first, then identifier.
fn ledger_key(row: &VigilanceOutcomeRow) -> (u8, Reverse<i64>, String) {
    let tier_rank = if row.eligibility_tier == "T1_core" { 0 } else { 1 };
    let year = row.publication_year.trim().parse::<i64>().unwrap_or(0);
    (tier_rank, Reverse(year), row.short_id.clone())
}

/// Build the vigilance-only outcome ledger.
///
/// Rows whose identifier has no work record are skipped. The sort is stable,
/// so rows with equal keys keep their input order.
pub fn vigilance_outcomes(works: &[WorkRecord], rows: &[OutcomeRow]) -> Vec<VigilanceOutcomeRow> {
    let by_id = works_by_id(works);

    let mut ledger: Vec<VigilanceOutcomeRow> = rows
        .iter()
        .filter(|r| r.is_vigilance())
        .filter_map(|r| {
            let work = by_id.get(r.short_id.trim())?;
            Some(VigilanceOutcomeRow {
                short_id: work.short_id.clone(),
                eligibility_tier: work.eligibility_tier.clone(),
                citation: work.citation.clone(),
                publication_year: work.publication_year.clone(),
                primary_intervention_category: work.primary_intervention_category.clone(),
                exposure_duration_days: r.exposure_duration_days.trim().to_string(),
                outcome_measure: r.outcome_measure.trim().to_string(),
                outcome_timepoint: r.outcome_timepoint.trim().to_string(),
                effect_direction: r.effect_direction.trim().to_string(),
                effect_size_reported: r.effect_size_reported.trim().to_string(),
                habituation_or_tolerance_signal: r
                    .habituation_or_tolerance_signal
                    .trim()
                    .to_string(),
                rob_overall: work.rob_overall.clone(),
                abstract_only_flag: work.abstract_only_flag,
            })
        })
        .collect();

    ledger.sort_by_cached_key(ledger_key);
    ledger
}
