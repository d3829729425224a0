//! Work-level reduction and classification.
//!
//! Everything in this module is pure: it takes in-memory rows and returns
//! records, statistics and orderings without touching the filesystem.

pub mod aggregator;
pub mod classifier;
pub mod reducers;
pub mod statistics;
pub mod vigilance;

pub use aggregator::{build_work_records, group_by_work, AggregateOptions};
pub use statistics::compile_statistics;
pub use vigilance::vigilance_outcomes;

use crate::error::Result;
use crate::models::{CorpusStatistics, SynthesisInput, VigilanceOutcomeRow, WorkRecord};
use chrono::{DateTime, Utc};

/// Everything the renderers consume from one aggregation run.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub works: Vec<WorkRecord>,
    pub stats: CorpusStatistics,
    pub vigilance: Vec<VigilanceOutcomeRow>,
}

/// Run aggregation, statistics and the vigilance ledger over `input`.
pub fn synthesize(
    input: &SynthesisInput,
    options: &AggregateOptions,
    locked_question: &str,
    generated_utc: DateTime<Utc>,
) -> Result<Synthesis> {
    let works = build_work_records(input, options)?;
    let stats = compile_statistics(&works, input.outcomes.len(), locked_question, generated_utc);
    let vigilance = vigilance_outcomes(&works, &input.outcomes);

    Ok(Synthesis {
        works,
        stats,
        vigilance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ManifestRow, OutcomeRow, RiskOfBiasRow};
    use std::collections::BTreeSet;

    fn row(id: &str, domain: &str, direction: &str, category: &str, days: &str) -> OutcomeRow {
        OutcomeRow {
            short_id: id.to_string(),
            outcome_domain: domain.to_string(),
            effect_direction: direction.to_string(),
            intervention_category: category.to_string(),
            exposure_duration_days: days.to_string(),
            publication_year: "2019".to_string(),
            ..OutcomeRow::default()
        }
    }

    fn corpus() -> SynthesisInput {
        SynthesisInput {
            outcomes: vec![
                row("S01", "vigilance", "improves", "light", "14"),
                row("S01", "vigilance", "worsens", "light", "28"),
                row("S02", "sleepiness", "improves", "sleep_timing", "7"),
                row("S03", "vigilance", "null", "caffeine", "abc"),
                row("", "vigilance", "improves", "light", "1"),
                row("S02", "vigilance", "unclear", "sleep_timing", ""),
            ],
            risk_of_bias: vec![RiskOfBiasRow {
                short_id: "S01".to_string(),
                rob_overall: "some_concerns".to_string(),
                rob_tool: "RoB2".to_string(),
            }],
            manifest: vec![
                ManifestRow {
                    short_id: "S01".to_string(),
                    eligibility_tier: "T1_core".to_string(),
                    ..ManifestRow::default()
                },
                ManifestRow {
                    short_id: "S03".to_string(),
                    eligibility_tier: "T2_context".to_string(),
                    ..ManifestRow::default()
                },
            ],
        }
    }

    fn at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_completeness() {
        let input = corpus();
        let synthesis = synthesize(&input, &AggregateOptions::default(), "", at()).unwrap();

        let ids: BTreeSet<&str> = synthesis.works.iter().map(|w| w.short_id.as_str()).collect();
        let expected: BTreeSet<&str> = input
            .outcomes
            .iter()
            .map(|r| r.short_id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        assert_eq!(ids, expected);
        assert_eq!(synthesis.stats.n_outcome_rows, 6);
        assert_eq!(synthesis.stats.n_unique_works, 3);
    }

    #[test]
    fn test_determinism_across_input_order() {
        let input = corpus();
        let first = synthesize(&input, &AggregateOptions::default(), "Q", at()).unwrap();

        let mut shuffled = corpus();
        shuffled.outcomes.reverse();
        shuffled.outcomes.swap(0, 2);
        shuffled.manifest.reverse();
        let second = synthesize(&shuffled, &AggregateOptions::default(), "Q", Utc::now()).unwrap();

        assert_eq!(first.works, second.works);
        let mut normalized = second.stats.clone();
        normalized.generated_utc = first.stats.generated_utc;
        assert_eq!(first.stats, normalized);
    }

    #[test]
    fn test_end_to_end_values() {
        let synthesis = synthesize(&corpus(), &AggregateOptions::default(), "", at()).unwrap();
        let s01 = &synthesis.works[0];

        assert_eq!(s01.vigilance_effect_summary.as_str(), "mixed");
        assert_eq!(s01.exposure_days_min, Some(14.0));
        assert_eq!(s01.exposure_days_max, Some(28.0));
        assert_eq!(s01.rob_overall, "some_concerns");

        let s02 = &synthesis.works[1];
        assert_eq!(s02.vigilance_effect_summary.as_str(), "unclear");
        assert_eq!(s02.eligibility_tier, "");

        assert_eq!(synthesis.vigilance.len(), 4);
        assert_eq!(synthesis.vigilance[0].short_id, "S01");
    }
}
