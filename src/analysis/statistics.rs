//! Corpus-level statistics over work records.

use crate::models::{or_missing, yes_no, CorpusStatistics, WorkRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Tally `key` over `works` into an ordered count map.
fn count_by<'a, I, F>(works: I, key: F) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a WorkRecord>,
    F: Fn(&'a WorkRecord) -> &'a str,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for work in works {
        *counts.entry(key(work).to_string()).or_default() += 1;
    }
    counts
}

/// Compile the statistics snapshot for one run.
///
/// `n_outcome_rows` is the number of outcome rows read, including rows later
/// dropped for lacking an identifier.
pub fn compile_statistics(
    works: &[WorkRecord],
    n_outcome_rows: usize,
    locked_question: &str,
    generated_utc: DateTime<Utc>,
) -> CorpusStatistics {
    let with_vigilance = || works.iter().filter(|w| w.has_vigilance_outcome);

    CorpusStatistics {
        generated_utc,
        locked_question: locked_question.to_string(),
        n_unique_works: works.len(),
        n_outcome_rows,
        works_by_tier: count_by(works, |w| or_missing(&w.eligibility_tier)),
        works_by_primary_intervention_category: count_by(works, |w| {
            or_missing(&w.primary_intervention_category)
        }),
        works_with_vigilance_outcomes: with_vigilance().count(),
        vigilance_effect_summary_counts: count_by(with_vigilance(), |w| {
            w.vigilance_effect_summary.as_str()
        }),
        habituation_signal_any_counts: count_by(works, |w| yes_no::label(w.habituation_signal_any)),
        risk_of_bias_overall_counts: count_by(works, |w| or_missing(&w.rob_overall)),
    }
}
