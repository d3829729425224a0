//! Gap map: what the extracted corpus cannot yet support.

use super::ReportContext;
use crate::models::{or_missing, CorpusStatistics, WorkRecord, MISSING_BUCKET};
use std::collections::BTreeMap;

/// Intervention classes expected for the question but often thin in practice.
const WATCHLIST_CATEGORIES: [&str; 3] = ["breathing", "cold_exposure", "exercise"];

/// Durations at or above this many days count as sustained exposure.
const SUSTAINED_DAYS: f64 = 28.0;

fn count_by<'a>(
    works: impl Iterator<Item = &'a WorkRecord>,
    key: impl Fn(&'a WorkRecord) -> &'a str,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for work in works {
        *counts.entry(or_missing(key(work)).to_string()).or_insert(0) += 1;
    }
    counts
}

/// Number of works reporting each outcome domain.
fn domain_coverage(works: &[WorkRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for work in works {
        for domain in work
            .outcome_domains
            .split("; ")
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            *counts.entry(domain.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

fn generate_population_gaps(works: &[WorkRecord]) -> String {
    let core: Vec<&WorkRecord> = works.iter().filter(|w| w.is_core()).collect();
    let classes = count_by(core.iter().copied(), |w| w.low_baseline_arousal_class.as_str());
    let unclassified = classes.get(MISSING_BUCKET).copied().unwrap_or(0);

    let mut section = String::from("Population gaps:\n");
    section.push_str(&format!(
        "- Low-baseline-arousal class across `T1_core`: `{}`.\n",
        CorpusStatistics::inline_counts(&classes)
    ));
    if unclassified > 0 {
        section.push_str(&format!(
            "- {} core works have no low-baseline-arousal class recorded.\n",
            unclassified
        ));
    }
    section.push_str(
        "- Trait-defined low baseline arousal is rarely operationalized directly; most \
         core work relies on structural or symptomatic proxies.\n\n",
    );
    section
}

fn generate_measurement_gaps(works: &[WorkRecord]) -> String {
    let coverage = domain_coverage(works);
    let without_vigilance = works.iter().filter(|w| !w.has_vigilance_outcome).count();

    let mut section = String::from("Measurement gaps:\n");
    section.push_str(&format!(
        "- Works per outcome domain: `{}`.\n",
        CorpusStatistics::inline_counts(&coverage)
    ));
    section.push_str(&format!(
        "- Works without any vigilance outcome: {} of {}.\n",
        without_vigilance,
        works.len()
    ));
    section.push_str(
        "- Objective tonic arousal markers (baseline pupil, continuous autonomic tone, \
         EEG vigilance indices) are uncommon; PVT remains a downstream proxy.\n\n",
    );
    section
}

fn generate_durability_gaps(works: &[WorkRecord]) -> String {
    let no_duration = works.iter().filter(|w| w.exposure_days_max.is_none()).count();
    let sustained = works
        .iter()
        .filter(|w| w.exposure_days_max.is_some_and(|d| d >= SUSTAINED_DAYS))
        .count();
    let habituation_classes = count_by(works.iter(), |w| w.habituation_class.as_str());

    let mut section = String::from("Durability/habituation gaps:\n");
    section.push_str(&format!(
        "- Works with exposure of at least {} days: {}; works with no parseable duration: {}.\n",
        SUSTAINED_DAYS, sustained, no_duration
    ));
    section.push_str(&format!(
        "- Habituation coding across works: `{}`.\n",
        CorpusStatistics::inline_counts(&habituation_classes)
    ));
    section.push_str(
        "- Few repeated-use protocols test within-protocol attenuation (day 1 vs day 7 vs \
         day 30) at a resolution that separates habituation from stabilization.\n\n",
    );
    section
}

fn generate_intervention_gaps(stats: &CorpusStatistics) -> String {
    let categories = &stats.works_by_primary_intervention_category;
    let single: Vec<String> = categories
        .iter()
        .filter(|(_, n)| **n == 1)
        .map(|(c, _)| format!("`{}`", c))
        .collect();
    let absent: Vec<String> = WATCHLIST_CATEGORIES
        .iter()
        .filter(|c| !categories.contains_key(**c))
        .map(|c| format!("`{}`", c))
        .collect();

    let mut section = String::from("Intervention gaps (natural, scalable, repeated-use):\n");
    if !single.is_empty() {
        section.push_str(&format!(
            "- Categories resting on a single work: {}.\n",
            single.join(", ")
        ));
    }
    if !absent.is_empty() {
        section.push_str(&format!(
            "- Not represented as a primary category: {}.\n",
            absent.join(", ")
        ));
    }
    section.push_str(
        "- Few studies test combined protocols as an optimization problem with factorial \
         designs.\n\n",
    );
    section
}

fn generate_design_gaps(stats: &CorpusStatistics, works: &[WorkRecord]) -> String {
    let abstract_only = works.iter().filter(|w| w.abstract_only_flag).count();

    let mut section = String::from("Design gaps:\n");
    section.push_str(&format!(
        "- Overall risk-of-bias ratings: `{}`.\n",
        CorpusStatistics::inline_counts(&stats.risk_of_bias_overall_counts)
    ));
    if abstract_only > 0 {
        section.push_str(&format!(
            "- {} works were extracted from the abstract only.\n",
            abstract_only
        ));
    }
    section.push_str(
        "- Blinding is often infeasible; strong designs need counterbalancing, objective \
         endpoints and control of expectancy and carryover.\n\n",
    );
    section
}

/// Generate the gap map document.
pub fn gap_map(ctx: &ReportContext<'_>) -> String {
    let works = ctx.works();
    let mut output = String::new();

    output.push_str(&format!("# {} Gap Map (Draft)\n\n", ctx.label));
    output.push_str(&ctx.generated_line());
    output.push_str(&format!("- Locked question: {}\n\n", ctx.locked_question()));

    output.push_str("## Core Gaps (What Prevents Strong Claims About Sustained Tonic Arousal)\n\n");
    output.push_str(&generate_population_gaps(works));
    output.push_str(&generate_measurement_gaps(works));
    output.push_str(&generate_durability_gaps(works));
    output.push_str(&generate_intervention_gaps(ctx.stats()));
    output.push_str(&generate_design_gaps(ctx.stats(), works));

    output.push_str("## Highest-Leverage Next-Step Analyses (Secondary Research Only)\n\n");
    output.push_str(
        "1. Build a durability-first taxonomy: classify each protocol by expected mechanism \
         and map which mechanisms show attenuation.\n",
    );
    output.push_str(
        "2. Extract and compare protocol dose parameters (intensity, timing, adherence) \
         against effect direction and durability windows.\n",
    );
    output.push_str(
        "3. Formalize a habituation coding scheme usable across heterogeneous designs and \
         re-label the evidence in a transparent audit trail.\n",
    );

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{sample_input, sample_synthesis};

    #[test]
    fn test_gap_map_uses_corpus_counts() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);
        let ctx = ReportContext::new(&synthesis, &input.outcomes, "S001", "out");

        let markdown = gap_map(&ctx);
        assert!(markdown.starts_with("# S001 Gap Map (Draft)"));
        assert!(markdown.contains("`{(missing): 2}`"));
        assert!(markdown.contains("- 2 core works have no low-baseline-arousal class recorded."));
        assert!(markdown.contains("`{fatigue: 1, sleepiness: 1, vigilance: 4}`"));
        assert!(markdown.contains("- Works without any vigilance outcome: 0 of 4."));
        assert!(markdown.contains("at least 28 days: 2;"));
        assert!(markdown.contains("`breathing`, `cold_exposure`, `exercise`"));
        assert!(markdown.contains("- 1 works were extracted from the abstract only."));
    }

    #[test]
    fn test_single_work_categories() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);

        let section = generate_intervention_gaps(&synthesis.stats);
        assert!(section.contains("`caffeine`, `sleep_timing`"));
        assert!(!section.contains("`light`,"));
    }
}
