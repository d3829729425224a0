//! Markdown synthesis report generation.
//!
//! The report is a working-notes document: corpus snapshot, per-work core
//! evidence, habituation signals, context clusters and risk of bias.

use super::{endpoint_fragment, Artifact, ReportContext};
use crate::analysis::reducers::reduce_mode;
use crate::models::{
    ranked, yes_no, CorpusStatistics, OutcomeDomain, OutcomeRow, RobRating, WorkRecord,
};
use std::cmp::Reverse;
use std::collections::BTreeMap;

const VIGILANCE_ENDPOINTS_PER_CONTEXT_WORK: usize = 3;
const SLEEPINESS_ENDPOINTS_PER_CONTEXT_WORK: usize = 2;

/// Generate the complete synthesis report.
pub fn synthesis_report(ctx: &ReportContext<'_>) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# {} Synthesis Report (Draft Working Notes)\n\n",
        ctx.label
    ));
    output.push_str(&ctx.generated_line());
    output.push_str(&format!("- Locked question: {}\n\n", ctx.locked_question()));

    output.push_str(&generate_snapshot_section(ctx.stats()));
    output.push_str(&generate_core_section(ctx));
    output.push_str(&generate_habituation_section(ctx.works()));
    output.push_str(&generate_context_section(ctx));
    output.push_str(&generate_risk_of_bias_section(ctx.works()));
    output.push_str(&generate_files_section(ctx));

    output
}

/// Corpus counts and the primary category distribution.
fn generate_snapshot_section(stats: &CorpusStatistics) -> String {
    let mut section = String::new();

    section.push_str("## Evidence Base Snapshot\n\n");
    section.push_str(&format!(
        "- Unique works in extracted evidence table: **{}**\n",
        stats.n_unique_works
    ));
    section.push_str(&format!(
        "- Outcome rows (one row per study-outcome): **{}**\n",
        stats.n_outcome_rows
    ));
    section.push_str(&format!(
        "- Works by tier: `{}`\n",
        CorpusStatistics::inline_counts(&stats.works_by_tier)
    ));
    section.push_str(&format!(
        "- Works with a vigilance outcome: **{}**\n\n",
        stats.works_with_vigilance_outcomes
    ));

    section.push_str("Primary intervention categories (work-level, by primary category):\n");
    for (category, n) in stats.categories_by_count() {
        section.push_str(&format!("- `{}`: {} works\n", category, n));
    }
    section.push('\n');

    section
}

fn generate_core_section(ctx: &ReportContext<'_>) -> String {
    let mut section = String::new();
    let core = ctx.core_works();

    section.push_str("## Core Evidence (T1_core)\n\n");
    section.push_str(
        "The `T1_core` set is the closest available evidence to the locked question \
         (low-baseline-arousal proxy, repeated-use intervention, vigilance or tonic \
         arousal outcome).\n\n",
    );

    if core.is_empty() {
        section.push_str("No `T1_core` works are present in the extracted set.\n\n");
        return section;
    }

    section.push_str("Work-level core summary (vigilance-focused):\n\n");
    section.push_str(
        "| short_id | citation | primary intervention | duration max (days) | vigilance summary | habituation signal |\n",
    );
    section.push_str("|---|---|---:|---:|---|---|\n");
    for work in &core {
        section.push_str(&format!(
            "| `{}` | {} | `{}` | {} | `{}` | `{}` |\n",
            work.short_id,
            work.citation,
            work.primary_intervention_category,
            work.duration_max_label(),
            work.vigilance_effect_summary,
            yes_no::label(work.habituation_signal_any)
        ));
    }
    section.push('\n');

    section.push_str(&generate_direction_by_category(&core));

    section.push_str("### Core Protocol-Level Notes (T1_core)\n\n");
    for work in &core {
        section.push_str(&generate_core_work_block(ctx, work));
    }

    section
}

/// Vigilance summary counts per primary category of the given works.
fn generate_direction_by_category(works: &[&WorkRecord]) -> String {
    let mut by_category: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
    let mut totals: BTreeMap<String, usize> = BTreeMap::new();
    for work in works {
        let category = work.category_label().to_string();
        *by_category
            .entry(category.clone())
            .or_default()
            .entry(work.vigilance_effect_summary.to_string())
            .or_insert(0) += 1;
        *totals.entry(category).or_insert(0) += 1;
    }

    let mut section = String::new();
    section.push_str("### Vigilance Direction by Intervention Class (T1_core)\n\n");
    for (category, n) in ranked(&totals) {
        let counts = by_category.get(category).cloned().unwrap_or_default();
        section.push_str(&format!(
            "- `{}` ({} works): `{}`\n",
            category,
            n,
            CorpusStatistics::inline_counts(&counts)
        ));
    }
    section.push('\n');

    section
}

/// Most frequent value of one column across a work's rows.
fn mode_of(rows: &[&OutcomeRow], f: fn(&OutcomeRow) -> &str) -> String {
    reduce_mode(rows.iter().map(|r| f(r)))
}

/// Protocol parameters and endpoints for one core work.
fn generate_core_work_block(ctx: &ReportContext<'_>, work: &WorkRecord) -> String {
    let rows = ctx.rows_for(&work.short_id);
    if rows.is_empty() {
        return String::new();
    }

    let mut block = String::new();
    block.push_str(&format!("#### `{}` - {}\n", work.short_id, work.citation));
    block.push_str(&format!("- Tier: `{}`\n", work.eligibility_tier));
    block.push_str(&format!(
        "- Population: {}\n",
        mode_of(rows, |r| r.population_description.as_str())
    ));
    block.push_str(&format!(
        "- Low-arousal operationalization/proxy: {}\n",
        mode_of(rows, |r| r.low_arousal_proxy_definition.as_str())
    ));
    block.push_str(&format!("- Design: {}\n", mode_of(rows, |r| r.study_design.as_str())));
    block.push_str(&format!("- Setting: {}\n", mode_of(rows, |r| r.setting.as_str())));
    block.push_str(&format!(
        "- Sample size (as extracted): {}\n",
        mode_of(rows, |r| r.n_total.as_str())
    ));
    block.push_str(&format!(
        "- Protocol (as extracted): {}\n",
        mode_of(rows, |r| r.intervention_protocol.as_str())
    ));
    block.push_str(&format!(
        "- Comparator (as extracted): {}\n",
        mode_of(rows, |r| r.comparator.as_str())
    ));
    block.push_str(&format!(
        "- Repeated-use duration (max per work): {} days\n",
        work.duration_max_label()
    ));
    block.push_str(&format!(
        "- Work-level vigilance summary: `{}`\n",
        work.vigilance_effect_summary
    ));
    block.push_str(&format!(
        "- Habituation/tolerance signal present: `{}`\n",
        yes_no::label(work.habituation_signal_any)
    ));
    block.push_str(&format!(
        "- Risk of bias (overall): `{}` ({})\n\n",
        work.rob_overall, work.rob_tool
    ));

    let vigilance = ctx.rows_in_domain(&work.short_id, OutcomeDomain::Vigilance);
    if vigilance.is_empty() {
        block.push_str("- Vigilance endpoints: none extracted.\n\n");
    } else {
        block.push_str("Vigilance endpoints (as extracted):\n");
        for row in vigilance {
            block.push_str(&format!(
                "- {} (habituation_flag={})\n",
                endpoint_fragment(row),
                row.habituation_or_tolerance_signal.trim()
            ));
        }
        block.push('\n');
    }

    let sleepiness_fatigue: Vec<_> = rows
        .iter()
        .filter(|r| {
            matches!(
                r.domain(),
                Some(OutcomeDomain::Sleepiness) | Some(OutcomeDomain::Fatigue)
            )
        })
        .collect();
    if !sleepiness_fatigue.is_empty() {
        block.push_str("Sleepiness/fatigue endpoints (selected; as extracted):\n");
        for row in sleepiness_fatigue {
            block.push_str(&format!(
                "- `{}` {}\n",
                row.outcome_domain.trim(),
                endpoint_fragment(row)
            ));
        }
        block.push('\n');
    }

    block
}

fn generate_habituation_section(works: &[WorkRecord]) -> String {
    let ids: Vec<String> = works
        .iter()
        .filter(|w| w.habituation_signal_any)
        .map(|w| format!("`{}`", w.short_id))
        .collect();

    let mut section = String::new();
    section.push_str("## Habituation / Tolerance Patterns (Across Core + Context)\n\n");
    section.push_str(&format!(
        "- Works with explicit `habituation_or_tolerance_signal=yes` in the extracted evidence rows: **{}**\n",
        ids.len()
    ));
    if !ids.is_empty() {
        section.push_str(&format!("- IDs: {}\n", ids.join(", ")));
    }
    section.push('\n');
    section.push_str(
        "Interpretation note: a habituation signal covers any within-study evidence of \
         attenuation across days or weeks, reversal after repeated use, or explicit \
         tolerance framing. It does not imply a formal tolerance test.\n\n",
    );

    section
}

/// Discussion priority for context works: abstract-only first, then
/// habituation signals, then newest, then id.
fn context_priority(work: &WorkRecord) -> (bool, bool, Reverse<i64>, String) {
    (
        !work.abstract_only_flag,
        !work.habituation_signal_any,
        Reverse(work.year_value()),
        work.short_id.clone(),
    )
}

fn generate_context_section(ctx: &ReportContext<'_>) -> String {
    let mut section = String::new();
    section.push_str("## Context Evidence That Constrains Durability Claims (T2_context)\n\n");
    section.push_str(
        "`T2_context` works support interpretation (mechanism and habituation framing); \
         they do not replace `T1_core` for the locked question.\n\n",
    );

    let context = ctx.context_works();
    if context.is_empty() {
        section.push_str("No `T2_context` works are present in the extracted set.\n\n");
        return section;
    }

    let mut clusters: BTreeMap<String, Vec<&WorkRecord>> = BTreeMap::new();
    for work in context {
        clusters
            .entry(work.category_label().to_string())
            .or_default()
            .push(work);
    }
    let sizes: BTreeMap<String, usize> = clusters.iter().map(|(k, v)| (k.clone(), v.len())).collect();

    for (category, _) in ranked(&sizes) {
        let Some(works) = clusters.get_mut(category) else {
            continue;
        };
        works.sort_by_cached_key(|w| context_priority(w));

        section.push_str(&format!("### Context cluster: `{}`\n\n", category));
        for work in works.iter() {
            section.push_str(&generate_context_work_block(ctx, work));
        }

        let habituating = works.iter().filter(|w| w.habituation_signal_any).count();
        let abstract_only = works.iter().filter(|w| w.abstract_only_flag).count();
        section.push_str(&format!(
            "Cluster summary: {} works; {} with a habituation signal; {} abstract-only.\n\n",
            works.len(),
            habituating,
            abstract_only
        ));
    }

    section
}

fn generate_context_work_block(ctx: &ReportContext<'_>, work: &WorkRecord) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "- `{}` {} (duration max={}d; abstract_only={}; RoB={})\n",
        work.short_id,
        work.citation,
        work.duration_max_label(),
        yes_no::label(work.abstract_only_flag),
        work.rob_overall
    ));
    if work.abstract_only_flag {
        block.push_str(
            "- Note: extracted from the abstract only; treat as context with reduced confidence.\n",
        );
    }

    let vigilance = ctx.rows_in_domain(&work.short_id, OutcomeDomain::Vigilance);
    for row in vigilance.iter().take(VIGILANCE_ENDPOINTS_PER_CONTEXT_WORK) {
        block.push_str(&format!(
            "- Vigilance {} (habituation_flag={})\n",
            endpoint_fragment(row),
            row.habituation_or_tolerance_signal.trim()
        ));
    }
    let sleepiness = ctx.rows_in_domain(&work.short_id, OutcomeDomain::Sleepiness);
    for row in sleepiness.iter().take(SLEEPINESS_ENDPOINTS_PER_CONTEXT_WORK) {
        block.push_str(&format!("- Sleepiness {}\n", endpoint_fragment(row)));
    }
    block.push('\n');

    block
}

fn generate_risk_of_bias_section(works: &[WorkRecord]) -> String {
    let mut section = String::new();
    section.push_str("## Risk of Bias (Work-Level)\n\n");

    section.push_str("| tier | ");
    section.push_str(
        &RobRating::ALL
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
    );
    section.push_str(" | unrated |\n");
    section.push_str(&format!("|---|{}\n", "---:|".repeat(RobRating::ALL.len() + 1)));

    let mut by_tier: BTreeMap<&str, Vec<&WorkRecord>> = BTreeMap::new();
    for work in works {
        by_tier.entry(work.tier_label()).or_default().push(work);
    }
    for (tier, tier_works) in &by_tier {
        let mut cells: Vec<String> = RobRating::ALL
            .iter()
            .map(|rating| {
                tier_works
                    .iter()
                    .filter(|w| RobRating::from_label(&w.rob_overall) == Some(*rating))
                    .count()
                    .to_string()
            })
            .collect();
        let unrated = tier_works
            .iter()
            .filter(|w| RobRating::from_label(&w.rob_overall).is_none())
            .count();
        cells.push(unrated.to_string());
        section.push_str(&format!("| `{}` | {} |\n", tier, cells.join(" | ")));
    }
    section.push('\n');

    let high = works
        .iter()
        .filter(|w| RobRating::from_label(&w.rob_overall) == Some(RobRating::High))
        .count();
    section.push_str(&format!(
        "Works rated `high` overall: {} of {}. Unrated works lack a usable \
         assessment, often because only the abstract was available.\n\n",
        high,
        works.len()
    ));

    section
}

fn generate_files_section(ctx: &ReportContext<'_>) -> String {
    let mut section = String::new();
    section.push_str(&format!("## Files Generated ({})\n\n", ctx.label));
    for artifact in ctx.artifacts.iter().filter(|a| **a != Artifact::SynthesisReport) {
        section.push_str(&format!(
            "- {}: `{}`\n",
            artifact.describe(),
            ctx.artifact_path(*artifact)
        ));
    }
    section.push('\n');

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{sample_input, sample_synthesis};

    #[test]
    fn test_synthesis_report_sections() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);
        let ctx = ReportContext::new(&synthesis, &input.outcomes, "S001", "output/synthesis");

        let markdown = synthesis_report(&ctx);
        assert!(markdown.starts_with("# S001 Synthesis Report"));
        assert!(markdown.contains("- Locked question: Does light help?"));
        assert!(markdown.contains("- Unique works in extracted evidence table: **4**"));
        assert!(markdown.contains("`{T1_core: 2, T2_context: 2}`"));
        assert!(markdown.contains("#### `A01` - A01 et al. (2019)"));
        assert!(markdown.contains("- Repeated-use duration (max per work): 28 days"));
        assert!(markdown.contains("Sleepiness/fatigue endpoints"));
        assert!(markdown.contains("- IDs: `C02`"));
        assert!(markdown.contains("`output/synthesis/S001_gap_map.md`"));
        assert!(!markdown.contains("S001_synthesis_report.md"));
    }

    #[test]
    fn test_core_table_row() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);
        let ctx = ReportContext::new(&synthesis, &input.outcomes, "S001", "out");

        let section = generate_core_section(&ctx);
        assert!(section.contains(
            "| `A02` | A02 et al. (2019) | `sleep_timing` | 14 | `mixed` | `no` |"
        ));
        assert!(section.contains("- `light` (1 works): `{improves: 1}`"));
    }

    #[test]
    fn test_context_priority_order() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);
        let ctx = ReportContext::new(&synthesis, &input.outcomes, "S001", "out");

        let section = generate_context_section(&ctx);
        assert!(section.contains("### Context cluster: `caffeine`"));
        assert!(section.contains("abstract_only=yes; RoB=high"));
        assert!(section.contains("- Note: extracted from the abstract only"));

        let mut works: Vec<WorkRecord> = synthesis.works.clone();
        works[0].abstract_only_flag = false;
        works[1].abstract_only_flag = true;
        works.sort_by_cached_key(context_priority);
        assert_eq!(works[0].short_id, "A02");
    }

    #[test]
    fn test_risk_of_bias_table() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);

        let section = generate_risk_of_bias_section(&synthesis.works);
        assert!(section.contains("| tier | low | some_concerns | high | unclear | unrated |"));
        assert!(section.contains("| `T1_core` | 0 | 1 | 0 | 0 | 1 |"));
        assert!(section.contains("| `T2_context` | 0 | 0 | 1 | 0 | 1 |"));
        assert!(section.contains("Works rated `high` overall: 1 of 4."));
    }

    #[test]
    fn test_empty_corpus_report() {
        let input = crate::models::SynthesisInput::default();
        let synthesis = sample_synthesis(&input);
        let ctx = ReportContext::new(&synthesis, &input.outcomes, "S001", "out");

        let markdown = synthesis_report(&ctx);
        assert!(markdown.contains("No `T1_core` works are present"));
        assert!(markdown.contains("No `T2_context` works are present"));
        assert!(markdown.contains("**0**"));
    }
}
