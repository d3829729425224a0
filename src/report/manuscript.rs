//! Manuscript scaffolding: outline, figure captions, results and discussion
//! drafts, and the assembled manuscript draft.

use super::{endpoint_fragment, Artifact, ReportContext};
use crate::analysis::reducers::reduce_mode;
use crate::models::{
    format_days, ranked, yes_no, CorpusStatistics, OutcomeDomain, VigilanceSummary, WorkRecord,
};
use std::collections::BTreeMap;

/// Markers delimiting the manuscript-ready blocks of the PRISMA flow document.
pub const PRISMA_FLOW_MARKER: &str = "## PRISMA 2020 Flow Inputs (from this run)";
pub const METHODS_SEARCH_MARKER: &str = "## Manuscript-Ready Methods Text (Search)";
pub const METHODS_SCREENING_MARKER: &str = "## Manuscript-Ready Methods Text (Screening + Chaining)";
pub const RESULTS_FLOW_MARKER: &str = "## Manuscript-Ready Results Text (Flow)";

const MAX_HEADING_LEVEL: usize = 6;

/// Text between `start` and the next `end` (or end of text), trimmed.
///
/// `None` when `start` is absent or the block is empty.
pub fn extract_between(text: &str, start: &str, end: &str) -> Option<String> {
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let block = match rest.find(end) {
        Some(to) => &rest[..to],
        None => rest,
    };
    let block = block.trim();
    if block.is_empty() {
        None
    } else {
        Some(block.to_string())
    }
}

/// Drop everything before the first `## ` heading and push every heading
/// down `by` levels, capped at level six.
pub fn demote_headings(markdown: &str, by: usize) -> String {
    let lines: Vec<&str> = markdown.lines().collect();
    let start = lines.iter().position(|l| l.starts_with("## ")).unwrap_or(0);

    let body: Vec<String> = lines[start..]
        .iter()
        .map(|line| {
            let level = line.len() - line.trim_start_matches('#').len();
            if level == 0 {
                line.to_string()
            } else {
                let demoted = (level + by).min(MAX_HEADING_LEVEL);
                format!("{}{}", "#".repeat(demoted), &line[level..])
            }
        })
        .collect();

    format!("{}\n", body.join("\n").trim())
}

/// Primary categories of the core works, by descending count.
fn core_categories(ctx: &ReportContext<'_>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for work in ctx.core_works() {
        *counts.entry(work.category_label().to_string()).or_insert(0) += 1;
    }
    counts
}

fn summary_counts<'a>(works: impl Iterator<Item = &'a WorkRecord>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for work in works {
        *counts
            .entry(work.vigilance_effect_summary.to_string())
            .or_insert(0) += 1;
    }
    counts
}

/// Generate the manuscript outline.
pub fn outline(ctx: &ReportContext<'_>) -> String {
    let stats = ctx.stats();
    let core = core_categories(ctx);
    let lead: Vec<&str> = ranked(&core).into_iter().take(2).map(|(c, _)| c).collect();
    let lead_label = if lead.is_empty() {
        "Natural".to_string()
    } else {
        lead.join(" and ")
    };

    let mut output = String::new();
    output.push_str(&format!("# {} Manuscript Outline (Draft)\n\n", ctx.label));
    output.push_str(&ctx.generated_line());
    output.push('\n');

    output.push_str("## Working Title Candidates\n");
    output.push_str(&format!(
        "- Durability of Repeated-Use {} Protocols: A Systematic Review Focused on Habituation and Sustained Vigilance\n",
        lead_label
    ));
    output.push_str("- What Repeated-Use Evidence Supports for Sustained Vigilance, and Where It Breaks\n");
    output.push_str("- Repeated-Use Interventions: Evidence Map and Habituation-Aware Synthesis\n\n");

    output.push_str("## Research Question (Locked)\n");
    output.push_str(&format!("- {}\n\n", ctx.locked_question()));

    output.push_str("## Abstract (Structured)\n");
    output.push_str("- Background: tonic arousal and sustained vigilance; durability is understudied.\n");
    output.push_str("- Objective: evaluate repeated-use protocols with emphasis on sustained effects and habituation.\n");
    output.push_str("- Methods: PRISMA; search and chaining; manifest-driven screening; extraction schema; risk of bias.\n");
    output.push_str(&format!(
        "- Results: {} works ({}); {} with vigilance outcomes; vigilance summaries {}.\n",
        stats.n_unique_works,
        CorpusStatistics::inline_counts(&stats.works_by_tier),
        stats.works_with_vigilance_outcomes,
        CorpusStatistics::inline_counts(&stats.vigilance_effect_summary_counts)
    ));
    output.push_str("- Conclusions: durable vs transient effects; key gaps; next-trial recommendations.\n\n");

    output.push_str("## Results (Suggested Structure)\n");
    output.push_str("- Study characteristics (core vs context; populations; settings; durations).\n");
    output.push_str("- Intervention classes (core, by work count):\n");
    for (category, n) in ranked(&core) {
        output.push_str(&format!("  - `{}` ({} works)\n", category, n));
    }
    output.push_str("- Durability/habituation mapping: which protocols maintain vs attenuate, and on what timescale.\n");
    output.push_str("- Risk of bias summary.\n\n");

    output.push_str("## Discussion (Suggested Structure)\n");
    output.push_str("- Durable vs transient effects, interpreted mechanistically.\n");
    output.push_str("- Why habituation signals appear: adaptation, ceiling effects, adherence decay.\n");
    output.push_str("- Limitations: proxy populations, heterogeneity, unblinded designs, abstract-only items.\n");
    output.push_str("- Research agenda: counterbalanced repeated-use trials with objective endpoints.\n\n");

    output.push_str(&format!("## Figures/Tables (From {})\n", ctx.label));
    output.push_str(&generate_artifact_list(ctx));
    output.push('\n');

    output
}

fn generate_artifact_list(ctx: &ReportContext<'_>) -> String {
    let mut list = String::new();
    let figures = [
        ("Fig 1", Artifact::StudyCountsFigure),
        ("Fig 2", Artifact::DurabilityFigure),
        ("Fig 3", Artifact::RiskOfBiasFigure),
    ];
    for (name, artifact) in figures {
        if ctx.produces(artifact) {
            list.push_str(&format!("- {}: `{}`\n", name, ctx.artifact_path(artifact)));
        }
    }
    list.push_str(&format!(
        "- Table (work-level evidence map): `{}`\n",
        ctx.artifact_path(Artifact::WorkMap)
    ));
    list.push_str(&format!(
        "- Table (vigilance endpoints): `{}`\n",
        ctx.artifact_path(Artifact::VigilanceTable)
    ));
    list
}

/// Generate the figure captions.
pub fn figure_captions(ctx: &ReportContext<'_>) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {} Figure Captions (Draft)\n\n", ctx.label));
    output.push_str(&ctx.generated_line());
    output.push('\n');

    output.push_str("## Fig 1\n");
    output.push_str(
        "Extracted works by primary intervention category, stratified by evidence tier \
         (`T1_core` vs `T2_context`). Counts are unique works, not outcome rows.\n\n",
    );
    output.push_str("## Fig 2\n");
    output.push_str(
        "Vigilance durability map (work-level). The x-axis is the maximum repeated-use \
         duration (days; log scale); the y-axis is the work-level direction summary for \
         vigilance endpoints. Points are colored by primary intervention category and \
         shaped by tier; `T1_core` works are labeled by short_id. This is an evidence map, \
         not a meta-analysis.\n\n",
    );
    output.push_str("## Fig 3\n");
    output.push_str(
        "Risk of bias (overall) distribution by tier, from the per-work risk-of-bias \
         table. Missing or unclear ratings reflect incomplete reporting or abstract-only \
         extraction.\n\n",
    );

    output
}

fn generate_class_block(ctx: &ReportContext<'_>, category: &str, works: &[&WorkRecord]) -> String {
    let mut block = String::new();
    block.push_str(&format!("### `{}`\n\n", category));

    for work in works {
        let rows = ctx.rows_for(&work.short_id);
        let population = reduce_mode(rows.iter().map(|r| r.population_description.as_str()));
        block.push_str(&format!(
            "- `{}` {} (duration max={}d; RoB={}; habituation_signal={}): {}.\n",
            work.short_id,
            work.citation,
            work.duration_max_label(),
            work.rob_overall,
            yes_no::label(work.habituation_signal_any),
            population
        ));
        for row in ctx.rows_in_domain(&work.short_id, OutcomeDomain::Vigilance) {
            block.push_str(&format!("- Vigilance {}\n", endpoint_fragment(row)));
        }
        for row in ctx.rows_in_domain(&work.short_id, OutcomeDomain::Sleepiness) {
            block.push_str(&format!("- Sleepiness {}\n", endpoint_fragment(row)));
        }
        block.push('\n');
    }

    let counts = summary_counts(works.iter().copied());
    let habituating = works.iter().filter(|w| w.habituation_signal_any).count();
    block.push_str(&format!(
        "Across these {} core works, work-level vigilance summaries were `{}`",
        works.len(),
        CorpusStatistics::inline_counts(&counts)
    ));
    if habituating > 0 {
        block.push_str(&format!(
            ", and {} reported attenuation or tolerance with repeated use",
            habituating
        ));
    }
    block.push_str(".\n\n");

    block
}

/// Generate the results draft.
pub fn results_draft(ctx: &ReportContext<'_>) -> String {
    let stats = ctx.stats();
    let core = ctx.core_works();

    let mut output = String::new();
    output.push_str(&format!("# {} Results Draft (Working Text)\n\n", ctx.label));
    output.push_str(&ctx.generated_line());
    output.push('\n');

    output.push_str("## Study Characteristics (Extracted Set)\n\n");
    output.push_str(&format!(
        "We extracted structured outcomes for {} works ({}). The core evidence set (`T1_core`) comprises {} works.\n",
        stats.n_unique_works,
        CorpusStatistics::inline_counts(&stats.works_by_tier),
        core.len()
    ));
    let durations: Vec<f64> = core.iter().filter_map(|w| w.exposure_days_max).collect();
    let shortest = durations.iter().copied().reduce(f64::min);
    let longest = durations.iter().copied().reduce(f64::max);
    if let (Some(lo), Some(hi)) = (shortest, longest) {
        output.push_str(&format!(
            "Across `T1_core`, repeated-use duration ranged from {} to {} days (max per work).\n",
            format_days(lo),
            format_days(hi)
        ));
    }
    output.push('\n');

    let categories = core_categories(ctx);
    output.push_str("Core works by primary intervention category:\n");
    for (category, n) in ranked(&categories) {
        output.push_str(&format!("- `{}`: {} works\n", category, n));
    }
    output.push('\n');

    output.push_str("## Core Findings by Intervention Class (T1_core)\n\n");
    if core.is_empty() {
        output.push_str("No core works were extracted.\n\n");
    }
    for (category, _) in ranked(&categories) {
        let members: Vec<&WorkRecord> = core
            .iter()
            .copied()
            .filter(|w| w.category_label() == category)
            .collect();
        output.push_str(&generate_class_block(ctx, category, &members));
    }

    output.push_str("## Context Evidence for Habituation/Tolerance Framing (T2_context)\n\n");
    let context = ctx.context_works();
    let context_habituating = context.iter().filter(|w| w.habituation_signal_any).count();
    output.push_str(&format!(
        "Context studies ({} works, {} with a habituation signal) were extracted under a \
         pre-specified cutoff emphasizing repeated-use duration or explicit habituation \
         testing. They inform the interpretation of durability mechanisms.\n\n",
        context.len(),
        context_habituating
    ));
    output.push_str(&format!(
        "See `{}` for the vigilance-only endpoint ledger used for this synthesis.\n",
        ctx.artifact_path(Artifact::VigilanceTable)
    ));

    output
}

/// Generate the discussion draft.
pub fn discussion_draft(ctx: &ReportContext<'_>) -> String {
    let core = ctx.core_works();
    let categories = core_categories(ctx);
    let counts = summary_counts(core.iter().copied());
    let improving = counts
        .get(VigilanceSummary::Improves.as_str())
        .copied()
        .unwrap_or(0);
    let habituating: Vec<String> = ctx
        .works()
        .iter()
        .filter(|w| w.habituation_signal_any)
        .map(|w| format!("`{}`", w.short_id))
        .collect();
    let abstract_only = ctx.works().iter().filter(|w| w.abstract_only_flag).count();

    let mut output = String::new();
    output.push_str(&format!("# {} Discussion Draft (Working Text)\n\n", ctx.label));
    output.push_str(&ctx.generated_line());
    output.push('\n');

    output.push_str("## Summary of What the Extracted Evidence Suggests\n\n");
    match ranked(&categories).first() {
        Some((lead, n)) => output.push_str(&format!(
            "Across the core evidence base, {} of {} works show an improving work-level \
             vigilance summary. The most studied class is `{}` ({} core works). The evidence \
             is heterogeneous and often limited by blinding, adherence and sample size.\n\n",
            improving,
            core.len(),
            lead,
            n
        )),
        None => output.push_str(
            "The extracted set contains no core works, so no summary claim is made.\n\n",
        ),
    }
    output.push_str(
        "A key interpretive distinction is whether an intervention shifts a tonic arousal \
         set-point or reduces sleep pressure or circadian misalignment upstream.\n\n",
    );

    output.push_str("## Habituation and Durability: How to Interpret Signals\n\n");
    if habituating.is_empty() {
        output.push_str("No work reported an explicit habituation or tolerance signal.\n\n");
    } else {
        output.push_str(&format!(
            "Habituation or tolerance signals were reported by {} works ({}). Such signals \
             usually appear as time-dependent effects across repeated exposures or as \
             reversal when the underlying constraint returns.\n\n",
            habituating.len(),
            habituating.join(", ")
        ));
    }

    output.push_str("## Practical Implications (Research, Not Clinical Guidance)\n\n");
    output.push_str(
        "Durability should be measured day by day rather than at the endpoint only, and \
         time-of-day and schedule interactions should be expected.\n\n",
    );

    output.push_str("## Limitations of This Evidence Base\n\n");
    output.push_str("- Proxy populations dominate; trait low baseline arousal is rarely defined explicitly.\n");
    output.push_str("- Few studies jointly measure physiology and performance.\n");
    if abstract_only > 0 {
        output.push_str(&format!(
            "- {} works were extracted from the abstract only and are treated with reduced confidence.\n",
            abstract_only
        ));
    }

    output
}

/// Assemble the manuscript draft.
///
/// Methods text comes from the PRISMA flow document when present; results
/// and discussion are embedded from their drafts with headings demoted.
pub fn manuscript_draft(ctx: &ReportContext<'_>) -> String {
    let stats = ctx.stats();
    let flow = ctx.prisma_flow.unwrap_or_default();

    let mut output = String::new();
    output.push_str(&format!("# Manuscript Draft ({})\n\n", ctx.label));
    output.push_str("## Research Question (Locked)\n");
    output.push_str(&format!("{}\n\n", ctx.locked_question()));

    output.push_str("## Methods (Draft; PRISMA-Oriented)\n\n");
    output.push_str("### Protocol and Reporting Framework\n\n");
    output.push_str(
        "We followed a PRISMA-oriented protocol for evidence identification, retrieval, \
         screening and extraction.\n\n",
    );
    output.push_str("### Information Sources and Search Strategy\n\n");
    let search = extract_between(flow, METHODS_SEARCH_MARKER, METHODS_SCREENING_MARKER);
    let screening = extract_between(flow, METHODS_SCREENING_MARKER, RESULTS_FLOW_MARKER);
    if search.is_some() || screening.is_some() {
        output.push_str("Search and chaining (manuscript-ready text):\n\n");
    }
    for block in [search, screening].into_iter().flatten() {
        output.push_str(&block);
        output.push_str("\n\n");
    }

    output.push_str("### Study Selection and Tiering for Synthesis\n\n");
    output.push_str(
        "Screening and extraction were tracked in a single manifest. Records were tiered \
         into `T1_core` (directly answers the locked question) and `T2_context` (mechanism \
         and gap-map support).\n\n",
    );
    output.push_str("### Data Extraction and Risk of Bias\n\n");
    output.push_str(
        "Structured extraction produced an outcome-level evidence table with a per-work \
         risk-of-bias log.\n\n",
    );
    output.push_str("### Synthesis Approach\n\n");
    output.push_str(
        "Given heterogeneous designs and endpoints, we performed a narrative synthesis \
         organized around repeated-use durability and habituation signals, supplemented by \
         evidence-map visualizations. Core conclusions rest on `T1_core`; `T2_context` \
         constrains interpretation.\n\n",
    );

    output.push_str("## Results (Draft)\n\n");
    if let Some(flow_block) = extract_between(flow, PRISMA_FLOW_MARKER, METHODS_SEARCH_MARKER) {
        output.push_str("### Study Identification and Retrieval (PRISMA Flow)\n\n");
        output.push_str(&flow_block);
        output.push_str("\n\n");
    }
    output.push_str("### Extracted Evidence Base\n\n");
    output.push_str(&format!(
        "Across the extracted evidence set, we mapped {} works and {} outcome rows (see `{}` and `{}`).\n\n",
        stats.n_unique_works,
        stats.n_outcome_rows,
        ctx.artifact_path(Artifact::WorkMap),
        ctx.artifact_path(Artifact::VigilanceTable)
    ));
    output.push_str(&demote_headings(&results_draft(ctx), 1));
    output.push('\n');

    output.push_str("## Discussion (Draft)\n\n");
    output.push_str(&demote_headings(&discussion_draft(ctx), 1));
    output.push('\n');

    output.push_str("## Figures and Tables (Current Draft Set)\n\n");
    output.push_str(&generate_artifact_list(ctx));

    format!("{}\n", output.trim_end())
}
