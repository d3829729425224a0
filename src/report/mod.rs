//! Artifact rendering.
//!
//! Every renderer is a pure function of a [`ReportContext`]; only
//! [`write_artifacts`] touches the filesystem.

pub mod charts;
pub mod gap_map;
pub mod generator;
pub mod manuscript;
pub mod tables;

use crate::analysis::{group_by_work, Synthesis};
use crate::models::{CorpusStatistics, OutcomeDomain, OutcomeRow, WorkRecord};
use anyhow::{Context, Result};
use charts::ChartRenderer;
use chrono::SecondsFormat;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Every file a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    WorkMap,
    VigilanceTable,
    Stats,
    StudyCountsFigure,
    DurabilityFigure,
    RiskOfBiasFigure,
    SynthesisReport,
    GapMap,
    ManuscriptOutline,
    FigureCaptions,
    ResultsDraft,
    DiscussionDraft,
    ManuscriptDraft,
}

impl Artifact {
    pub const TABLES: [Artifact; 3] = [Artifact::WorkMap, Artifact::VigilanceTable, Artifact::Stats];

    pub const FIGURES: [Artifact; 3] = [
        Artifact::StudyCountsFigure,
        Artifact::DurabilityFigure,
        Artifact::RiskOfBiasFigure,
    ];

    pub const NARRATIVE: [Artifact; 7] = [
        Artifact::SynthesisReport,
        Artifact::GapMap,
        Artifact::ManuscriptOutline,
        Artifact::FigureCaptions,
        Artifact::ResultsDraft,
        Artifact::DiscussionDraft,
        Artifact::ManuscriptDraft,
    ];

    fn suffix(&self) -> &'static str {
        match self {
            Artifact::WorkMap => "evidence_map_worklevel.csv",
            Artifact::VigilanceTable => "vigilance_outcomes.csv",
            Artifact::Stats => "stats.json",
            Artifact::StudyCountsFigure => "fig1_study_counts_by_intervention.svg",
            Artifact::DurabilityFigure => "fig2_vigilance_durability_map.svg",
            Artifact::RiskOfBiasFigure => "fig3_risk_of_bias_distribution.svg",
            Artifact::SynthesisReport => "synthesis_report.md",
            Artifact::GapMap => "gap_map.md",
            Artifact::ManuscriptOutline => "manuscript_outline.md",
            Artifact::FigureCaptions => "figure_captions.md",
            Artifact::ResultsDraft => "results_draft.md",
            Artifact::DiscussionDraft => "discussion_draft.md",
            Artifact::ManuscriptDraft => "manuscript_draft.md",
        }
    }

    /// File name for this artifact under run label `label`.
    pub fn file_name(&self, label: &str) -> String {
        format!("{}_{}", label, self.suffix())
    }

    /// Short human description, used in file listings.
    pub fn describe(&self) -> &'static str {
        match self {
            Artifact::WorkMap => "Work-level evidence map",
            Artifact::VigilanceTable => "Vigilance-only outcomes table",
            Artifact::Stats => "Corpus statistics",
            Artifact::StudyCountsFigure => "Fig 1 (study counts by intervention)",
            Artifact::DurabilityFigure => "Fig 2 (vigilance durability map)",
            Artifact::RiskOfBiasFigure => "Fig 3 (risk of bias distribution)",
            Artifact::SynthesisReport => "Synthesis report",
            Artifact::GapMap => "Gap map (draft)",
            Artifact::ManuscriptOutline => "Manuscript outline (draft)",
            Artifact::FigureCaptions => "Figure captions (draft)",
            Artifact::ResultsDraft => "Results draft",
            Artifact::DiscussionDraft => "Discussion draft",
            Artifact::ManuscriptDraft => "Manuscript draft",
        }
    }

    /// Artifacts selected by the output switches, in write order.
    pub fn selected(charts: bool, narrative: bool) -> Vec<Artifact> {
        let mut artifacts = Artifact::TABLES.to_vec();
        if charts {
            artifacts.extend(Artifact::FIGURES);
        }
        if narrative {
            artifacts.extend(Artifact::NARRATIVE);
        }
        artifacts
    }
}

/// Shared inputs for every renderer.
pub struct ReportContext<'a> {
    pub synthesis: &'a Synthesis,
    /// Run label prefixed to every artifact name.
    pub label: &'a str,
    /// Output directory as it should appear in generated prose.
    pub display_dir: &'a str,
    /// PRISMA flow document text, when available.
    pub prisma_flow: Option<&'a str>,
    /// Artifacts produced by this run.
    pub artifacts: Vec<Artifact>,
    evidence: BTreeMap<&'a str, Vec<&'a OutcomeRow>>,
}

impl<'a> ReportContext<'a> {
    pub fn new(
        synthesis: &'a Synthesis,
        outcomes: &'a [OutcomeRow],
        label: &'a str,
        display_dir: &'a str,
    ) -> Self {
        Self {
            synthesis,
            label,
            display_dir,
            prisma_flow: None,
            artifacts: Artifact::selected(true, true),
            evidence: group_by_work(outcomes),
        }
    }

    pub fn with_prisma_flow(mut self, text: Option<&'a str>) -> Self {
        self.prisma_flow = text;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn stats(&self) -> &'a CorpusStatistics {
        &self.synthesis.stats
    }

    pub fn works(&self) -> &'a [WorkRecord] {
        &self.synthesis.works
    }

    /// Outcome rows contributing to work `id`, in input order.
    pub fn rows_for(&self, id: &str) -> &[&'a OutcomeRow] {
        self.evidence.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows for work `id` in one outcome domain.
    pub fn rows_in_domain(&self, id: &str, domain: OutcomeDomain) -> Vec<&'a OutcomeRow> {
        self.rows_for(id)
            .iter()
            .copied()
            .filter(|r| r.domain() == Some(domain))
            .collect()
    }

    /// Core-tier works, ascending by id.
    pub fn core_works(&self) -> Vec<&'a WorkRecord> {
        self.works().iter().filter(|w| w.is_core()).collect()
    }

    /// Context-tier works, ascending by id.
    pub fn context_works(&self) -> Vec<&'a WorkRecord> {
        self.works().iter().filter(|w| w.is_context()).collect()
    }

    /// Path of an artifact as referenced from generated prose.
    pub fn artifact_path(&self, artifact: Artifact) -> String {
        let dir = self.display_dir.trim_end_matches('/');
        if dir.is_empty() {
            artifact.file_name(self.label)
        } else {
            format!("{}/{}", dir, artifact.file_name(self.label))
        }
    }

    /// Generation timestamp as shown in document headers.
    pub fn generated(&self) -> String {
        self.stats()
            .generated_utc
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Standard `Generated (UTC)` header bullet.
    pub fn generated_line(&self) -> String {
        format!("- Generated (UTC): `{}`\n", self.generated())
    }

    pub fn locked_question(&self) -> &'a str {
        self.stats().locked_question.trim()
    }

    pub fn produces(&self, artifact: Artifact) -> bool {
        self.artifacts.contains(&artifact)
    }
}

/// `` `measure` (timepoint): `direction`; effect `` endpoint fragment.
pub(crate) fn endpoint_fragment(row: &OutcomeRow) -> String {
    format!(
        "`{}` ({}): `{}`; {}",
        row.outcome_measure.trim(),
        row.outcome_timepoint.trim(),
        row.effect_direction.trim(),
        row.effect_size_reported.trim()
    )
}

/// Render one artifact to its file content.
pub fn render(ctx: &ReportContext<'_>, artifact: Artifact, renderer: &dyn ChartRenderer) -> Result<String> {
    let works = ctx.works();
    let content = match artifact {
        Artifact::WorkMap => tables::work_map_csv(works)?,
        Artifact::VigilanceTable => tables::vigilance_csv(&ctx.synthesis.vigilance)?,
        Artifact::Stats => tables::stats_json(ctx.stats())?,
        Artifact::StudyCountsFigure => {
            renderer.render_bars(&charts::study_counts_chart(works, ctx.label))
        }
        Artifact::DurabilityFigure => {
            renderer.render_scatter(&charts::durability_chart(works, ctx.label))
        }
        Artifact::RiskOfBiasFigure => {
            renderer.render_bars(&charts::risk_of_bias_chart(works, ctx.label))
        }
        Artifact::SynthesisReport => generator::synthesis_report(ctx),
        Artifact::GapMap => gap_map::gap_map(ctx),
        Artifact::ManuscriptOutline => manuscript::outline(ctx),
        Artifact::FigureCaptions => manuscript::figure_captions(ctx),
        Artifact::ResultsDraft => manuscript::results_draft(ctx),
        Artifact::DiscussionDraft => manuscript::discussion_draft(ctx),
        Artifact::ManuscriptDraft => manuscript::manuscript_draft(ctx),
    };
    Ok(content)
}

/// Render and write every selected artifact into `dir`.
///
/// Returns the written paths in write order.
pub fn write_artifacts(
    ctx: &ReportContext<'_>,
    dir: &Path,
    renderer: &dyn ChartRenderer,
    show_progress: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let pb = if show_progress {
        let pb = ProgressBar::new(ctx.artifacts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut written = Vec::with_capacity(ctx.artifacts.len());
    for artifact in &ctx.artifacts {
        let name = artifact.file_name(ctx.label);
        pb.set_message(name.clone());

        let content = render(ctx, *artifact, renderer)
            .with_context(|| format!("Failed to render {}", name))?;
        let path = dir.join(&name);
        tables::write_text(&path, &content)?;
        debug!("Wrote {} ({} bytes)", path.display(), content.len());

        written.push(path);
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Wrote {} artifacts to {}", written.len(), dir.display());

    Ok(written)
}
