//! evsynth - work-level evidence synthesis for systematic reviews
//!
//! Reads outcome-level extraction tables, collapses them into one record
//! per study, and writes tables, figures and draft manuscript text.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing input table, malformed CSV, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod input;
mod models;
mod report;

use analysis::{AggregateOptions, Synthesis};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use input::InputPaths;
use models::CorpusStatistics;
use report::charts::SvgRenderer;
use report::{Artifact, ReportContext};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config(&args.root);
    }

    // Config is loaded before logging so its verbose flag can raise the level
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(log_level(&args, &config));

    info!("evsynth v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    if let Err(e) = run_synthesis(&args, &config) {
        error!("Synthesis failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .evsynth.toml in the project root.
fn handle_init_config(root: &Path) -> Result<()> {
    let path = root.join(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            path.display()
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(&path, &content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Created {} with default settings.", path.display());
    println!("   Edit it to customize input paths, run label and outputs.");
    Ok(())
}

/// Effective log level: --quiet wins, then --verbose or the config flag.
fn log_level(args: &Args, config: &Config) -> Level {
    if !args.quiet && config.general.verbose {
        Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging at the given level.
///
/// Logs go to stderr so stdout carries only the run summary.
fn init_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from an explicit path, the project root, or defaults.
///
/// Returns the file the configuration came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try the project root; a file that exists but does not parse is an error
    match Config::load_from_root(&args.root)? {
        Some(config) => Ok((config, Some(args.root.join(CONFIG_FILE)))),
        None => Ok((Config::default(), None)),
    }
}

/// Run the complete synthesis workflow.
fn run_synthesis(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Read the input tables
    let paths = InputPaths::resolve(&args.root, &config.inputs);
    debug!("Input paths: {:?}", paths);

    let input = input::load_input(&paths).context("Failed to load input tables")?;
    let locked_question = input::read_locked_question(&paths.locked_question);
    if locked_question.is_empty() {
        warn!(
            "No locked question found at {}; continuing without it",
            paths.locked_question.display()
        );
    }

    // Step 2: Aggregate
    let options = AggregateOptions {
        strict_duplicates: config.aggregation.strict_duplicates,
    };
    let synthesis = analysis::synthesize(&input, &options, &locked_question, Utc::now())?;
    info!(
        "Aggregated {} outcome rows into {} works",
        synthesis.stats.n_outcome_rows, synthesis.stats.n_unique_works
    );

    // Handle --dry-run: report counts and exit
    if args.dry_run {
        print_summary(args, &synthesis, start_time)?;
        if !args.quiet && args.format == OutputFormat::Table {
            println!("\n✅ Dry run complete. No files were written.");
        }
        return Ok(());
    }

    // Step 3: Render and write artifacts
    let prisma_flow = input::read_optional_document(&paths.prisma_flow);
    if prisma_flow.is_none() {
        info!("No PRISMA flow document; methods text blocks will be omitted");
    }

    let output_dir = input::resolve_path(&args.root, &config.output.dir);
    let artifacts = Artifact::selected(config.output.charts, config.output.narrative);
    let ctx = ReportContext::new(
        &synthesis,
        &input.outcomes,
        &config.general.run_label,
        &config.output.dir,
    )
    .with_prisma_flow(prisma_flow.as_deref())
    .with_artifacts(artifacts);

    let written = report::write_artifacts(&ctx, &output_dir, &SvgRenderer, !args.quiet)?;

    print_summary(args, &synthesis, start_time)?;
    if !args.quiet && args.format == OutputFormat::Table {
        println!(
            "\n✅ Synthesis complete! {} files written to: {}",
            written.len(),
            output_dir.display()
        );
    }

    Ok(())
}

/// Print the run summary in the requested format.
fn print_summary(args: &Args, synthesis: &Synthesis, start_time: Instant) -> Result<()> {
    let summary = render_summary(args.format, args.quiet, synthesis, start_time.elapsed())?;
    if !summary.is_empty() {
        println!("{}", summary);
    }
    Ok(())
}

/// Render the run summary; empty for a quiet table summary.
///
/// In JSON mode the result is exactly the statistics document.
fn render_summary(
    format: OutputFormat,
    quiet: bool,
    synthesis: &Synthesis,
    elapsed: Duration,
) -> Result<String> {
    let stats = &synthesis.stats;

    match format {
        OutputFormat::Json => report::tables::stats_json(stats),
        OutputFormat::Table => {
            if quiet {
                return Ok(String::new());
            }
            let lines = [
                "\n📊 Synthesis Summary:".to_string(),
                format!("   Works: {}", stats.n_unique_works),
                format!("   Outcome rows: {}", stats.n_outcome_rows),
                format!(
                    "   By tier: {}",
                    CorpusStatistics::inline_counts(&stats.works_by_tier)
                ),
                format!(
                    "   With vigilance outcome: {}",
                    stats.works_with_vigilance_outcomes
                ),
                format!(
                    "   Vigilance summaries: {}",
                    CorpusStatistics::inline_counts(&stats.vigilance_effect_summary_counts)
                ),
                format!("   Vigilance ledger rows: {}", synthesis.vigilance.len()),
                format!("   Duration: {:.1}s", elapsed.as_secs_f64()),
            ];
            Ok(lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{sample_input, sample_synthesis};

    #[test]
    fn test_json_summary_is_only_the_stats_document() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);

        let summary =
            render_summary(OutputFormat::Json, false, &synthesis, Duration::from_secs(1)).unwrap();
        assert!(summary.starts_with('{'));

        let value: serde_json::Value = serde_json::from_str(&summary).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(value["n_unique_works"], 4);
        assert_eq!(value["locked_question"], "Does light help?");
    }

    #[test]
    fn test_json_summary_ignores_quiet() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);

        let loud = render_summary(OutputFormat::Json, false, &synthesis, Duration::ZERO).unwrap();
        let quiet = render_summary(OutputFormat::Json, true, &synthesis, Duration::ZERO).unwrap();
        assert_eq!(loud, quiet);
    }

    #[test]
    fn test_table_summary() {
        let input = sample_input();
        let synthesis = sample_synthesis(&input);

        let summary =
            render_summary(OutputFormat::Table, false, &synthesis, Duration::from_millis(1500))
                .unwrap();
        assert!(summary.contains("   Works: 4\n"));
        assert!(summary.contains("   By tier: {T1_core: 2, T2_context: 2}"));
        assert!(summary.ends_with("   Duration: 1.5s"));

        let quiet =
            render_summary(OutputFormat::Table, true, &synthesis, Duration::ZERO).unwrap();
        assert!(quiet.is_empty());
    }
}
