//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// evsynth - work-level evidence synthesis for systematic reviews
///
/// Collapses outcome-level extraction rows into one record per study,
/// computes corpus statistics, and renders tables, figures and draft
/// manuscript text.
///
/// Examples:
///   evsynth
///   evsynth --root ./review --label S002
///   evsynth --dry-run --format json
///   evsynth --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Project root that relative input and output paths resolve against
    #[arg(long, default_value = ".", value_name = "DIR", env = "EVSYNTH_ROOT")]
    pub root: PathBuf,

    /// Path to configuration file
    ///
    /// If not specified, looks for .evsynth.toml in the project root
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for generated artifacts
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Outcome-level evidence table (overrides config)
    #[arg(long, value_name = "FILE")]
    pub evidence: Option<PathBuf>,

    /// Prefix for generated artifact names (e.g. S001)
    #[arg(short, long, value_name = "LABEL")]
    pub label: Option<String>,

    /// Skip SVG figure rendering
    #[arg(long)]
    pub no_charts: bool,

    /// Skip Markdown narrative documents
    #[arg(long)]
    pub no_narrative: bool,

    /// Fail when a manifest or risk-of-bias identifier appears twice
    #[arg(long)]
    pub strict_duplicates: bool,

    /// Summary format printed after the run (table, json)
    #[arg(long, default_value = "table", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Read and aggregate the inputs without writing any files
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .evsynth.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Format of the summary printed to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    #[default]
    Table,
    /// Statistics snapshot as JSON
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if !self.root.is_dir() {
            return Err(format!(
                "Project root is not a directory: {}",
                self.root.display()
            ));
        }

        if let Some(ref label) = self.label {
            if label.trim().is_empty() {
                return Err("Label must not be empty".to_string());
            }
            if label.contains(['/', '\\']) {
                return Err("Label must not contain path separators".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::parse_from(["evsynth", "--root", "."])
    }

    #[test]
    fn test_defaults() {
        let args = make_args();
        assert_eq!(args.format, OutputFormat::Table);
        assert!(args.output.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_label() {
        let mut args = make_args();
        args.label = Some("runs/S001".to_string());
        assert!(args.validate().is_err());

        args.label = Some("  ".to_string());
        assert!(args.validate().is_err());

        args.label = Some("S003".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_root() {
        let mut args = make_args();
        args.root = PathBuf::from("/definitely/not/here");
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_format_flag() {
        let args = Args::parse_from(["evsynth", "--format", "json", "--dry-run"]);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(args.dry_run);
    }
}
