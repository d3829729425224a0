//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.evsynth.toml` files. All paths are relative to the project root
//! unless absolute.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".evsynth.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input table and document locations.
    #[serde(default)]
    pub inputs: InputsConfig,

    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// Aggregation policy.
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Prefix for every generated artifact (e.g. `S001_stats.json`).
    #[serde(default = "default_run_label")]
    pub run_label: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            run_label: default_run_label(),
            verbose: false,
        }
    }
}

fn default_run_label() -> String {
    "S001".to_string()
}

/// Locations of the input tables and protocol documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsConfig {
    /// Outcome-level evidence table.
    #[serde(default = "default_evidence")]
    pub evidence: String,

    /// Per-work risk-of-bias table.
    #[serde(default = "default_risk_of_bias")]
    pub risk_of_bias: String,

    /// Full-text processing manifest.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Document whose last non-blank line is the locked question.
    #[serde(default = "default_locked_question")]
    pub locked_question: String,

    /// PRISMA flow document with manuscript-ready methods blocks.
    #[serde(default = "default_prisma_flow")]
    pub prisma_flow: String,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            evidence: default_evidence(),
            risk_of_bias: default_risk_of_bias(),
            manifest: default_manifest(),
            locked_question: default_locked_question(),
            prisma_flow: default_prisma_flow(),
        }
    }
}

fn default_evidence() -> String {
    "data/evidence_table.csv".to_string()
}

fn default_risk_of_bias() -> String {
    "data/risk_of_bias.csv".to_string()
}

fn default_manifest() -> String {
    "data/fulltext_processing_manifest.csv".to_string()
}

fn default_locked_question() -> String {
    "protocol/00_locked_question.md".to_string()
}

fn default_prisma_flow() -> String {
    "protocol/03_prisma_flow_and_reporting_text.md".to_string()
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives every artifact.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Render the SVG figures.
    #[serde(default = "default_true")]
    pub charts: bool,

    /// Render the Markdown narrative documents.
    #[serde(default = "default_true")]
    pub narrative: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            charts: true,
            narrative: true,
        }
    }
}

fn default_output_dir() -> String {
    "output/synthesis".to_string()
}

fn default_true() -> bool {
    true
}

/// Aggregation policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Fail on duplicate manifest / risk-of-bias identifiers.
    #[serde(default)]
    pub strict_duplicates: bool,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a project root.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_root(root: &Path) -> Result<Option<Self>> {
        let config_path = root.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref label) = args.label {
            self.general.run_label = label.clone();
        }
        if let Some(ref output) = args.output {
            self.output.dir = output.to_string_lossy().to_string();
        }
        if let Some(ref evidence) = args.evidence {
            self.inputs.evidence = evidence.to_string_lossy().to_string();
        }

        // Flags only ever switch things off / on
        if args.no_charts {
            self.output.charts = false;
        }
        if args.no_narrative {
            self.output.narrative = false;
        }
        if args.strict_duplicates {
            self.aggregation.strict_duplicates = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
