//! Input loading.
//!
//! Reads the three extraction tables into typed rows and the protocol
//! documents used for narrative text. Missing required tables are errors;
//! missing documents degrade to empty text.

use crate::error::{Result, SynthesisError};
use crate::models::{InputStream, ManifestRow, OutcomeRow, RiskOfBiasRow, SynthesisInput};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Resolved locations of every file the pipeline reads.
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub evidence: PathBuf,
    pub risk_of_bias: PathBuf,
    pub manifest: PathBuf,
    pub locked_question: PathBuf,
    pub prisma_flow: PathBuf,
}

/// Resolve a configured path against the project root unless absolute.
pub fn resolve_path(root: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl InputPaths {
    /// Resolve configured paths against the project root.
    pub fn resolve(root: &Path, config: &crate::config::InputsConfig) -> Self {
        let at = |p: &str| resolve_path(root, p);

        Self {
            evidence: at(&config.evidence),
            risk_of_bias: at(&config.risk_of_bias),
            manifest: at(&config.manifest),
            locked_question: at(&config.locked_question),
            prisma_flow: at(&config.prisma_flow),
        }
    }
}

/// Read a CSV table with headers into typed rows.
///
/// Unknown columns are ignored, absent columns default to empty, and short
/// records are padded rather than rejected. Cells are trimmed.
pub fn read_rows<T: DeserializeOwned>(path: &Path, stream: InputStream) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(SynthesisError::InputUnavailable {
            stream,
            path: path.to_path_buf(),
        });
    }

    let file = fs::File::open(path).map_err(|source| SynthesisError::Io {
        stream,
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.map_err(|source| SynthesisError::Csv {
            stream,
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(row);
    }

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Load all three input streams.
pub fn load_input(paths: &InputPaths) -> Result<SynthesisInput> {
    let outcomes: Vec<OutcomeRow> = read_rows(&paths.evidence, InputStream::Evidence)?;
    let risk_of_bias: Vec<RiskOfBiasRow> = read_rows(&paths.risk_of_bias, InputStream::RiskOfBias)?;
    let manifest: Vec<ManifestRow> = read_rows(&paths.manifest, InputStream::Manifest)?;

    info!(
        "Loaded {} outcome rows, {} risk-of-bias rows, {} manifest rows",
        outcomes.len(),
        risk_of_bias.len(),
        manifest.len()
    );

    Ok(SynthesisInput {
        outcomes,
        risk_of_bias,
        manifest,
    })
}

/// Read an optional text document; `None` when it cannot be read.
pub fn read_optional_document(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            if path.exists() {
                warn!("Failed to read {}: {}", path.display(), e);
            } else {
                debug!("Optional document not found: {}", path.display());
            }
            None
        }
    }
}

/// Extract the locked research question: the last non-blank line.
pub fn locked_question_from(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or_default()
        .to_string()
}

/// Read the locked question document; empty when it is absent.
pub fn read_locked_question(path: &Path) -> String {
    read_optional_document(path)
        .map(|text| locked_question_from(&text))
        .unwrap_or_default()
}
