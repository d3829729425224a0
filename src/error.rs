//! Error types for input loading and aggregation.
//!
//! Most malformed-but-readable input degrades silently (blank ids are
//! dropped, unparseable numbers are skipped). The variants here cover the
//! conditions that must stop a run.

use crate::models::InputStream;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    /// A required input file does not exist or is not a regular file.
    #[error("{stream} unavailable: {} is not a readable file", path.display())]
    InputUnavailable { stream: InputStream, path: PathBuf },

    /// A required input file exists but could not be read.
    #[error("failed to read {stream} at {}: {source}", path.display())]
    Io {
        stream: InputStream,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV structure could not be decoded.
    #[error("malformed {stream} CSV at {}: {source}", path.display())]
    Csv {
        stream: InputStream,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The same identifier appears twice in a one-row-per-work table.
    #[error("duplicate short_id '{short_id}' in {stream}")]
    DuplicateIdentifier { stream: InputStream, short_id: String },
}

pub type Result<T> = std::result::Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_unavailable_message() {
        let err = SynthesisError::InputUnavailable {
            stream: InputStream::Evidence,
            path: PathBuf::from("data/evidence_table.csv"),
        };
        let msg = err.to_string();
        assert!(msg.contains("evidence table"));
        assert!(msg.contains("data/evidence_table.csv"));
    }

    #[test]
    fn test_duplicate_identifier_message() {
        let err = SynthesisError::DuplicateIdentifier {
            stream: InputStream::Manifest,
            short_id: "S12".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate short_id 'S12' in manifest");
    }
}
