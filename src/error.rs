//! Error types for the results summarizer.
//!
//! Whole-run failures and per-artifact failures share one enum so the
//! caller can decide, per variant, whether a failure is fatal.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, reading, or combining ALPINE results.
#[derive(Debug, Error)]
pub enum SummaryError {
    /// The results root contains no directories at all.
    #[error("no subdirectories found in results directory {0}")]
    NoSubdirectories(PathBuf),

    /// Directories were found but none produced a geography label.
    #[error("no valid geographies could be derived from {0}")]
    NoValidGeographies(PathBuf),

    /// Two result directories normalize to the same geography label.
    #[error("directories {first} and {second} both resolve to geography '{label}'")]
    LabelCollision {
        label: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A statistics file exists but has no usable `num_seqs` value.
    #[error("malformed statistics file {path}: {reason}")]
    MalformedStatsFile { path: PathBuf, reason: String },

    /// A candidate directory exists but the file expected inside it does not.
    #[error("expected file {file} is missing from {dir}")]
    MissingExpectedFile { dir: PathBuf, file: String },

    /// A delimited table could not be parsed.
    #[error("failed to read table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A geography's metadata table does not match the category's schema.
    #[error(
        "{} metadata for '{}' has columns [{}], expected [{}]",
        .category,
        .geography,
        .found.join(", "),
        .expected.join(", ")
    )]
    SchemaDrift {
        category: String,
        geography: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The summary ended up with no rows.
    #[error("no results could be compiled")]
    EmptyReport,

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SummaryError {
    /// Whether this error describes a single artifact rather than the whole run.
    ///
    /// Artifact-level errors are downgraded to "absent" unless strict mode is on.
    pub fn is_artifact_level(&self) -> bool {
        matches!(
            self,
            SummaryError::MalformedStatsFile { .. }
                | SummaryError::MissingExpectedFile { .. }
                | SummaryError::Table { .. }
        )
    }
}

pub type SummaryResult<T> = std::result::Result<T, SummaryError>;
