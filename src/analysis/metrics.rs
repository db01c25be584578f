//! Per-artifact metric extraction.
//!
//! Each extractor takes an optional path from a search branch. An absent
//! path yields an absent count and never touches the filesystem.

use crate::error::{SummaryError, SummaryResult};
use crate::models::Category;
use crate::table::{self, FirstValue};
use std::path::Path;

/// Column in seqkit stats output holding the sequence count.
pub const NUM_SEQS_COLUMN: &str = "num_seqs";

/// Number of input sequences, from `early_stats.tsv`.
pub fn early_count(path: Option<&Path>) -> SummaryResult<Option<u64>> {
    path.map(stats_count).transpose()
}

/// Number of double candidate sequences, from `late_stats.tsv`.
pub fn late_count(path: Option<&Path>) -> SummaryResult<Option<u64>> {
    path.map(stats_count).transpose()
}

/// Number of anachronistic candidates listed in the metadata directory.
pub fn anachron_count(dir: Option<&Path>) -> SummaryResult<Option<u64>> {
    dir.map(|dir| candidate_rows(dir, Category::Anachronistic))
        .transpose()
}

/// Number of high distance candidates listed in the clusters directory.
pub fn highdist_count(dir: Option<&Path>) -> SummaryResult<Option<u64>> {
    dir.map(|dir| candidate_rows(dir, Category::HighDistance))
        .transpose()
}

/// First `num_seqs` value of a statistics file.
fn stats_count(path: &Path) -> SummaryResult<u64> {
    let malformed = |reason: String| SummaryError::MalformedStatsFile {
        path: path.to_path_buf(),
        reason,
    };

    let value = match table::first_value(path, NUM_SEQS_COLUMN) {
        Ok(FirstValue::Value(value)) => value,
        Ok(FirstValue::NoRows) => return Err(malformed("no data rows".to_string())),
        Ok(FirstValue::MissingColumn(columns)) => {
            return Err(malformed(format!(
                "no {} column (found: {})",
                NUM_SEQS_COLUMN,
                columns.join(", ")
            )))
        }
        Err(SummaryError::Table { source, .. }) => return Err(malformed(source.to_string())),
        Err(e) => return Err(e),
    };

    parse_count(&value)
        .ok_or_else(|| malformed(format!("{} value '{}' is not a count", NUM_SEQS_COLUMN, value)))
}

/// Parse a sequence count, allowing thousands separators.
fn parse_count(value: &str) -> Option<u64> {
    let cleaned: String = value.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<u64>().ok()
}

/// Row count of the category's metadata table inside `dir`.
fn candidate_rows(dir: &Path, category: Category) -> SummaryResult<u64> {
    let file = category.metadata_file();
    let path = dir.join(file);

    if !path.is_file() {
        return Err(SummaryError::MissingExpectedFile {
            dir: dir.to_path_buf(),
            file: file.to_string(),
        });
    }

    table::count_rows(&path)
}
