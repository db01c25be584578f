//! Data models for the results summarizer.
//!
//! This module contains the search tree built from a results directory,
//! the candidate categories it tracks, and the summary rows derived from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Column holding the geography of origin in combined datasets.
pub const GEOGRAPHY_COLUMN: &str = "Geography";

/// Candidate category reported by an ALPINE run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Sequences whose collection date does not fit their lineage
    Anachronistic,
    /// Sequences unusually distant from their cluster
    HighDistance,
    /// Sequences flagged as both anachronistic and highly evolved
    Double,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Anachronistic => write!(f, "anachronistic"),
            Category::HighDistance => write!(f, "high-distance"),
            Category::Double => write!(f, "double"),
        }
    }
}

impl Category {
    /// All categories, in the order combined datasets are built.
    pub const ALL: [Category; 3] = [
        Category::Anachronistic,
        Category::HighDistance,
        Category::Double,
    ];

    /// Metadata table expected inside the category's candidate directory.
    pub fn metadata_file(&self) -> &'static str {
        match self {
            Category::Anachronistic => "anachronistic_metadata_only_candidates.tsv",
            Category::HighDistance => "high_distance_candidates.tsv",
            Category::Double => "double_candidate_metadata.tsv",
        }
    }

    /// File name of the combined Arrow dataset.
    pub fn dataset_file(&self) -> &'static str {
        match self {
            Category::Anachronistic => "anachronistics-meta.arrow",
            Category::HighDistance => "highdist-meta.arrow",
            Category::Double => "double-meta.arrow",
        }
    }

    /// Column-name prefix used in the summary report.
    pub fn report_label(&self) -> &'static str {
        match self {
            Category::Anachronistic => "Anachronistic",
            Category::HighDistance => "High Distance",
            Category::Double => "Double Candidate",
        }
    }

    /// The candidate directory for this category on a branch, if one was found.
    pub fn directory<'a>(&self, branch: &'a SearchBranch) -> Option<&'a Path> {
        match self {
            Category::Anachronistic => branch.anachron.as_deref(),
            Category::HighDistance => branch.highdist.as_deref(),
            Category::Double => branch.double.as_deref(),
        }
    }
}

/// Artifact paths discovered for one geography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBranch {
    /// Top-level results directory for the geography.
    pub parent_dir: PathBuf,
    /// Normalized geography label.
    pub geography: String,
    /// `*double_candidates` directory.
    pub double: Option<PathBuf>,
    /// `*metadata_candidates` directory holding anachronistic metadata.
    pub anachron: Option<PathBuf>,
    /// `*high_distance_clusters` directory.
    pub highdist: Option<PathBuf>,
    /// Early-stage `early_stats.tsv`.
    pub early_stats: Option<PathBuf>,
    /// Late-stage `late_stats.tsv`.
    pub late_stats: Option<PathBuf>,
}

impl SearchBranch {
    /// Creates a branch with no artifacts found.
    pub fn empty(geography: impl Into<String>, parent_dir: impl Into<PathBuf>) -> Self {
        Self {
            parent_dir: parent_dir.into(),
            geography: geography.into(),
            double: None,
            anachron: None,
            highdist: None,
            early_stats: None,
            late_stats: None,
        }
    }

    /// Named artifact slots, in a fixed display order.
    pub fn artifacts(&self) -> [(&'static str, Option<&Path>); 5] {
        [
            ("early stats", self.early_stats.as_deref()),
            ("late stats", self.late_stats.as_deref()),
            ("double candidates", self.double.as_deref()),
            ("anachronistic candidates", self.anachron.as_deref()),
            ("high distance clusters", self.highdist.as_deref()),
        ]
    }

    /// Number of artifacts that were found.
    pub fn found_count(&self) -> usize {
        self.artifacts()
            .iter()
            .filter(|(_, path)| path.is_some())
            .count()
    }
}

/// Geography label to branch; ordered so every pass iterates by label.
pub type SearchTree = BTreeMap<String, SearchBranch>;

/// Count, prevalence and rate for one candidate category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStats {
    pub count: Option<u64>,
    /// Percentage of input sequences (0-100).
    pub prevalence: Option<f64>,
    /// `"1 in N"`, or `"None"` when there is nothing to express.
    pub rate: String,
}

impl CandidateStats {
    /// Derives prevalence and rate from a candidate count and input count.
    ///
    /// A missing operand or a zero input count yields an absent prevalence.
    pub fn from_counts(count: Option<u64>, input: Option<u64>) -> Self {
        let prevalence = match (count, input) {
            (Some(count), Some(input)) if input > 0 => {
                Some(count as f64 * 100.0 / input as f64)
            }
            _ => None,
        };

        // floor(100 / prevalence) == floor(input / count), without float error
        let rate = match (count, input, prevalence) {
            (Some(count), Some(input), Some(_)) if count > 0 => format!("1 in {}", input / count),
            _ => "None".to_string(),
        };

        Self {
            count,
            prevalence,
            rate,
        }
    }
}

/// One summary row per geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub geography: String,
    pub input_sequence_count: Option<u64>,
    pub double: CandidateStats,
    pub anachronistic: CandidateStats,
    pub high_distance: CandidateStats,
}

impl SummaryRow {
    /// Stats for a category, in report column order.
    pub fn stats(&self, category: Category) -> &CandidateStats {
        match category {
            Category::Double => &self.double,
            Category::Anachronistic => &self.anachronistic,
            Category::HighDistance => &self.high_distance,
        }
    }
}

/// The compiled run statistics, rows sorted by geography.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub rows: Vec<SummaryRow>,
}

impl SummaryReport {
    /// Category blocks in the order they appear as report columns.
    pub const COLUMN_ORDER: [Category; 3] = [
        Category::Double,
        Category::Anachronistic,
        Category::HighDistance,
    ];

    /// Report column headers, in order.
    pub fn columns() -> Vec<String> {
        let mut columns = vec![
            GEOGRAPHY_COLUMN.to_string(),
            "Input Sequence Count".to_string(),
        ];
        for category in Self::COLUMN_ORDER {
            let label = category.report_label();
            columns.push(format!("{} Count", label));
            columns.push(format!("{} Prevalence (%)", label));
            columns.push(format!("{} Rate", label));
        }
        columns
    }

    /// Number of geographies with a value for the given category count.
    pub fn coverage(&self, category: Category) -> usize {
        self.rows
            .iter()
            .filter(|row| row.stats(category).count.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_has_zero_prevalence_and_no_rate() {
        let stats = CandidateStats::from_counts(Some(0), Some(100));
        assert_eq!(stats.prevalence, Some(0.0));
        assert_eq!(stats.rate, "None");
    }

    #[test]
    fn test_one_in_hundred() {
        let stats = CandidateStats::from_counts(Some(1), Some(100));
        assert_eq!(stats.prevalence, Some(1.0));
        assert_eq!(stats.rate, "1 in 100");
    }

    #[test]
    fn test_rate_is_floored() {
        let stats = CandidateStats::from_counts(Some(3), Some(10));
        assert_eq!(stats.rate, "1 in 3");

        let stats = CandidateStats::from_counts(Some(3), Some(300));
        assert_eq!(stats.rate, "1 in 100");
    }

    #[test]
    fn test_missing_or_zero_input_is_absent() {
        let stats = CandidateStats::from_counts(Some(5), None);
        assert_eq!(stats.prevalence, None);
        assert_eq!(stats.rate, "None");

        let stats = CandidateStats::from_counts(Some(5), Some(0));
        assert_eq!(stats.prevalence, None);
        assert_eq!(stats.rate, "None");

        let stats = CandidateStats::from_counts(None, Some(100));
        assert_eq!(stats.count, None);
        assert_eq!(stats.prevalence, None);
    }

    #[test]
    fn test_report_columns() {
        let columns = SummaryReport::columns();
        assert_eq!(columns.len(), 11);
        assert_eq!(columns[0], "Geography");
        assert_eq!(columns[2], "Double Candidate Count");
        assert_eq!(columns[3], "Double Candidate Prevalence (%)");
        assert_eq!(columns[7], "Anachronistic Rate");
        assert_eq!(columns[10], "High Distance Rate");
    }

    #[test]
    fn test_branch_found_count() {
        let mut branch = SearchBranch::empty("Wisconsin", "/results/LocalDataset_Wisconsin");
        assert_eq!(branch.found_count(), 0);

        branch.early_stats = Some(PathBuf::from("/results/early_stats.tsv"));
        assert_eq!(branch.found_count(), 1);
        assert_eq!(Category::Double.directory(&branch), None);
    }

    #[test]
    fn test_category_files() {
        assert_eq!(
            Category::Anachronistic.metadata_file(),
            "anachronistic_metadata_only_candidates.tsv"
        );
        assert_eq!(Category::HighDistance.dataset_file(), "highdist-meta.arrow");
        assert_eq!(Category::Double.to_string(), "double");
    }
}
