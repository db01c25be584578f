//! Run statistics aggregation.
//!
//! This module turns a search tree into one summary row per geography,
//! reading each geography's artifacts on a bounded pool of blocking tasks.

use crate::analysis::metrics::{anachron_count, early_count, highdist_count, late_count};
use crate::error::{SummaryError, SummaryResult};
use crate::models::{CandidateStats, SearchBranch, SearchTree, SummaryReport, SummaryRow};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

/// What to do when a single artifact is present but unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log it and treat the metric as absent.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

/// Options for compiling the summary.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Geographies processed at once
    pub concurrency: usize,
    pub policy: FailurePolicy,
    pub show_progress: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            policy: FailurePolicy::Lenient,
            show_progress: false,
        }
    }
}

/// Apply the failure policy to one extracted metric.
pub fn apply_policy<T>(
    result: SummaryResult<Option<T>>,
    policy: FailurePolicy,
    geography: &str,
    metric: &str,
) -> SummaryResult<Option<T>> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_artifact_level() && policy == FailurePolicy::Lenient => {
            warn!("{}: treating {} as missing: {}", geography, metric, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Build the summary row for a single geography.
pub fn summarize_branch(branch: &SearchBranch, policy: FailurePolicy) -> SummaryResult<SummaryRow> {
    let geography = branch.geography.as_str();

    let input = apply_policy(
        early_count(branch.early_stats.as_deref()),
        policy,
        geography,
        "input sequence count",
    )?;
    let double = apply_policy(
        late_count(branch.late_stats.as_deref()),
        policy,
        geography,
        "double candidate count",
    )?;
    let anachron = apply_policy(
        anachron_count(branch.anachron.as_deref()),
        policy,
        geography,
        "anachronistic count",
    )?;
    let highdist = apply_policy(
        highdist_count(branch.highdist.as_deref()),
        policy,
        geography,
        "high distance count",
    )?;

    debug!(
        "{}: input={:?} double={:?} anachronistic={:?} high_distance={:?}",
        geography, input, double, anachron, highdist
    );

    Ok(SummaryRow {
        geography: branch.geography.clone(),
        input_sequence_count: input,
        double: CandidateStats::from_counts(double, input),
        anachronistic: CandidateStats::from_counts(anachron, input),
        high_distance: CandidateStats::from_counts(highdist, input),
    })
}

/// Compile the summary report for every geography in the tree.
///
/// Rows are sorted by geography regardless of completion order.
pub async fn compile_summary(
    tree: &SearchTree,
    options: &AggregateOptions,
) -> SummaryResult<SummaryReport> {
    let progress = progress_bar(tree.len() as u64, options.show_progress);
    let policy = options.policy;

    let results: Vec<SummaryResult<SummaryRow>> = stream::iter(tree.values().cloned())
        .map(|branch| tokio::task::spawn_blocking(move || summarize_branch(&branch, policy)))
        .buffer_unordered(options.concurrency.max(1))
        .map(|joined| {
            progress.inc(1);
            joined.unwrap_or_else(|e| Err(SummaryError::Io(std::io::Error::other(e))))
        })
        .collect()
        .await;

    progress.finish_and_clear();

    let mut rows = results.into_iter().collect::<SummaryResult<Vec<_>>>()?;
    rows.sort_by(|a, b| a.geography.cmp(&b.geography));

    if rows.is_empty() {
        return Err(SummaryError::EmptyReport);
    }

    info!("Compiled statistics for {} geographies", rows.len());
    Ok(SummaryReport { rows })
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message("geographies");
    pb
}

/// Geographies whose input sequence count could not be determined.
pub fn geographies_without_input(report: &SummaryReport) -> Vec<&str> {
    report
        .rows
        .iter()
        .filter(|row| row.input_sequence_count.is_none())
        .map(|row| row.geography.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_stats(path: &Path, count: u64) {
        fs::write(
            path,
            format!("file\tformat\tnum_seqs\nseqs.fasta\tFASTA\t{}\n", count),
        )
        .unwrap();
    }

    fn write_candidates(dir: &Path, file: &str, rows: usize) {
        fs::create_dir_all(dir).unwrap();
        let mut content = String::from("strain\tdate\n");
        for i in 0..rows {
            content.push_str(&format!("seq{}\t2022-01-{:02}\n", i, i + 1));
        }
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_only_early_stats() {
        let root = TempDir::new().unwrap();
        let early = root.path().join("early_stats.tsv");
        write_stats(&early, 42);

        let mut branch = SearchBranch::empty("Wisconsin", root.path());
        branch.early_stats = Some(early);

        let mut tree = SearchTree::new();
        tree.insert("Wisconsin".to_string(), branch);

        let report =
            tokio_test::block_on(compile_summary(&tree, &AggregateOptions::default())).unwrap();

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.input_sequence_count, Some(42));
        for stats in [&row.double, &row.anachronistic, &row.high_distance] {
            assert_eq!(stats.count, None);
            assert_eq!(stats.prevalence, None);
            assert_eq!(stats.rate, "None");
        }
    }

    #[test]
    fn test_full_branch() {
        let root = TempDir::new().unwrap();
        let early = root.path().join("early_stats.tsv");
        let late = root.path().join("late_stats.tsv");
        write_stats(&early, 200);
        write_stats(&late, 2);

        let anachron = root.path().join("x_metadata_candidates");
        let highdist = root.path().join("x_high_distance_clusters");
        write_candidates(&anachron, "anachronistic_metadata_only_candidates.tsv", 4);
        write_candidates(&highdist, "high_distance_candidates.tsv", 0);

        let branch = SearchBranch {
            early_stats: Some(early),
            late_stats: Some(late),
            anachron: Some(anachron),
            highdist: Some(highdist),
            ..SearchBranch::empty("New York", root.path())
        };

        let row = summarize_branch(&branch, FailurePolicy::Lenient).unwrap();
        assert_eq!(row.double.count, Some(2));
        assert_eq!(row.double.prevalence, Some(1.0));
        assert_eq!(row.double.rate, "1 in 100");
        assert_eq!(row.anachronistic.prevalence, Some(2.0));
        assert_eq!(row.anachronistic.rate, "1 in 50");
        assert_eq!(row.high_distance.count, Some(0));
        assert_eq!(row.high_distance.prevalence, Some(0.0));
        assert_eq!(row.high_distance.rate, "None");
    }

    #[test]
    fn test_policy_on_missing_inner_file() {
        let root = TempDir::new().unwrap();
        let branch = SearchBranch {
            highdist: Some(root.path().to_path_buf()),
            ..SearchBranch::empty("Wisconsin", root.path())
        };

        let row = summarize_branch(&branch, FailurePolicy::Lenient).unwrap();
        assert_eq!(row.high_distance.count, None);

        let err = summarize_branch(&branch, FailurePolicy::Strict).unwrap_err();
        assert!(matches!(err, SummaryError::MissingExpectedFile { .. }));
    }

    #[test]
    fn test_rows_sorted_by_geography() {
        let root = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        for name in ["Wisconsin", "Alaska", "New York", "Minnesota"] {
            tree.insert(name.to_string(), SearchBranch::empty(name, root.path()));
        }

        let options = AggregateOptions {
            concurrency: 3,
            ..AggregateOptions::default()
        };
        let report = tokio_test::block_on(compile_summary(&tree, &options)).unwrap();
        let names: Vec<_> = report.rows.iter().map(|r| r.geography.as_str()).collect();

        assert_eq!(names, vec!["Alaska", "Minnesota", "New York", "Wisconsin"]);
        assert_eq!(geographies_without_input(&report).len(), 4);
    }

    #[test]
    fn test_empty_tree_is_empty_report() {
        let tree = SearchTree::new();
        let err = tokio_test::block_on(compile_summary(&tree, &AggregateOptions::default()))
            .unwrap_err();
        assert!(matches!(err, SummaryError::EmptyReport));
    }
}
