//! Results scanner for discovering geographies and their artifacts.
//!
//! This module walks an ALPINE results root, resolves one geography per
//! subdirectory, and records where each geography's candidate directories
//! and statistics files live.

pub mod geography;

use crate::error::SummaryResult;
use crate::models::{SearchBranch, SearchTree};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

pub use geography::{resolve_geographies, DEFAULT_PREFIXES};

/// Directory name suffix for double candidates.
pub const DOUBLE_PATTERN: &str = "double_candidates";
/// Directory name suffix for anachronistic metadata candidates.
pub const ANACHRON_PATTERN: &str = "metadata_candidates";
/// Directory name suffix for high distance clusters.
pub const HIGHDIST_PATTERN: &str = "high_distance_clusters";
/// Early-stage statistics file name.
pub const EARLY_STATS_PATTERN: &str = "early_stats.tsv";
/// Late-stage statistics file name.
pub const LATE_STATS_PATTERN: &str = "late_stats.tsv";

/// Configuration for results scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Dataset prefixes stripped from directory names
    pub prefixes: Vec<String>,
    /// Maximum depth searched below each geography directory
    pub max_depth: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            max_depth: None,
        }
    }
}

impl From<&crate::config::SearchConfig> for ScanConfig {
    fn from(config: &crate::config::SearchConfig) -> Self {
        Self {
            prefixes: config.prefixes.clone(),
            max_depth: config.max_depth,
        }
    }
}

/// Scanner over one results root.
pub struct ResultsScanner {
    config: ScanConfig,
    results_root: PathBuf,
}

impl ResultsScanner {
    /// Create a new results scanner.
    pub fn new(results_root: PathBuf, config: ScanConfig) -> Self {
        Self {
            config,
            results_root,
        }
    }

    /// Resolve geographies and build the search tree in one step.
    pub fn scan(&self) -> SummaryResult<SearchTree> {
        let geographies = resolve_geographies(&self.results_root, &self.config.prefixes)?;
        info!(
            "Found {} geographies in {}",
            geographies.len(),
            self.results_root.display()
        );
        Ok(self.build_search_tree(&geographies))
    }

    /// Build one branch per geography.
    pub fn build_search_tree(&self, geographies: &BTreeMap<String, PathBuf>) -> SearchTree {
        geographies
            .iter()
            .map(|(geography, dir)| (geography.clone(), self.search_branch(geography, dir)))
            .collect()
    }

    /// Locate every artifact under a geography's directory.
    ///
    /// The walk is sorted by file name and the first match of each pattern
    /// wins. Symlinks are matched by their target's type, so published
    /// links count as artifacts. Artifacts that are not found stay `None`.
    pub fn search_branch(&self, geography: &str, dir: &Path) -> SearchBranch {
        let mut branch = SearchBranch::empty(geography, dir);

        let mut walker = WalkDir::new(dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        for entry in walker.into_iter().filter_entry(|e| !is_hidden(e)) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Cannot read entry under {}: {}", dir.display(), e);
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy();
            let file_type = entry.file_type();

            let slot = if file_type.is_dir() {
                if name.ends_with(DOUBLE_PATTERN) {
                    &mut branch.double
                } else if name.ends_with(ANACHRON_PATTERN) {
                    &mut branch.anachron
                } else if name.ends_with(HIGHDIST_PATTERN) {
                    &mut branch.highdist
                } else {
                    continue;
                }
            } else if file_type.is_file() {
                if name.ends_with(EARLY_STATS_PATTERN) {
                    &mut branch.early_stats
                } else if name.ends_with(LATE_STATS_PATTERN) {
                    &mut branch.late_stats
                } else {
                    continue;
                }
            } else {
                continue;
            };

            if slot.is_none() {
                *slot = Some(entry.into_path());
            }
        }

        debug!(
            "Geography '{}': {} of 5 artifacts found",
            geography,
            branch.found_count()
        );

        branch
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
