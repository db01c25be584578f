//! Geography discovery.
//!
//! Every immediate subdirectory of a results root is one ALPINE run. Its
//! name carries a dataset prefix and underscores in place of spaces.

use crate::error::{SummaryError, SummaryResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Dataset prefixes ALPINE puts in front of geography names.
pub const DEFAULT_PREFIXES: [&str; 3] = ["GISAID_", "LocalDataset_", "GenBank_"];

/// Turn a results directory name into a geography label.
///
/// Each prefix is removed once if the name starts with it, then every
/// underscore becomes a space.
pub fn clean_label(dir_name: &str, prefixes: &[String]) -> String {
    let mut name = dir_name;
    for prefix in prefixes {
        if let Some(rest) = name.strip_prefix(prefix.as_str()) {
            name = rest;
        }
    }

    if name.is_empty() {
        return dir_name.to_string();
    }
    name.replace('_', " ")
}

/// Map each geography label to its results directory.
///
/// Hidden directories are ignored. Two directories with the same label are
/// rejected rather than one silently replacing the other.
pub fn resolve_geographies(
    results_root: &Path,
    prefixes: &[String],
) -> SummaryResult<BTreeMap<String, PathBuf>> {
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(results_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            debug!("Skipping hidden entry {}", name);
            continue;
        }

        if entry.path().is_dir() {
            subdirs.push((name, entry.path()));
        }
    }

    if subdirs.is_empty() {
        return Err(SummaryError::NoSubdirectories(results_root.to_path_buf()));
    }

    // read_dir order is platform dependent
    subdirs.sort();

    let mut geographies: BTreeMap<String, PathBuf> = BTreeMap::new();
    for (name, path) in subdirs {
        let label = clean_label(&name, prefixes);

        if let Some(existing) = geographies.get(&label) {
            warn!(
                "Geography '{}' found in both {} and {}",
                label,
                existing.display(),
                path.display()
            );
            return Err(SummaryError::LabelCollision {
                label,
                first: existing.clone(),
                second: path,
            });
        }

        debug!("Resolved {} -> '{}'", name, label);
        geographies.insert(label, path);
    }

    if geographies.is_empty() {
        return Err(SummaryError::NoValidGeographies(results_root.to_path_buf()));
    }

    Ok(geographies)
}
