//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.alpine-summary.toml` files.

use crate::cli::OutputFormat;
use crate::scanner::DEFAULT_PREFIXES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up by default.
pub const CONFIG_FILE: &str = ".alpine-summary.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Results search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory receiving all outputs.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of geographies read concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Abort on unreadable artifacts instead of reporting them as missing.
    #[serde(default)]
    pub strict: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
            concurrency: default_concurrency(),
            strict: false,
        }
    }
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Results search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Dataset prefixes stripped from geography directory names.
    #[serde(default = "default_prefixes")]
    pub prefixes: Vec<String>,

    /// Maximum depth searched inside each geography (unbounded if unset).
    #[serde(default)]
    pub max_depth: Option<usize>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            prefixes: default_prefixes(),
            max_depth: None,
        }
    }
}

fn default_prefixes() -> Vec<String> {
    DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Summary report format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Summary file name without extension.
    #[serde(default = "default_summary_name")]
    pub summary_name: String,

    /// Build the combined candidate datasets.
    #[serde(default = "default_true")]
    pub write_combined: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            summary_name: default_summary_name(),
            write_combined: true,
        }
    }
}

fn default_summary_name() -> String {
    "alpine_run_statistics".to_string()
}

fn default_true() -> bool {
    true
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

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Try to load configuration stored alongside a results root.
    pub fn load_from_results(results_dir: &Path) -> Result<Option<Self>> {
        let config_path = results_dir.join(CONFIG_FILE);

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
        if let Some(ref output_dir) = args.output_dir {
            self.general.output_dir = output_dir.to_string_lossy().to_string();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(max_depth) = args.max_depth {
            self.search.max_depth = Some(max_depth);
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }

        // Flags only ever switch behavior on
        if args.strict {
            self.general.strict = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
        if args.no_combined {
            self.report.write_combined = false;
        }
    }

    /// File name of the summary report, including extension.
    pub fn summary_file_name(&self) -> String {
        format!(
            "{}.{}",
            self.report.summary_name,
            self.report.format.extension()
        )
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
