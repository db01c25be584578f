//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ALPINE Summary - summarize ALPINE results across geographies
///
/// Reads every geography's results directory under a results root, writes
/// a table of input counts and candidate prevalences, and combines each
/// candidate category's metadata into one Arrow dataset.
///
/// Examples:
///   alpine-summary -d ~/results/20230601
///   alpine-summary -d ~/results/20230601 --format markdown -o reports/
///   alpine-summary -d ~/results/20230601 --dry-run
///   alpine-summary --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Results root containing one directory per geography
    ///
    /// Usually a directory named with a YYYYMMDD-formatted date.
    #[arg(
        short = 'd',
        long,
        default_value = ".",
        value_name = "DIR",
        visible_alias = "results_dir"
    )]
    pub results_dir: PathBuf,

    /// Directory for the summary report and combined datasets
    ///
    /// Defaults to the current directory or the config file setting.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Summary report format (tsv, markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .alpine-summary.toml in the current
    /// directory, then in the results root.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of geographies read concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Maximum directory depth searched inside each geography
    #[arg(long, value_name = "DEPTH")]
    pub max_depth: Option<usize>,

    /// Abort on unreadable artifacts instead of reporting them as missing
    #[arg(long)]
    pub strict: bool,

    /// Skip building the combined candidate datasets
    #[arg(long)]
    pub no_combined: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: list geographies and the artifacts found, then exit
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .alpine-summary.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the summary report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Tab-separated table, opens in any spreadsheet (default)
    #[default]
    Tsv,
    /// Markdown table with an overview
    Markdown,
    /// JSON array of rows
    Json,
}

impl OutputFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tsv => "tsv",
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if !self.results_dir.exists() {
            return Err(format!(
                "Results directory does not exist: {}",
                self.results_dir.display()
            ));
        }
        if !self.results_dir.is_dir() {
            return Err(format!(
                "Results path is not a directory: {}",
                self.results_dir.display()
            ));
        }

        if let Some(ref output_dir) = self.output_dir {
            if output_dir.exists() && !output_dir.is_dir() {
                return Err(format!(
                    "Output path is not a directory: {}",
                    output_dir.display()
                ));
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.max_depth == Some(0) {
            return Err("Max depth must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_args(results_dir: PathBuf) -> Args {
        Args {
            results_dir,
            output_dir: None,
            format: None,
            config: None,
            concurrency: None,
            max_depth: None,
            strict: false,
            no_combined: false,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        let dir = TempDir::new().unwrap();
        assert!(make_args(dir.path().to_path_buf()).validate().is_ok());
    }

    #[test]
    fn test_validation_missing_results_dir() {
        let args = make_args(PathBuf::from("/nonexistent/results/20230601"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_results_dir_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("stats.tsv");
        std::fs::write(&file, "").unwrap();
        assert!(make_args(file).validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path().to_path_buf());
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path().to_path_buf());
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args(PathBuf::from("/nonexistent"));
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let dir = TempDir::new().unwrap();
        let mut args = make_args(dir.path().to_path_buf());
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::parse_from(["alpine-summary", "-d", "/data/20230601", "--format", "json"]);
        assert_eq!(args.results_dir, PathBuf::from("/data/20230601"));
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(OutputFormat::Markdown.extension(), "md");
    }
}
