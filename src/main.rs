//! ALPINE Summary - cross-geography summarizer for ALPINE results
//!
//! A CLI tool that walks a dated ALPINE results directory, reports input
//! counts and candidate prevalences for every geography, and combines each
//! candidate category's metadata into one Arrow dataset.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad arguments, unreadable results, write failure, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod scanner;
mod table;

use analysis::{AggregateOptions, CombineOptions, FailurePolicy};
use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use models::SearchTree;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // The config file may turn on verbose logging, so load it first
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(log_level(&args, &config));

    info!("ALPINE Summary v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run_summary(&args, &config).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!("Summary failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .alpine-summary.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize prefixes, output format, and more.");
    Ok(())
}

/// Log level from the CLI, falling back to the config file for verbosity.
fn log_level(args: &Args, config: &Config) -> tracing::Level {
    if !args.quiet && config.general.verbose {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    }
}

/// Initialize logging at the given level.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete summary workflow.
async fn run_summary(args: &Args, config: &Config) -> Result<()> {
    let start_time = Instant::now();

    // Step 1: Resolve geographies and locate their artifacts
    if !args.quiet {
        println!("🔍 Scanning results: {}", args.results_dir.display());
    }
    let scan_config = scanner::ScanConfig::from(&config.search);
    let results_scanner = scanner::ResultsScanner::new(args.results_dir.clone(), scan_config);
    let tree = results_scanner
        .scan()
        .with_context(|| format!("Failed to scan {}", args.results_dir.display()))?;

    // Handle --dry-run: show what was found and exit
    if args.dry_run {
        handle_dry_run(&tree);
        return Ok(());
    }

    let policy = if config.general.strict {
        FailurePolicy::Strict
    } else {
        FailurePolicy::Lenient
    };

    let output_dir = PathBuf::from(&config.general.output_dir);
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    // Step 2: Compile run statistics
    if !args.quiet {
        println!("📊 Compiling statistics for {} geographies...", tree.len());
    }
    let aggregate_options = AggregateOptions {
        concurrency: config.general.concurrency,
        policy,
        show_progress: !args.quiet,
    };
    let summary = analysis::compile_summary(&tree, &aggregate_options).await?;

    for geography in analysis::aggregator::geographies_without_input(&summary) {
        warn!("{}: no input sequence count, prevalences left blank", geography);
    }

    // Step 3: Write the summary report
    let summary_path = output_dir.join(config.summary_file_name());
    report::write_report(&summary, config.report.format, &summary_path)?;
    info!("Summary written to {}", summary_path.display());

    // Step 4: Build the combined candidate datasets
    let combined = if config.report.write_combined {
        if !args.quiet {
            println!("🧬 Combining candidate metadata...");
        }
        let combine_options = CombineOptions {
            output_dir: output_dir.clone(),
            policy,
        };
        combine_datasets(tree, combine_options).await?
    } else {
        debug!("Skipping combined datasets");
        Vec::new()
    };

    if args.quiet {
        return Ok(());
    }

    // Print summary
    println!("\n📋 Run Summary:");
    println!("   Geographies: {}", summary.rows.len());
    for category in models::SummaryReport::COLUMN_ORDER {
        println!(
            "   - {}: reported by {} of {}",
            category.report_label(),
            summary.coverage(category),
            summary.rows.len()
        );
    }
    for dataset in &combined {
        match dataset.path {
            Some(ref path) => println!(
                "   📦 {} rows x {} columns from {} geographies -> {}",
                dataset.row_count,
                dataset.columns.len(),
                dataset.geographies.len(),
                path.display()
            ),
            None => println!("   📦 No {} candidates to combine", dataset.category),
        }
    }
    println!("   Duration: {:.1}s", start_time.elapsed().as_secs_f64());
    println!(
        "\n✅ Summary complete! Report saved to: {}",
        summary_path.display()
    );

    Ok(())
}

/// Combine every category off the async runtime.
async fn combine_datasets(
    tree: SearchTree,
    options: CombineOptions,
) -> Result<Vec<analysis::CombinedDataset>> {
    let combined = tokio::task::spawn_blocking(move || analysis::combine_all(&tree, &options))
        .await
        .context("Combining task panicked")??;
    Ok(combined)
}

/// Handle --dry-run: print each geography's artifacts without reading them.
fn handle_dry_run(tree: &SearchTree) {
    println!("\n🔍 Dry run: no artifacts are read and nothing is written.\n");

    for (geography, branch) in tree {
        println!(
            "   📁 {} ({}/5 artifacts) {}",
            geography,
            branch.found_count(),
            branch.parent_dir.display()
        );
        for (label, path) in branch.artifacts() {
            match path {
                Some(path) => println!("      ✔ {}: {}", label, path.display()),
                None => println!("      ✘ {}: not found", label),
            }
        }
    }

    println!("\n   Total: {} geographies", tree.len());
    println!("\n✅ Dry run complete.");
}

/// Load configuration from file or use defaults.
///
/// Looks at an explicit `--config` path, then the current directory, then
/// the results root. Returns the path the config came from, if any.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Ok((Config::load(config_path)?, Some(config_path.clone())));
    }

    // Try default location
    if let Some(config) = Config::load_default()? {
        return Ok((config, Some(PathBuf::from(CONFIG_FILE))));
    }

    if let Some(config) = Config::load_from_results(&args.results_dir)? {
        return Ok((config, Some(args.results_dir.join(CONFIG_FILE))));
    }

    Ok((Config::default(), None))
}
