//! Summary report generation.
//!
//! This module renders the compiled run statistics as a TSV table,
//! a Markdown document, or JSON. Rendering is deterministic: the same
//! report always produces the same bytes.

use crate::cli::OutputFormat;
use crate::models::{CandidateStats, Category, SummaryReport, SummaryRow};
use anyhow::{Context, Result};
use std::path::Path;

/// Placeholder for absent values in Markdown tables.
const MARKDOWN_ABSENT: &str = "-";

/// Render the report in the requested format.
pub fn render_report(report: &SummaryReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Tsv => generate_tsv_report(report),
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json_report(report),
    }
}

/// Write the report to a file.
pub fn write_report(report: &SummaryReport, format: OutputFormat, path: &Path) -> Result<()> {
    let content = render_report(report, format)?;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;

    Ok(())
}

/// Cells of one row, in column order; `None` marks an absent value.
fn row_cells(row: &SummaryRow) -> Vec<Option<String>> {
    let mut cells = vec![
        Some(row.geography.clone()),
        row.input_sequence_count.map(|n| n.to_string()),
    ];
    for category in SummaryReport::COLUMN_ORDER {
        let stats = row.stats(category);
        cells.push(stats.count.map(|n| n.to_string()));
        cells.push(stats.prevalence.map(format_prevalence));
        cells.push(Some(stats.rate.clone()));
    }
    cells
}

/// Full-precision prevalence that always keeps a decimal point (`1.0`, not `1`).
fn format_prevalence(prevalence: f64) -> String {
    let text = prevalence.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}

/// Generate a tab-separated report; absent cells are left empty.
pub fn generate_tsv_report(report: &SummaryReport) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());

    writer.write_record(SummaryReport::columns())?;
    for row in &report.rows {
        let cells = row_cells(row);
        writer.write_record(cells.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush TSV report: {}", e))?;
    String::from_utf8(bytes).context("TSV report is not valid UTF-8")
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &SummaryReport) -> String {
    let mut output = String::new();

    output.push_str("# ALPINE Run Statistics\n\n");
    output.push_str(&generate_overview_section(report));
    output.push_str(&generate_table_section(report));

    output
}

/// Generate the overview section.
fn generate_overview_section(report: &SummaryReport) -> String {
    let mut section = String::new();

    section.push_str("## Overview\n\n");
    section.push_str(&format!("- **Geographies:** {}\n", report.rows.len()));

    let with_input = report
        .rows
        .iter()
        .filter(|row| row.input_sequence_count.is_some())
        .count();
    section.push_str(&format!("- **With input counts:** {}\n", with_input));

    let total_input: u64 = report
        .rows
        .iter()
        .filter_map(|row| row.input_sequence_count)
        .sum();
    section.push_str(&format!("- **Total input sequences:** {}\n\n", total_input));

    section.push_str("| Category | Geographies Reporting | Total Candidates |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for category in SummaryReport::COLUMN_ORDER {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            category.report_label(),
            report.coverage(category),
            category_total(report, category)
        ));
    }
    section.push('\n');

    section
}

fn category_total(report: &SummaryReport, category: Category) -> u64 {
    report
        .rows
        .iter()
        .filter_map(|row| row.stats(category).count)
        .sum()
}

/// Generate the per-geography table.
fn generate_table_section(report: &SummaryReport) -> String {
    let mut section = String::new();
    let columns = SummaryReport::columns();

    section.push_str("## Geographies\n\n");
    section.push_str(&format!("| {} |\n", columns.join(" | ")));
    section.push_str(&format!(
        "|:---|{}\n",
        ":---:|".repeat(columns.len().saturating_sub(1))
    ));

    for row in &report.rows {
        let cells: Vec<String> = markdown_cells(row)
            .into_iter()
            .map(|cell| cell.unwrap_or_else(|| MARKDOWN_ABSENT.to_string()))
            .collect();
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Row cells for Markdown; prevalences are rounded for readability.
fn markdown_cells(row: &SummaryRow) -> Vec<Option<String>> {
    let mut cells = vec![
        Some(row.geography.replace('|', "\\|")),
        row.input_sequence_count.map(|n| n.to_string()),
    ];
    for category in SummaryReport::COLUMN_ORDER {
        cells.extend(markdown_stats(row.stats(category)));
    }
    cells
}

fn markdown_stats(stats: &CandidateStats) -> [Option<String>; 3] {
    [
        stats.count.map(|n| n.to_string()),
        stats.prevalence.map(|p| format!("{:.4}", p)),
        Some(stats.rate.clone()),
    ]
}

/// Generate a JSON report; absent values are `null`.
pub fn generate_json_report(report: &SummaryReport) -> Result<String> {
    serde_json::to_string_pretty(&report.rows).map_err(Into::into)
}
