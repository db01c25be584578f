//! Cross-geography candidate datasets.
//!
//! For each candidate category, every geography's metadata table is tagged
//! with a `Geography` column and appended to a scratch TSV. The scratch file
//! is then converted into one zstd-compressed Arrow IPC file.

use crate::analysis::aggregator::{apply_policy, FailurePolicy};
use crate::error::{SummaryError, SummaryResult};
use crate::models::{Category, SearchTree, GEOGRAPHY_COLUMN};
use crate::table;
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::ipc::writer::{FileWriter, IpcWriteOptions};
use arrow::ipc::CompressionType;
use arrow::record_batch::RecordBatch;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Rows per Arrow record batch.
const BATCH_ROWS: usize = 8192;

/// Options for building combined datasets.
#[derive(Debug, Clone)]
pub struct CombineOptions {
    /// Directory receiving the Arrow files
    pub output_dir: PathBuf,
    pub policy: FailurePolicy,
}

/// Outcome of combining one category.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedDataset {
    pub category: Category,
    /// Output columns, `Geography` included.
    pub columns: Vec<String>,
    pub row_count: u64,
    /// Geographies that contributed a table, in order.
    pub geographies: Vec<String>,
    /// Written Arrow file; `None` when no geography contributed.
    pub path: Option<PathBuf>,
}

/// Inferred Arrow type of a scratch column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Int64,
    Float64,
    Utf8,
}

impl ColumnType {
    fn widen(self, value: &str) -> Self {
        match self {
            ColumnType::Int64 if value.parse::<i64>().is_ok() => ColumnType::Int64,
            ColumnType::Int64 | ColumnType::Float64 if value.parse::<f64>().is_ok() => {
                ColumnType::Float64
            }
            _ => ColumnType::Utf8,
        }
    }

    fn data_type(self) -> DataType {
        match self {
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
        }
    }
}

/// Build all three combined datasets.
pub fn combine_all(
    tree: &SearchTree,
    options: &CombineOptions,
) -> SummaryResult<Vec<CombinedDataset>> {
    Category::ALL
        .iter()
        .map(|category| combine_category(tree, *category, options))
        .collect()
}

/// Build the combined dataset for one category.
pub fn combine_category(
    tree: &SearchTree,
    category: Category,
    options: &CombineOptions,
) -> SummaryResult<CombinedDataset> {
    // Removed on drop, including on every error path below
    let scratch = tempfile::Builder::new()
        .prefix(&format!("alpine-{}-", category))
        .tempdir()?;
    let scratch_path = scratch.path().join("combined.tsv");

    let mut out = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&scratch_path)
        .map_err(|source| scratch_error(&scratch_path, source))?;
    let mut expected: Option<Vec<String>> = None;
    let mut columns: Vec<String> = Vec::new();
    let mut geographies = Vec::new();
    let mut row_count = 0u64;

    for (geography, branch) in tree {
        let Some(dir) = category.directory(branch) else {
            continue;
        };
        let path = dir.join(category.metadata_file());
        let read = if path.is_file() {
            table::read_table(&path).map(Some)
        } else {
            Err(SummaryError::MissingExpectedFile {
                dir: dir.to_path_buf(),
                file: category.metadata_file().to_string(),
            })
        };

        let Some(metadata) = apply_policy(
            read,
            options.policy,
            geography,
            &format!("{} metadata", category),
        )?
        else {
            continue;
        };

        if expected.is_none() {
            columns = tagged_columns(&metadata.columns);
            out.write_record(&columns)
                .map_err(|source| scratch_error(&scratch_path, source))?;
            expected = Some(metadata.columns.clone());
        } else if expected.as_ref() != Some(&metadata.columns) {
            return Err(SummaryError::SchemaDrift {
                category: category.to_string(),
                geography: geography.clone(),
                expected: expected.unwrap_or_default(),
                found: metadata.columns,
            });
        }

        let geography_index = metadata.column_index(GEOGRAPHY_COLUMN);
        for row in &metadata.rows {
            let tagged = tag_row(row, geography, geography_index);
            out.write_record(&tagged)
                .map_err(|source| scratch_error(&scratch_path, source))?;
        }

        debug!(
            "{}: appended {} {} rows",
            geography,
            metadata.row_count(),
            category
        );
        row_count += metadata.row_count() as u64;
        geographies.push(geography.clone());
    }

    out.flush()?;
    drop(out);

    let output = options.output_dir.join(category.dataset_file());

    if expected.is_none() {
        info!("No {} metadata found in any geography", category);
        // only this run's datasets may remain in the output directory
        if output.is_file() {
            warn!("Removing stale {}", output.display());
            std::fs::remove_file(&output)?;
        }
        return Ok(CombinedDataset {
            category,
            columns,
            row_count: 0,
            geographies,
            path: None,
        });
    }

    write_arrow(&scratch_path, &columns, &output)?;

    info!(
        "Wrote {} {} rows from {} geographies to {}",
        row_count,
        category,
        geographies.len(),
        output.display()
    );

    Ok(CombinedDataset {
        category,
        columns,
        row_count,
        geographies,
        path: Some(output),
    })
}

/// Source columns plus `Geography`, unless the source already has one.
fn tagged_columns(source: &[String]) -> Vec<String> {
    let mut columns = source.to_vec();
    if !columns.iter().any(|c| c == GEOGRAPHY_COLUMN) {
        columns.push(GEOGRAPHY_COLUMN.to_string());
    }
    columns
}

fn tag_row(row: &StringRecord, geography: &str, geography_index: Option<usize>) -> Vec<String> {
    let mut tagged: Vec<String> = row.iter().map(String::from).collect();
    match geography_index {
        Some(index) => tagged[index] = geography.to_string(),
        None => tagged.push(geography.to_string()),
    }
    tagged
}

fn scratch_error(path: &Path, source: csv::Error) -> SummaryError {
    SummaryError::Table {
        path: path.to_path_buf(),
        source,
    }
}

fn scratch_reader(path: &Path) -> SummaryResult<csv::Reader<File>> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .map_err(|source| scratch_error(path, source))
}

/// Infer one type per column from every non-empty cell.
fn infer_types(path: &Path, columns: &[String]) -> SummaryResult<Vec<ColumnType>> {
    let mut types = vec![ColumnType::Int64; columns.len()];
    let mut seen = vec![false; columns.len()];

    let mut reader = scratch_reader(path)?;
    let mut record = StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|source| scratch_error(path, source))?
    {
        for (i, value) in record.iter().enumerate() {
            if !value.is_empty() {
                seen[i] = true;
                types[i] = types[i].widen(value);
            }
        }
    }

    for (i, column) in columns.iter().enumerate() {
        if !seen[i] || column == GEOGRAPHY_COLUMN {
            types[i] = ColumnType::Utf8;
        }
    }

    Ok(types)
}

/// Convert the scratch TSV into a compressed Arrow IPC file.
fn write_arrow(scratch: &Path, columns: &[String], output: &Path) -> SummaryResult<()> {
    let types = infer_types(scratch, columns)?;
    let schema: SchemaRef = Arc::new(Schema::new(
        columns
            .iter()
            .zip(&types)
            .map(|(name, ty)| Field::new(name, ty.data_type(), true))
            .collect::<Vec<_>>(),
    ));

    let options = IpcWriteOptions::default().try_with_compression(Some(CompressionType::ZSTD))?;
    let file = File::create(output)?;
    let mut writer = FileWriter::try_new_with_options(file, &schema, options)?;

    let mut reader = scratch_reader(scratch)?;
    let mut batch = Vec::with_capacity(BATCH_ROWS);
    for record in reader.records() {
        batch.push(record.map_err(|source| scratch_error(scratch, source))?);
        if batch.len() == BATCH_ROWS {
            writer.write(&build_batch(&schema, &types, &batch)?)?;
            batch.clear();
        }
    }
    if !batch.is_empty() {
        writer.write(&build_batch(&schema, &types, &batch)?)?;
    }

    writer.finish()?;
    Ok(())
}

fn build_batch(
    schema: &SchemaRef,
    types: &[ColumnType],
    rows: &[StringRecord],
) -> SummaryResult<RecordBatch> {
    let cell = |row: &StringRecord, i: usize| {
        row.get(i)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let arrays: Vec<ArrayRef> = types
        .iter()
        .enumerate()
        .map(|(i, ty)| -> ArrayRef {
            match ty {
                ColumnType::Int64 => {
                    let mut builder = Int64Builder::with_capacity(rows.len());
                    for row in rows {
                        builder.append_option(cell(row, i).and_then(|v| v.parse().ok()));
                    }
                    Arc::new(builder.finish())
                }
                ColumnType::Float64 => {
                    let mut builder = Float64Builder::with_capacity(rows.len());
                    for row in rows {
                        builder.append_option(cell(row, i).and_then(|v| v.parse().ok()));
                    }
                    Arc::new(builder.finish())
                }
                ColumnType::Utf8 => {
                    let mut builder = StringBuilder::new();
                    for row in rows {
                        builder.append_option(cell(row, i));
                    }
                    Arc::new(builder.finish())
                }
            }
        })
        .collect();

    Ok(RecordBatch::try_new(schema.clone(), arrays)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchBranch;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::ipc::reader::FileReader;
    use std::fs;
    use tempfile::TempDir;

    fn add_geography(root: &Path, tree: &mut SearchTree, name: &str, content: Option<&str>) {
        let dir = root.join(name).join("run_metadata_candidates");
        fs::create_dir_all(&dir).unwrap();
        if let Some(content) = content {
            fs::write(dir.join("anachronistic_metadata_only_candidates.tsv"), content).unwrap();
        }
        let branch = SearchBranch {
            anachron: Some(dir),
            ..SearchBranch::empty(name, root.join(name))
        };
        tree.insert(name.to_string(), branch);
    }

    fn read_batches(path: &Path) -> Vec<RecordBatch> {
        let reader = FileReader::try_new(File::open(path).unwrap(), None).unwrap();
        reader.map(|batch| batch.unwrap()).collect()
    }

    fn options(dir: &TempDir) -> CombineOptions {
        CombineOptions {
            output_dir: dir.path().to_path_buf(),
            policy: FailurePolicy::Lenient,
        }
    }

    #[test]
    fn test_two_geographies_three_rows_each() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        let table = "strain\tdate\tcount\nA\t2021-01-01\t1\nB\t2021-01-02\t2\nC\t2021-01-03\t3\n";
        add_geography(root.path(), &mut tree, "Wisconsin", Some(table));
        add_geography(root.path(), &mut tree, "New York", Some(table));

        let dataset = combine_category(&tree, Category::Anachronistic, &options(&out)).unwrap();

        assert_eq!(dataset.row_count, 6);
        assert_eq!(dataset.columns, vec!["strain", "date", "count", "Geography"]);
        assert_eq!(dataset.geographies, vec!["New York", "Wisconsin"]);

        let path = dataset.path.unwrap();
        assert_eq!(path, out.path().join("anachronistics-meta.arrow"));

        let batches = read_batches(&path);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 6);
        assert_eq!(batch.schema().field(2).data_type(), &DataType::Int64);

        let geography = batch
            .column(3)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(geography.value(0), "New York");
        assert_eq!(geography.value(5), "Wisconsin");
        assert_eq!(geography.null_count(), 0);

        let counts = batch
            .column(2)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(counts.value(4), 2);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        add_geography(root.path(), &mut tree, "Wisconsin", Some("strain\nA\n"));
        add_geography(root.path(), &mut tree, "Alaska", None);
        tree.insert(
            "Ohio".to_string(),
            SearchBranch::empty("Ohio", root.path().join("Ohio")),
        );

        let dataset = combine_category(&tree, Category::Anachronistic, &options(&out)).unwrap();
        assert_eq!(dataset.row_count, 1);
        assert_eq!(dataset.geographies, vec!["Wisconsin"]);
    }

    #[test]
    fn test_missing_file_is_fatal_when_strict() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        add_geography(root.path(), &mut tree, "Alaska", None);

        let strict = CombineOptions {
            policy: FailurePolicy::Strict,
            ..options(&out)
        };
        let err = combine_category(&tree, Category::Anachronistic, &strict).unwrap_err();
        assert!(matches!(err, SummaryError::MissingExpectedFile { .. }));
    }

    #[test]
    fn test_no_contributors_writes_nothing() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        add_geography(root.path(), &mut tree, "Wisconsin", Some("strain\nA\n"));

        let dataset = combine_category(&tree, Category::Double, &options(&out)).unwrap();
        assert!(dataset.path.is_none());
        assert!(!out.path().join("double-meta.arrow").exists());
    }

    #[test]
    fn test_stale_dataset_is_removed() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let stale = out.path().join("double-meta.arrow");
        fs::write(&stale, "left over from an earlier run").unwrap();

        let mut tree = SearchTree::new();
        add_geography(root.path(), &mut tree, "Wisconsin", Some("strain\nA\n"));

        let dataset = combine_category(&tree, Category::Double, &options(&out)).unwrap();
        assert!(dataset.path.is_none());
        assert!(!stale.exists());
    }

    #[test]
    fn test_schema_drift_is_rejected() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        add_geography(root.path(), &mut tree, "Alaska", Some("strain\tdate\nA\t2021\n"));
        add_geography(root.path(), &mut tree, "Wisconsin", Some("strain\tlineage\nB\tBA.2\n"));

        let err = combine_category(&tree, Category::Anachronistic, &options(&out)).unwrap_err();
        match err {
            SummaryError::SchemaDrift { geography, .. } => assert_eq!(geography, "Wisconsin"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_existing_geography_column_is_overwritten() {
        let root = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let mut tree = SearchTree::new();
        add_geography(
            root.path(),
            &mut tree,
            "Wisconsin",
            Some("strain\tGeography\nA\tUSA\n"),
        );

        let dataset = combine_category(&tree, Category::Anachronistic, &options(&out)).unwrap();
        assert_eq!(dataset.columns, vec!["strain", "Geography"]);

        let batches = read_batches(&dataset.path.unwrap());
        let geography = batches[0]
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(geography.value(0), "Wisconsin");
    }

    #[test]
    fn test_column_type_widening() {
        assert_eq!(ColumnType::Int64.widen("12"), ColumnType::Int64);
        assert_eq!(ColumnType::Int64.widen("1.5"), ColumnType::Float64);
        assert_eq!(ColumnType::Float64.widen("3"), ColumnType::Float64);
        assert_eq!(ColumnType::Float64.widen("BA.2"), ColumnType::Utf8);
        assert_eq!(ColumnType::Utf8.widen("7"), ColumnType::Utf8);
    }
}
