// src/process/collect.rs
use anyhow::Result;
use arrow::{compute::cast, datatypes::DataType, record_batch::RecordBatch};
use std::path::Path;
use tracing::{info, instrument};
use walkdir::WalkDir;

use crate::process::{
    csv_reader::read_csv,
    excel::read_excel,
    table::{concat_raw_tables, empty_table, replace_column},
    utils::extract_year_from_filename,
    Cell, RawTable,
};
use crate::report::{Outcome, Warning, WarningKind};

/// Which kind of source file a dataset is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFormat {
    /// `.xlsx` / `.xls` / `.xlsm` / `.ods`, reading `sheet` when present.
    Excel { sheet: Option<String> },
    Csv,
}

impl Default for SourceFormat {
    fn default() -> Self {
        SourceFormat::Excel { sheet: None }
    }
}

impl SourceFormat {
    fn matches(&self, file_name: &str) -> bool {
        if file_name.starts_with("~$") || file_name.starts_with('.') {
            return false;
        }
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match (self, ext.as_deref()) {
            (SourceFormat::Excel { .. }, Some("xlsx" | "xls" | "xlsm" | "ods")) => true,
            (SourceFormat::Csv, Some("csv")) => true,
            _ => false,
        }
    }

    fn load(&self, path: &Path) -> Result<Outcome<RawTable>> {
        match self {
            SourceFormat::Excel { sheet } => read_excel(path, sheet.as_deref()),
            SourceFormat::Csv => read_csv(path).map(Outcome::new),
        }
    }
}

/// Load one file and tag every row with its `filename` and `year`.
fn load_tagged(path: &Path, file_name: &str, format: &SourceFormat) -> Result<Outcome<RawTable>> {
    let year = extract_year_from_filename(file_name);
    info!(path = %path.display(), ?year, "processing file");

    let mut out = format.load(path)?;
    out.value
        .set_constant_column("filename", Cell::Text(file_name.to_string()));
    out.value.set_constant_column(
        "year",
        year.map(|y| Cell::Int(i64::from(y))).unwrap_or(Cell::Null),
    );
    Ok(out)
}

/// `year` stays Int64 even when no file name carried one and every cell is null.
fn pin_year_type(batch: RecordBatch) -> Result<RecordBatch> {
    let idx = batch.schema().index_of("year")?;
    if batch.column(idx).data_type() == &DataType::Int64 {
        return Ok(batch);
    }
    let years = cast(batch.column(idx), &DataType::Int64)?;
    replace_column(&batch, idx, years)
}

/// Walk `directory` recursively, load every matching file, and concatenate
/// the results into one normalized table in discovery order.
///
/// Never fails: a missing directory, unreadable or empty files and a run where
/// nothing loads all come back as warnings, with an empty table when no rows
/// were collected.
#[instrument(level = "info", skip(directory, format), fields(dir = %directory.as_ref().display()))]
pub fn collect_files<P: AsRef<Path>>(directory: P, format: &SourceFormat) -> Outcome<RecordBatch> {
    let directory = directory.as_ref();
    let mut warnings = Vec::new();

    if !directory.is_dir() {
        warnings.push(Warning::new(
            WarningKind::MissingInput,
            directory.display().to_string(),
            "directory does not exist",
        ));
        return Outcome::with_warnings(empty_table(), warnings);
    }

    let mut tables = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::SkippedFile,
                    directory.display().to_string(),
                    format!("error walking directory: {}", e),
                ));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !format.matches(&file_name) {
            continue;
        }

        match load_tagged(entry.path(), &file_name, format) {
            Ok(out) if out.value.is_empty() => {
                warnings.extend(out.warnings);
                warnings.push(Warning::new(
                    WarningKind::SkippedFile,
                    entry.path().display().to_string(),
                    "no data rows found",
                ));
            }
            Ok(out) => {
                let table = out.drain_into(&mut warnings);
                info!(file = %file_name, rows = table.rows.len(), columns = ?table.headers, "loaded file");
                tables.push(table);
            }
            Err(e) => warnings.push(Warning::new(
                WarningKind::SkippedFile,
                entry.path().display().to_string(),
                format!("error processing file: {:#}", e),
            )),
        }
    }

    if tables.is_empty() {
        info!("no usable files found");
        return Outcome::with_warnings(empty_table(), warnings);
    }

    match concat_raw_tables(&tables).and_then(pin_year_type) {
        Ok(batch) => {
            info!(files = tables.len(), rows = batch.num_rows(), "combined files");
            Outcome::with_warnings(batch, warnings)
        }
        Err(e) => {
            warnings.push(Warning::new(
                WarningKind::SkippedFile,
                directory.display().to_string(),
                format!("error combining files: {:#}", e),
            ));
            Outcome::with_warnings(empty_table(), warnings)
        }
    }
}
