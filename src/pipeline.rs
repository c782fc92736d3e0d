// src/pipeline.rs

use anyhow::Result;
use std::{collections::BTreeMap, path::Path};
use tracing::{error, info, instrument};

use crate::config::{DatasetConfig, PipelineConfig};
use crate::duck::{render_value, save_table, Store, WriteStatus};
use crate::process::{collect_files, convert_time_to_seconds, enforce_column_types};
use crate::report::{Warning, WarningKind};

const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetStatus {
    Written { rows: usize },
    Skipped,
    Failed(String),
}

#[derive(Debug)]
pub struct DatasetReport {
    pub table: String,
    pub status: DatasetStatus,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub datasets: Vec<DatasetReport>,
}

impl RunReport {
    pub fn failed(&self) -> impl Iterator<Item = &DatasetReport> {
        self.datasets
            .iter()
            .filter(|d| matches!(d.status, DatasetStatus::Failed(_)))
    }
}

/// Log the persisted schema and the first rows, the way an operator checks a load.
fn log_persisted(db_path: &Path, table: &str) -> Result<()> {
    let store = Store::open(db_path)?;
    for col in store.table_info(table)? {
        info!(table, column = %col.name, ty = %col.data_type, "schema");
    }
    let (names, rows) = store.preview(table, PREVIEW_ROWS)?;
    info!(table, "preview: {}", names.join(" | "));
    for row in rows {
        let line: Vec<String> = row.iter().map(render_value).collect();
        info!(table, "preview: {}", line.join(" | "));
    }
    store.close()
}

fn open_and_alter(
    db_path: &Path,
    table: &str,
    sql_types: &BTreeMap<String, String>,
    warnings: &mut Vec<Warning>,
) -> Result<()> {
    let store = Store::open(db_path)?;
    store
        .alter_column_types(table, sql_types)
        .drain_into(warnings);
    store.close()
}

/// Retype columns of an already committed table. Store errors become
/// `PersistenceFailed` warnings and never undo the write.
fn apply_sql_types(
    db_path: &Path,
    table: &str,
    sql_types: &BTreeMap<String, String>,
    warnings: &mut Vec<Warning>,
) {
    if let Err(e) = open_and_alter(db_path, table, sql_types, warnings) {
        warnings.push(Warning::new(
            WarningKind::PersistenceFailed,
            table,
            format!("error applying column types: {:#}", e),
        ));
    }
}

fn process_dataset(
    ds: &DatasetConfig,
    db_path: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<DatasetStatus> {
    let mut batch = collect_files(&ds.directory, &ds.source_format()).drain_into(warnings);

    // nothing collected: skip straight to the writer, which reports the empty table
    if batch.num_rows() > 0 {
        for column in ds.normalized_time_columns() {
            batch = convert_time_to_seconds(batch, &column).drain_into(warnings);
        }

        let mapping = ds.normalized_column_types();
        if !mapping.is_empty() {
            batch = enforce_column_types(batch, &mapping).drain_into(warnings);
        }
    }

    let status = match save_table(&batch, db_path, &ds.table)?.drain_into(warnings) {
        WriteStatus::Skipped => return Ok(DatasetStatus::Skipped),
        WriteStatus::Written { rows } => DatasetStatus::Written { rows },
    };

    let sql_types = ds.normalized_sql_types();
    if !sql_types.is_empty() {
        apply_sql_types(db_path, &ds.table, &sql_types, warnings);
    }

    if let Err(e) = log_persisted(db_path, &ds.table) {
        error!(table = %ds.table, "could not inspect persisted table: {:#}", e);
    }
    Ok(status)
}

/// Run one dataset end to end: collect → time conversion → type enforcement
/// → full-replace write → optional column retyping.
#[instrument(level = "info", skip(ds, db_path), fields(table = %ds.table, dir = %ds.directory.display()))]
pub fn run_dataset(ds: &DatasetConfig, db_path: &Path) -> DatasetReport {
    let mut warnings = Vec::new();
    let status = match process_dataset(ds, db_path, &mut warnings) {
        Ok(status) => status,
        Err(e) => {
            error!(table = %ds.table, "dataset failed: {:#}", e);
            DatasetStatus::Failed(format!("{:#}", e))
        }
    };
    info!(table = %ds.table, ?status, warnings = warnings.len(), "dataset done");
    DatasetReport {
        table: ds.table.clone(),
        status,
        warnings,
    }
}

/// Run every configured dataset in order. A failing dataset never stops the
/// ones after it.
pub fn run(config: &PipelineConfig) -> RunReport {
    info!(
        datasets = config.datasets.len(),
        db = %config.db_path.display(),
        "starting pipeline"
    );
    let datasets = config
        .datasets
        .iter()
        .map(|ds| run_dataset(ds, &config.db_path))
        .collect();
    RunReport { datasets }
}
