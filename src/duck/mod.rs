use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, AsArray},
    datatypes::{
        DataType, Date32Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
        Int8Type, TimeUnit, TimestampMicrosecondType,
    },
    record_batch::RecordBatch,
};
use duckdb::{appender_params_from_iter, types::Value, Connection};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info, instrument};

use crate::report::{Outcome, Warning, WarningKind};
use crate::schema::duckdb_type_name;

/// What the writer did with a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Written { rows: usize },
    Skipped,
}

/// One column of a persisted table, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

// Plain SQL type names only, e.g. `INTEGER`, `VARCHAR(20)`, `DECIMAL(10, 2)`.
static SQL_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_ ]*(\(\s*\d+(\s*,\s*\d+)?\s*\))?$").unwrap());

/// Double-quote an identifier for DuckDB.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert one cell of an Arrow column into a DuckDB value.
fn arrow_value(arr: &ArrayRef, row: usize) -> Result<Value> {
    if arr.is_null(row) {
        return Ok(Value::Null);
    }
    let v = match arr.data_type() {
        DataType::Boolean => Value::Boolean(arr.as_boolean().value(row)),
        DataType::Int8 => Value::TinyInt(arr.as_primitive::<Int8Type>().value(row)),
        DataType::Int16 => Value::SmallInt(arr.as_primitive::<Int16Type>().value(row)),
        DataType::Int32 => Value::Int(arr.as_primitive::<Int32Type>().value(row)),
        DataType::Int64 => Value::BigInt(arr.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => Value::Float(arr.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Double(arr.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(arr.as_string::<i32>().value(row).to_string()),
        DataType::Date32 => Value::Date32(arr.as_primitive::<Date32Type>().value(row)),
        DataType::Timestamp(TimeUnit::Microsecond, _) => Value::Timestamp(
            duckdb::types::TimeUnit::Microsecond,
            arr.as_primitive::<TimestampMicrosecondType>().value(row),
        ),
        other => return Err(anyhow!("unsupported column type {:?}", other)),
    };
    Ok(v)
}

/// Handle on the analytical store. The connection closes when the store is
/// dropped, so every exit path releases the database file.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    /// Open a DuckDB in‐memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory DuckDB")?;
        Ok(Self { conn })
    }

    pub fn execute(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .with_context(|| format!("executing `{}`", sql))
    }

    /// Close explicitly, surfacing any error the implicit drop would swallow.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("closing DuckDB: {}", e))
    }

    #[cfg(test)]
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    /// Replace `table` with the contents of `batch`: drop, create, append,
    /// inside one transaction.
    #[instrument(level = "info", skip(self, batch), fields(rows = batch.num_rows()))]
    pub fn replace_table(&mut self, table: &str, batch: &RecordBatch) -> Result<usize> {
        let schema = batch.schema();
        let column_defs: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), duckdb_type_name(f.data_type())))
            .collect();
        let ident = quote_ident(table);

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", ident))
            .with_context(|| format!("dropping {}", table))?;
        tx.execute_batch(&format!("CREATE TABLE {} ({})", ident, column_defs.join(", ")))
            .with_context(|| format!("creating {}", table))?;
        {
            let mut appender = tx
                .appender(table)
                .with_context(|| format!("opening appender on {}", table))?;
            for row in 0..batch.num_rows() {
                let values = batch
                    .columns()
                    .iter()
                    .map(|col| arrow_value(col, row))
                    .collect::<Result<Vec<Value>>>()?;
                appender
                    .append_row(appender_params_from_iter(values))
                    .with_context(|| format!("appending row {} to {}", row, table))?;
            }
            appender.flush()?;
        }
        tx.commit().with_context(|| format!("committing {}", table))?;

        debug!(table, columns = column_defs.len(), "table recreated");
        Ok(batch.num_rows())
    }

    /// Retype persisted columns with `ALTER TABLE ... ALTER COLUMN ... TYPE`.
    /// Each column is tried on its own; failures become warnings.
    pub fn alter_column_types(
        &self,
        table: &str,
        sql_types: &BTreeMap<String, String>,
    ) -> Outcome<()> {
        let mut warnings = Vec::new();
        let existing: Vec<String> = match self.table_info(table) {
            Ok(cols) => cols.into_iter().map(|c| c.name).collect(),
            Err(e) => {
                warnings.push(Warning::new(
                    WarningKind::PersistenceFailed,
                    table,
                    format!("reading schema: {:#}", e),
                ));
                return Outcome::with_warnings((), warnings);
            }
        };

        for (column, sql_type) in sql_types {
            let subject = format!("{}.{}", table, column);
            if !existing.contains(column) {
                warnings.push(Warning::new(
                    WarningKind::ColumnMissing,
                    subject,
                    "column not found in data, skipping",
                ));
                continue;
            }
            if !SQL_TYPE_RE.is_match(sql_type.trim()) {
                warnings.push(Warning::new(
                    WarningKind::PersistenceFailed,
                    subject,
                    format!("`{}` is not a plain SQL type", sql_type),
                ));
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
                quote_ident(table),
                quote_ident(column),
                sql_type.trim()
            );
            match self.execute(&sql) {
                Ok(()) => info!(table, column = %column, ty = %sql_type, "set column type"),
                Err(e) => warnings.push(Warning::new(
                    WarningKind::PersistenceFailed,
                    subject,
                    format!("error altering column: {:#}", e),
                )),
            }
        }
        Outcome::with_warnings((), warnings)
    }

    /// Column names and DuckDB types of `table`, in ordinal order.
    pub fn table_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_name = ? ORDER BY ordinal_position",
        )?;
        let cols = stmt
            .query_map([table], |r| {
                Ok(ColumnInfo {
                    name: r.get(0)?,
                    data_type: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if cols.is_empty() {
            return Err(anyhow!("table `{}` does not exist", table));
        }
        Ok(cols)
    }

    fn fetch(&self, table: &str, limit: Option<usize>) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        let names: Vec<String> = self.table_info(table)?.into_iter().map(|c| c.name).collect();
        let mut sql = format!("SELECT * FROM {}", quote_ident(table));
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..names.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(values);
        }
        Ok((names, out))
    }

    /// The first `limit` rows of `table` with its column names.
    pub fn preview(&self, table: &str, limit: usize) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        self.fetch(table, Some(limit))
    }

    /// Every row of `table` with its column names.
    pub fn fetch_all(&self, table: &str) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
        self.fetch(table, None)
    }
}

/// Render a DuckDB value for logs and terminal previews.
pub fn render_value(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::TinyInt(i) => i.to_string(),
        Value::SmallInt(i) => i.to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Date32(d) => d
            .checked_add(719_163)
            .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
            .map(|d| d.to_string())
            .unwrap_or_else(|| d.to_string()),
        other => format!("{:?}", other),
    }
}

/// Persist `batch` as `table` in the database at `db_path`, replacing any
/// previous table of that name. An empty batch is not written.
///
/// The store is opened and closed inside this call.
#[instrument(level = "info", skip(batch, db_path), fields(db = %db_path.as_ref().display()))]
pub fn save_table<P: AsRef<Path>>(
    batch: &RecordBatch,
    db_path: P,
    table: &str,
) -> Result<Outcome<WriteStatus>> {
    if batch.num_rows() == 0 {
        let w = Warning::new(WarningKind::EmptyTable, table, "no data to save");
        return Ok(Outcome::with_warnings(WriteStatus::Skipped, vec![w]));
    }

    let mut store = Store::open(db_path)?;
    let rows = store.replace_table(table, batch)?;
    store.close()?;
    info!(table, rows, "data saved to DuckDB");
    Ok(Outcome::new(WriteStatus::Written { rows }))
}
