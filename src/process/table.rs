use anyhow::{Context, Result};
use arrow::{
    array::{
        ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
        TimestampMicrosecondBuilder,
    },
    datatypes::{DataType, Field, Schema, TimeUnit},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use crate::process::{Cell, RawTable};

/// The table returned when nothing could be loaded: zero rows, zero columns.
pub fn empty_table() -> RecordBatch {
    RecordBatch::new_empty(Arc::new(Schema::empty()))
}

/// Which Arrow type a column's non-null cells agree on.
fn infer_column_type<'a>(cells: impl Iterator<Item = &'a Cell>) -> DataType {
    let (mut ints, mut floats, mut bools, mut dates, mut texts) = (0, 0, 0, 0, 0);
    for cell in cells {
        match cell {
            Cell::Null => {}
            Cell::Int(_) => ints += 1,
            Cell::Float(_) => floats += 1,
            Cell::Bool(_) => bools += 1,
            Cell::DateTime(_) => dates += 1,
            Cell::Text(_) => texts += 1,
        }
    }
    let numeric = ints + floats;
    match (numeric, bools, dates, texts) {
        (0, 0, 0, _) => DataType::Utf8,
        (_, 0, 0, 0) if floats == 0 => DataType::Int64,
        (_, 0, 0, 0) => DataType::Float64,
        (0, _, 0, 0) => DataType::Boolean,
        (0, 0, _, 0) => DataType::Timestamp(TimeUnit::Microsecond, None),
        _ => DataType::Utf8,
    }
}

fn build_array(cells: &[&Cell], dt: &DataType) -> ArrayRef {
    match dt {
        DataType::Int64 => {
            let mut b = Int64Builder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Cell::Int(i) => Some(*i),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        DataType::Float64 => {
            let mut b = Float64Builder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Cell::Int(i) => Some(*i as f64),
                    Cell::Float(f) => Some(*f),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        DataType::Boolean => {
            let mut b = BooleanBuilder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Cell::Bool(v) => Some(*v),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(cells.len());
            for c in cells {
                b.append_option(match c {
                    Cell::DateTime(dt) => Some(dt.and_utc().timestamp_micros()),
                    _ => None,
                });
            }
            Arc::new(b.finish())
        }
        _ => {
            let mut b = StringBuilder::with_capacity(cells.len(), cells.len() * 8);
            for c in cells {
                if c.is_null() {
                    b.append_null();
                } else {
                    b.append_value(c.to_string());
                }
            }
            Arc::new(b.finish())
        }
    }
}

/// Concatenate raw tables into one Arrow batch.
///
/// Columns are the union of all headers in first-seen order; a table lacking a
/// column contributes nulls. Row order follows the order of `tables`.
pub fn concat_raw_tables(tables: &[RawTable]) -> Result<RecordBatch> {
    let mut names: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for t in tables {
        for h in &t.headers {
            if !index.contains_key(h.as_str()) {
                index.insert(h.as_str(), names.len());
                names.push(h.as_str());
            }
        }
    }

    let num_rows: usize = tables.iter().map(|t| t.rows.len()).sum();
    if names.is_empty() {
        return Ok(empty_table());
    }

    // column-major view of every cell, nulls where a table lacks the column
    let null = Cell::Null;
    let mut columns: Vec<Vec<&Cell>> = vec![Vec::with_capacity(num_rows); names.len()];
    for t in tables {
        let positions: Vec<usize> = t.headers.iter().map(|h| index[h.as_str()]).collect();
        for row in &t.rows {
            let mut seen = vec![false; names.len()];
            for (cell, &pos) in row.iter().zip(&positions) {
                columns[pos].push(cell);
                seen[pos] = true;
            }
            for (pos, was_seen) in seen.into_iter().enumerate() {
                if !was_seen {
                    columns[pos].push(&null);
                }
            }
        }
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays = Vec::with_capacity(names.len());
    for (name, cells) in names.iter().zip(&columns) {
        let dt = infer_column_type(cells.iter().copied());
        debug!(column = %name, data_type = ?dt, "inferred column type");
        arrays.push(build_array(cells, &dt));
        fields.push(Field::new(*name, dt, true));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .context("building normalized table")
}

/// Swap column `idx` of `batch` for `array`, keeping the field name.
pub fn replace_column(batch: &RecordBatch, idx: usize, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[idx] = Field::new(fields[idx].name(), array.data_type().clone(), true);
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .with_context(|| format!("replacing column {}", schema.field(idx).name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};
    use chrono::NaiveDate;

    fn raw(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        let mut t = RawTable::from_raw_headers(headers.iter().copied());
        for r in rows {
            t.push_row(r);
        }
        t
    }

    #[test]
    fn union_of_columns_in_first_seen_order() -> Result<()> {
        let a = raw(&["team", "goals"], vec![vec![Cell::Text("AAB".into()), Cell::Int(3)]]);
        let b = raw(
            &["team", "assists"],
            vec![vec![Cell::Text("ODE".into()), Cell::Int(5)]],
        );
        let batch = concat_raw_tables(&[a, b])?;

        let names: Vec<_> = batch.schema().fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, vec!["team", "goals", "assists"]);
        assert_eq!(batch.num_rows(), 2);

        let goals = batch.column(1).as_primitive::<Int64Type>();
        assert_eq!(goals.value(0), 3);
        assert!(goals.is_null(1));
        let assists = batch.column(2).as_primitive::<Int64Type>();
        assert!(assists.is_null(0));
        assert_eq!(assists.value(1), 5);
        Ok(())
    }

    #[test]
    fn mixed_cells_widen() -> Result<()> {
        let dt = NaiveDate::from_ymd_opt(2022, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let t = raw(
            &["n", "mixed", "when", "blank"],
            vec![
                vec![Cell::Int(1), Cell::Int(1), Cell::DateTime(dt), Cell::Null],
                vec![Cell::Float(2.5), Cell::Text("x".into()), Cell::Null, Cell::Null],
            ],
        );
        let batch = concat_raw_tables(&[t])?;
        let schema = batch.schema();
        assert_eq!(schema.field(0).data_type(), &DataType::Float64);
        assert_eq!(schema.field(1).data_type(), &DataType::Utf8);
        assert_eq!(
            schema.field(2).data_type(),
            &DataType::Timestamp(TimeUnit::Microsecond, None)
        );
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);

        assert_eq!(batch.column(0).as_primitive::<Float64Type>().value(0), 1.0);
        let mixed = batch.column(1).as_string::<i32>();
        assert_eq!(mixed.value(0), "1");
        assert_eq!(mixed.value(1), "x");
        assert_eq!(batch.column(3).null_count(), 2);
        Ok(())
    }

    #[test]
    fn no_tables_is_empty() -> Result<()> {
        let batch = concat_raw_tables(&[])?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 0);
        Ok(())
    }
}
