use crate::process::{date_parser, table::replace_column};
use crate::report::{Outcome, Warning, WarningKind};
use crate::schema::{map_to_arrow_type, ColumnType};
use anyhow::{anyhow, Result};
use arrow::{
    array::{Array, ArrayRef, Date32Builder, StringArray},
    compute::kernels::cast::{cast_with_options, CastOptions},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::info;

/// Permissive DATE conversion: unparseable values become null, never an error.
fn to_date_column(arr: &ArrayRef) -> Result<ArrayRef> {
    match arr.data_type() {
        DataType::Date32 => Ok(arr.clone()),
        DataType::Timestamp(_, _) | DataType::Date64 => {
            Ok(cast_with_options(arr, &DataType::Date32, &CastOptions::default())?)
        }
        DataType::Utf8 => {
            let sarr = arr
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("utf8 column is not a StringArray"))?;
            let mut b = Date32Builder::with_capacity(sarr.len());
            for opt in sarr.iter() {
                b.append_option(
                    opt.and_then(date_parser::parse_date)
                        .map(date_parser::days_since_epoch),
                );
            }
            Ok(Arc::new(b.finish()))
        }
        _ => {
            let text = cast_with_options(arr, &DataType::Utf8, &CastOptions::default())?;
            to_date_column(&text)
        }
    }
}

/// Strict cast: any value that does not fit fails the whole column.
fn to_primitive_column(arr: &ArrayRef, ty: ColumnType) -> Result<ArrayRef> {
    let target = map_to_arrow_type(ty);
    if arr.data_type() == &target {
        return Ok(arr.clone());
    }
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    Ok(cast_with_options(arr, &target, &options)?)
}

/// Cast each mapped column of `batch` to its declared type.
///
/// Best effort: a column that fails to cast keeps its values and yields a
/// `ConversionFailed` warning; mapped columns absent from the table yield
/// `ColumnMissing`. Applying the same mapping twice is the same as once.
pub fn enforce_column_types(
    batch: RecordBatch,
    mapping: &BTreeMap<String, ColumnType>,
) -> Outcome<RecordBatch> {
    let mut warnings = Vec::new();
    let mut batch = batch;

    for (column, &ty) in mapping {
        let Ok(idx) = batch.schema().index_of(column) else {
            warnings.push(Warning::new(
                WarningKind::ColumnMissing,
                column.as_str(),
                format!("column not found in data, skipping {} enforcement", ty),
            ));
            continue;
        };

        let converted = match ty {
            ColumnType::Date => to_date_column(batch.column(idx)),
            other => to_primitive_column(batch.column(idx), other),
        }
        .and_then(|arr| replace_column(&batch, idx, arr));

        match converted {
            Ok(next) => {
                info!(column = %column, ty = %ty, "converted column");
                batch = next;
            }
            Err(e) => warnings.push(Warning::new(
                WarningKind::ConversionFailed,
                column.as_str(),
                format!("error converting to {}: {}", ty, e),
            )),
        }
    }

    Outcome::with_warnings(batch, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Date32Array, Float64Array, Int64Array, TimestampMicrosecondArray};
    use arrow::datatypes::{Field, Int64Type, Schema, TimeUnit};
    use chrono::NaiveDate;

    fn sample() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("goals", DataType::Utf8, true),
            Field::new("team", DataType::Utf8, true),
            Field::new("date", DataType::Utf8, true),
            Field::new("points", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![Some("3"), None, Some("7")])) as ArrayRef,
                Arc::new(StringArray::from(vec!["AAB", "ODE", "HER"])),
                Arc::new(StringArray::from(vec![
                    Some("2022-10-07"),
                    Some("garbage"),
                    None,
                ])),
                Arc::new(Float64Array::from(vec![1.0, 2.5, 3.0])),
            ],
        )
        .unwrap()
    }

    fn mapping(pairs: &[(&str, ColumnType)]) -> BTreeMap<String, ColumnType> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn casts_integer_and_date() {
        let m = mapping(&[("goals", ColumnType::Integer), ("date", ColumnType::Date)]);
        let out = enforce_column_types(sample(), &m);
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);

        let goals = out.value.column(0).as_primitive::<Int64Type>();
        assert_eq!(goals, &Int64Array::from(vec![Some(3), None, Some(7)]));

        let days = date_parser::days_since_epoch(NaiveDate::from_ymd_opt(2022, 10, 7).unwrap());
        let date = out
            .value
            .column(2)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(date, &Date32Array::from(vec![Some(days), None, None]));
    }

    #[test]
    fn failed_cast_keeps_column() {
        let m = mapping(&[("team", ColumnType::Integer), ("goals", ColumnType::Integer)]);
        let input = sample();
        let out = enforce_column_types(input.clone(), &m);

        assert!(out.has(WarningKind::ConversionFailed));
        assert_eq!(out.value.column(1), input.column(1));
        // the other column still converts
        assert_eq!(out.value.schema().field(0).data_type(), &DataType::Int64);
    }

    #[test]
    fn float_to_integer_truncates() {
        let m = mapping(&[("points", ColumnType::Integer)]);
        let out = enforce_column_types(sample(), &m);
        assert!(out.warnings.is_empty());
        let points = out.value.column(3).as_primitive::<Int64Type>();
        assert_eq!(points, &Int64Array::from(vec![1, 2, 3]));
    }

    #[test]
    fn missing_column_is_reported() {
        let m = mapping(&[("assists", ColumnType::Integer)]);
        let input = sample();
        let out = enforce_column_types(input.clone(), &m);
        assert!(out.has(WarningKind::ColumnMissing));
        assert_eq!(out.value, input);
    }

    #[test]
    fn idempotent() {
        let m = mapping(&[
            ("goals", ColumnType::Integer),
            ("team", ColumnType::Text),
            ("date", ColumnType::Date),
            ("points", ColumnType::Integer),
        ]);
        let once = enforce_column_types(sample(), &m).value;
        let twice = enforce_column_types(once.clone(), &m).value;
        assert_eq!(once, twice);
    }

    #[test]
    fn timestamps_truncate_to_dates() {
        let dt = NaiveDate::from_ymd_opt(2023, 2, 1)
            .unwrap()
            .and_hms_opt(19, 30, 0)
            .unwrap();
        let schema = Schema::new(vec![Field::new(
            "date",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            true,
        )]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(TimestampMicrosecondArray::from(vec![
                dt.and_utc().timestamp_micros(),
            ])) as ArrayRef],
        )
        .unwrap();
        let out = enforce_column_types(batch, &mapping(&[("date", ColumnType::Date)]));
        let date = out
            .value
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(date.value(0), date_parser::days_since_epoch(dt.date()));
    }
}
