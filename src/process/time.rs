use anyhow::{anyhow, bail, Result};
use arrow::{
    array::{Array, ArrayRef, Int64Builder, StringArray},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::process::table::replace_column;
use crate::report::{Outcome, Warning, WarningKind};

/// `"mm:ss"` → total seconds.
pub fn parse_minutes_seconds(s: &str) -> Result<i64> {
    let mut parts = s.split(':');
    let (Some(m), Some(sec), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("`{}` is not in mm:ss form", s);
    };
    let minutes: i64 = m
        .trim()
        .parse()
        .map_err(|e| anyhow!("minutes in `{}`: {}", s, e))?;
    let seconds: i64 = sec
        .trim()
        .parse()
        .map_err(|e| anyhow!("seconds in `{}`: {}", s, e))?;
    minutes
        .checked_mul(60)
        .and_then(|m| m.checked_add(seconds))
        .ok_or_else(|| anyhow!("`{}` is out of range for seconds", s))
}

fn convert_array(arr: &ArrayRef) -> Result<ArrayRef> {
    let mut b = Int64Builder::with_capacity(arr.len());
    match arr.data_type() {
        DataType::Null => b.append_nulls(arr.len()),
        DataType::Utf8 => {
            let sarr = arr
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("utf8 column is not a StringArray"))?;
            for opt in sarr.iter() {
                match opt {
                    Some(s) => b.append_value(parse_minutes_seconds(s)?),
                    None => b.append_null(),
                }
            }
        }
        other => bail!("expected text values, found {:?}", other),
    }
    Ok(Arc::new(b.finish()))
}

/// Convert a `"mm:ss"` column of `batch` into integer seconds.
///
/// All-or-nothing: a single malformed value leaves the whole column as it was
/// and records a `ConversionFailed` warning. An absent column is a no-op.
pub fn convert_time_to_seconds(batch: RecordBatch, column: &str) -> Outcome<RecordBatch> {
    let Ok(idx) = batch.schema().index_of(column) else {
        debug!(column, "time column not present, nothing to convert");
        return Outcome::new(batch);
    };

    let converted = convert_array(batch.column(idx))
        .and_then(|arr| replace_column(&batch, idx, arr));
    match converted {
        Ok(out) => {
            info!(column, "converted column to total seconds");
            Outcome::new(out)
        }
        Err(e) => {
            let w = Warning::new(
                WarningKind::ConversionFailed,
                column,
                format!("error converting to seconds: {}", e),
            );
            Outcome::with_warnings(batch, vec![w])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Int64Array};
    use arrow::datatypes::{Field, Int64Type, Schema};

    fn batch_of(values: Vec<Option<&str>>) -> RecordBatch {
        let schema = Schema::new(vec![Field::new("time_on_ice", DataType::Utf8, true)]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(values)) as ArrayRef],
        )
        .unwrap()
    }

    #[test]
    fn parses_minutes_seconds() {
        assert_eq!(parse_minutes_seconds("12:34").unwrap(), 754);
        assert_eq!(parse_minutes_seconds("0:05").unwrap(), 5);
        assert_eq!(parse_minutes_seconds(" 3 : 07 ").unwrap(), 187);
        assert!(parse_minutes_seconds("12").is_err());
        assert!(parse_minutes_seconds("1:2:3").is_err());
        assert!(parse_minutes_seconds("ab:cd").is_err());
        assert!(parse_minutes_seconds("").is_err());
        assert!(parse_minutes_seconds("999999999999999999:00").is_err());
    }

    #[test]
    fn converts_whole_column_with_nulls() {
        let out = convert_time_to_seconds(batch_of(vec![Some("12:34"), None, Some("00:59")]), "time_on_ice");
        assert!(out.warnings.is_empty());
        let col = out.value.column(0).as_primitive::<Int64Type>();
        assert_eq!(col, &Int64Array::from(vec![Some(754), None, Some(59)]));
    }

    #[test]
    fn malformed_value_leaves_column_untouched() {
        let input = batch_of(vec![Some("12:34"), Some("n/a")]);
        let out = convert_time_to_seconds(input.clone(), "time_on_ice");
        assert!(out.has(WarningKind::ConversionFailed));
        assert_eq!(out.value, input);

        let input = batch_of(vec![Some("12:34"), Some("999999999999999999:00")]);
        let out = convert_time_to_seconds(input.clone(), "time_on_ice");
        assert!(out.has(WarningKind::ConversionFailed));
        assert_eq!(out.value, input);
    }

    #[test]
    fn missing_column_passes_through() {
        let input = batch_of(vec![Some("1:00")]);
        let out = convert_time_to_seconds(input.clone(), "toi");
        assert!(out.warnings.is_empty());
        assert_eq!(out.value, input);
    }

    #[test]
    fn already_numeric_column_is_not_reconverted() {
        let schema = Schema::new(vec![Field::new("toi", DataType::Int64, true)]);
        let input = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(Int64Array::from(vec![60])) as ArrayRef],
        )
        .unwrap();
        let out = convert_time_to_seconds(input.clone(), "toi");
        assert!(out.has(WarningKind::ConversionFailed));
        assert_eq!(out.value, input);
    }
}
