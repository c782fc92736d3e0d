// src/schema/arrow.rs

use arrow::datatypes::{DataType, TimeUnit};

use super::types::ColumnType;

/// Map a semantic column type into the Arrow DataType it is enforced as.
///
/// - INTEGER → Int64
/// - FLOAT   → Float64
/// - TEXT    → Utf8
/// - BOOLEAN → Boolean
/// - DATE    → Date32
pub fn map_to_arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Integer => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Boolean => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
    }
}

/// DuckDB column type used when creating a table from an Arrow schema.
/// Anything outside the types the table builder produces falls back to VARCHAR.
pub fn duckdb_type_name(dt: &DataType) -> &'static str {
    match dt {
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Timestamp(TimeUnit::Microsecond, _)
        | DataType::Timestamp(TimeUnit::Millisecond, _)
        | DataType::Timestamp(TimeUnit::Second, _)
        | DataType::Timestamp(TimeUnit::Nanosecond, _) => "TIMESTAMP",
        _ => "VARCHAR",
    }
}
