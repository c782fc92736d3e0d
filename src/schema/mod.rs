pub mod arrow;
pub mod types;

pub use arrow::{duckdb_type_name, map_to_arrow_type};
pub use types::ColumnType;
