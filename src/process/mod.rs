// src/process/mod.rs
use chrono::NaiveDateTime;
use std::fmt;

pub mod collect;
pub mod convert;
pub mod csv_reader;
pub mod date_parser;
pub mod excel;
pub mod table;
pub mod time;
pub mod utils;

pub use collect::{collect_files, SourceFormat};
pub use convert::enforce_column_types;
pub use time::convert_time_to_seconds;
pub use utils::{extract_year_from_filename, normalize_column_name};

/// One raw value read out of a spreadsheet or CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// The content of one source file after load, before concatenation.
#[derive(Debug, Default)]
pub struct RawTable {
    /// Normalized column names, unique within the table.
    pub headers: Vec<String>,
    /// Each data row, one cell per header.
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Build from raw header strings: normalizes names, fills blanks with
    /// `unnamed_{idx}` and suffixes duplicates with `.1`, `.2`, ...
    pub fn from_raw_headers<I, S>(raw_headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut headers: Vec<String> = Vec::new();
        for (idx, raw) in raw_headers.into_iter().enumerate() {
            let mut name = utils::normalize_column_name(raw.as_ref());
            if name.is_empty() {
                name = format!("unnamed_{}", idx);
            }
            if headers.contains(&name) {
                let mut n = 1;
                while headers.contains(&format!("{}.{}", name, n)) {
                    n += 1;
                }
                name = format!("{}.{}", name, n);
            }
            headers.push(name);
        }
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Push a row, padding short rows with nulls and dropping trailing extras.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Null);
        self.rows.push(row);
    }

    /// Set `name` to `value` on every row, adding the column if needed.
    pub fn set_constant_column(&mut self, name: &str, value: Cell) {
        match self.headers.iter().position(|h| h == name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_normalized_and_unique() {
        let t = RawTable::from_raw_headers(["Team", " Goals ", "", "team", "Team"]);
        assert_eq!(
            t.headers,
            vec!["team", "goals", "unnamed_2", "team.1", "team.2"]
        );
    }

    #[test]
    fn constant_column_overwrites_existing() {
        let mut t = RawTable::from_raw_headers(["Year", "Goals"]);
        t.push_row(vec![Cell::Int(1999), Cell::Int(3)]);
        t.push_row(vec![Cell::Int(1998)]);
        t.set_constant_column("year", Cell::Int(2022));
        t.set_constant_column("filename", Cell::Text("a.csv".into()));
        assert_eq!(t.headers, vec!["year", "goals", "filename"]);
        assert_eq!(t.rows[0], vec![Cell::Int(2022), Cell::Int(3), Cell::Text("a.csv".into())]);
        assert_eq!(t.rows[1], vec![Cell::Int(2022), Cell::Null, Cell::Text("a.csv".into())]);
    }
}
