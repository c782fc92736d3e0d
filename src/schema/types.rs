// src/schema/types.rs

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Semantic target type of a column in a type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Date,
}

impl FromStr for ColumnType {
    type Err = Error;

    /// Accepts SQL-style names (`INTEGER`, `VARCHAR`, `DATE`) as well as the
    /// short scripting names (`int`, `str`, `float`, `bool`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let ty = match upper.as_str() {
            "INT" | "INTEGER" | "BIGINT" | "INT64" | "SMALLINT" | "TINYINT" => Self::Integer,
            "FLOAT" | "DOUBLE" | "REAL" | "FLOAT64" | "NUMBER" => Self::Float,
            "STR" | "TEXT" | "STRING" | "UTF8" => Self::Text,
            "BOOL" | "BOOLEAN" => Self::Boolean,
            "DATE" => Self::Date,
            _ if upper.starts_with("VARCHAR") || upper.starts_with("CHAR") => Self::Text,
            _ if upper.starts_with("DECIMAL") || upper.starts_with("NUMERIC") => Self::Float,
            _ => return Err(anyhow!("unknown column type `{}`", s)),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Text => "TEXT",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sql_and_script_names() {
        assert_eq!("INTEGER".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("int".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("str".parse::<ColumnType>().unwrap(), ColumnType::Text);
        assert_eq!("VARCHAR(32)".parse::<ColumnType>().unwrap(), ColumnType::Text);
        assert_eq!(" date ".parse::<ColumnType>().unwrap(), ColumnType::Date);
        assert_eq!("double".parse::<ColumnType>().unwrap(), ColumnType::Float);
        assert!("uuid".parse::<ColumnType>().is_err());
    }

    #[test]
    fn deserializes_from_yaml() {
        let ty: ColumnType = serde_yaml::from_str("integer").unwrap();
        assert_eq!(ty, ColumnType::Integer);
        assert_eq!(serde_yaml::to_string(&ColumnType::Date).unwrap().trim(), "DATE");
    }
}
