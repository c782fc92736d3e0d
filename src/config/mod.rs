// src/config/mod.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::process::{normalize_column_name, SourceFormat};
use crate::schema::ColumnType;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    Excel,
    Csv,
}

/// One logical dataset: where its files live and how its table is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Destination table in the analytical store.
    pub table: String,
    pub directory: PathBuf,
    #[serde(default)]
    pub format: FileKind,
    /// Preferred sheet for Excel sources.
    #[serde(default)]
    pub sheet: Option<String>,
    /// Columns holding `mm:ss` strings to turn into seconds.
    #[serde(default)]
    pub time_columns: Vec<String>,
    #[serde(default)]
    pub column_types: BTreeMap<String, ColumnType>,
    /// Post-write `ALTER COLUMN ... TYPE` overrides, raw SQL type names.
    #[serde(default)]
    pub sql_types: BTreeMap<String, String>,
}

impl DatasetConfig {
    pub fn source_format(&self) -> SourceFormat {
        match self.format {
            FileKind::Excel => SourceFormat::Excel {
                sheet: self.sheet.clone(),
            },
            FileKind::Csv => SourceFormat::Csv,
        }
    }

    /// `column_types` keyed by normalized column name.
    pub fn normalized_column_types(&self) -> BTreeMap<String, ColumnType> {
        self.column_types
            .iter()
            .map(|(k, v)| (normalize_column_name(k), *v))
            .collect()
    }

    pub fn normalized_sql_types(&self) -> BTreeMap<String, String> {
        self.sql_types
            .iter()
            .map(|(k, v)| (normalize_column_name(k), v.clone()))
            .collect()
    }

    pub fn normalized_time_columns(&self) -> Vec<String> {
        self.time_columns
            .iter()
            .map(|c| normalize_column_name(c))
            .collect()
    }
}

/// Everything one pipeline run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub db_path: PathBuf,
    /// Root for relative paths. Defaults to the directory of the config file.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

impl PipelineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("parsing pipeline config")
    }

    /// Read a YAML config and resolve every relative path against
    /// `base_dir`, or the config file's own directory when unset.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        let mut cfg =
            Self::from_yaml_str(&text).with_context(|| format!("in config file {:?}", path))?;

        let config_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let base = match cfg.base_dir.take() {
            Some(b) if b.is_relative() => config_dir.join(b),
            Some(b) => b,
            None => config_dir,
        };
        cfg.resolve_paths(&base);
        cfg.base_dir = Some(base);
        Ok(cfg)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        if self.db_path.is_relative() {
            self.db_path = base.join(&self.db_path);
        }
        for ds in &mut self.datasets {
            if ds.directory.is_relative() {
                ds.directory = base.join(&ds.directory);
            }
        }
    }
}
