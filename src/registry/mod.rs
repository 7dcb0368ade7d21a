//! Name registry: records, dataset modes, dedupe, CSV and SQLite storage.
//!
//! CHANGELOG:
//! - 10/19/2026 - Registry replaces the JSON contacts store

pub mod csv_source;
pub mod dedupe;
pub mod loader;
pub mod manager;
pub mod sqlite;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use dedupe::DedupeGroups;
pub use manager::{Registry, RegistryAudit};
pub use sqlite::{SqliteRepository, SqliteStore};

/// Errors raised while loading or reading the registry.
///
/// Any of these aborts the load: a partially loaded index is worse than a
/// failed startup.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to read CSV {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: ::csv::Error,
    },

    #[error("CSV {path} needs id and name columns (e.g. 'id','name' or 'ID','Full Name'), found {found:?}")]
    MissingColumns { path: String, found: Vec<String> },

    #[error("Row {row}: missing {field}")]
    MissingField { row: usize, field: &'static str },

    #[error("Row {row}: invalid id {value:?}")]
    InvalidId { row: usize, value: String },

    #[error("Duplicate id {0} in source rows")]
    DuplicateId(i64),

    #[error("Unknown dataset mode {0:?} (expected original, standardized or standardized+dedupe)")]
    UnknownMode(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored load metadata is unreadable: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// One indexed name. `id` is unique in the active record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub id: i64,
    pub full_name: String,
    pub normalized_name: String,
}

impl NameRecord {
    pub fn new(id: i64, full_name: &str, normalized_name: &str) -> Self {
        Self {
            id,
            full_name: full_name.to_string(),
            normalized_name: normalized_name.to_string(),
        }
    }
}

/// One row handed over by a loader, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    pub id: i64,
    pub full_name: String,
    /// Normalized key precomputed by an upstream cleaning stage, if any.
    pub strict_key: Option<String>,
}

impl SourceRow {
    pub fn new(id: i64, full_name: &str) -> Self {
        Self {
            id,
            full_name: full_name.to_string(),
            strict_key: None,
        }
    }

    pub fn with_strict_key(mut self, key: &str) -> Self {
        self.strict_key = Some(key.to_string());
        self
    }
}

/// Which dataset is loaded and how it is keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DatasetMode {
    /// One record per row, normalized at load time.
    #[default]
    #[serde(rename = "original")]
    Original,
    /// One record per row, key may come precomputed from the clean dataset.
    #[serde(rename = "standardized")]
    Standardized,
    /// Rows sharing a key collapse into one representative record.
    #[serde(rename = "standardized+dedupe")]
    StandardizedDedupe,
}

impl DatasetMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetMode::Original => "original",
            DatasetMode::Standardized => "standardized",
            DatasetMode::StandardizedDedupe => "standardized+dedupe",
        }
    }

    /// Whether the cleaned dataset (with precomputed keys) is the source.
    pub fn uses_clean_dataset(&self) -> bool {
        !matches!(self, DatasetMode::Original)
    }
}

impl fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetMode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "original" => Ok(DatasetMode::Original),
            "standardized" => Ok(DatasetMode::Standardized),
            "standardized+dedupe" => Ok(DatasetMode::StandardizedDedupe),
            other => Err(RegistryError::UnknownMode(other.to_string())),
        }
    }
}

/// Load audit: how the registry was built and how aggressive dedupe was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    /// Where records are served from ("memory", "csv", "sqlite").
    pub storage: String,
    pub mode: DatasetMode,
    pub source_rows: usize,
    pub record_rows: usize,
    pub dedupe_groups: usize,
    /// `record_rows / source_rows` (0 when there are no rows).
    pub dedupe_ratio: f64,
    /// Rows whose precomputed key differs from a fresh `normalize()`.
    #[serde(default)]
    pub key_drift_rows: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
    /// Rows imported by this load, or -1 when existing rows were reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_loaded_rows: Option<i64>,
}

/// Read-only access to the active record set.
///
/// One capability: visit every record once, in storage order. Implemented
/// by the in-memory [`Registry`] and the streaming [`SqliteRepository`].
pub trait NameRepository {
    fn for_each_record(&self, visit: &mut dyn FnMut(NameRecord)) -> Result<(), RegistryError>;
}

/// Materialize a repository into a vector (index builds need all records).
pub fn collect_records(repo: &dyn NameRepository) -> Result<Vec<NameRecord>, RegistryError> {
    let mut records = Vec::new();
    repo.for_each_record(&mut |record| records.push(record))?;
    Ok(records)
}
