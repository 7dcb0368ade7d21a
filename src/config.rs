//! Runtime settings, read from the environment.
//!
//! | variable              | default                         |
//! |-----------------------|---------------------------------|
//! | `STORAGE`             | `csv` (`csv` or `sqlite`)       |
//! | `DATA_ROOT`           | `~/.namematch/data`             |
//! | `CSV_PATH`            | derived from mode + data root   |
//! | `DATASET_MODE`        | `original`                      |
//! | `SQLITE_PATH`         | `~/.namematch/names.db`         |
//! | `SQLITE_FORCE_RELOAD` | `false`                         |
//! | `NGRAM_N`             | `3`                             |
//! | `MAX_CANDIDATES`      | `2000`                          |
//! | `CACHE_MAX`           | `256`                           |
//! | `METRICS_WINDOW`      | `5000`                          |
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::matching::SearchConfig;
use crate::metrics::DEFAULT_WINDOW;
use crate::registry::DatasetMode;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the registry is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Parse the CSV into memory on every start.
    #[default]
    Csv,
    /// Import the CSV into SQLite once, then stream from the database.
    Sqlite,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Csv => f.write_str("csv"),
            StorageKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(StorageKind::Csv),
            "sqlite" => Ok(StorageKind::Sqlite),
            _ => Err("expected csv or sqlite".to_string()),
        }
    }
}

/// Base directory for default data files.
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".namematch")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub storage: StorageKind,
    pub data_root: PathBuf,
    /// Explicit dataset file; overrides the mode-derived path.
    pub csv_path: Option<PathBuf>,
    pub dataset_mode: DatasetMode,
    pub sqlite_path: PathBuf,
    pub sqlite_force_reload: bool,
    pub search: SearchConfig,
    pub cache_max: usize,
    pub metrics_window: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let home = default_home();
        Self {
            storage: StorageKind::Csv,
            data_root: home.join("data"),
            csv_path: None,
            dataset_mode: DatasetMode::Original,
            sqlite_path: home.join("names.db"),
            sqlite_force_reload: false,
            search: SearchConfig::default(),
            cache_max: DEFAULT_CACHE_CAPACITY,
            metrics_window: DEFAULT_WINDOW,
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid(key, value, "must be > 0")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(key, value, e.to_string())),
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" | "" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

impl Settings {
    /// Settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(v) = lookup("STORAGE") {
            settings.storage = v
                .parse()
                .map_err(|reason: String| invalid("STORAGE", &v, reason))?;
        }
        if let Some(v) = lookup("DATA_ROOT") {
            settings.data_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("CSV_PATH") {
            if !v.trim().is_empty() {
                settings.csv_path = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = lookup("DATASET_MODE") {
            settings.dataset_mode = v
                .parse()
                .map_err(|e: crate::registry::RegistryError| invalid("DATASET_MODE", &v, e.to_string()))?;
        }
        if let Some(v) = lookup("SQLITE_PATH") {
            settings.sqlite_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("SQLITE_FORCE_RELOAD") {
            settings.sqlite_force_reload = parse_flag("SQLITE_FORCE_RELOAD", &v)?;
        }
        if let Some(v) = lookup("NGRAM_N") {
            settings.search.ngram_n = parse_positive("NGRAM_N", &v)?;
        }
        if let Some(v) = lookup("MAX_CANDIDATES") {
            settings.search.max_candidates = parse_positive("MAX_CANDIDATES", &v)?;
        }
        if let Some(v) = lookup("CACHE_MAX") {
            settings.cache_max = parse_positive("CACHE_MAX", &v)?;
        }
        if let Some(v) = lookup("METRICS_WINDOW") {
            settings.metrics_window = parse_positive("METRICS_WINDOW", &v)?;
        }

        Ok(settings)
    }

    /// Dataset file for the configured mode.
    ///
    /// `original` reads `<root>/raw/names_dataset.csv`; the standardized
    /// modes read `<root>/clean/names_dataset_standardized.csv`.
    pub fn dataset_path(&self) -> PathBuf {
        if let Some(path) = &self.csv_path {
            return path.clone();
        }
        if self.dataset_mode.uses_clean_dataset() {
            self.data_root
                .join("clean")
                .join("names_dataset_standardized.csv")
        } else {
            self.data_root.join("raw").join("names_dataset.csv")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.storage, StorageKind::Csv);
        assert_eq!(settings.dataset_mode, DatasetMode::Original);
        assert_eq!(settings.search.ngram_n, 3);
        assert_eq!(settings.search.max_candidates, 2000);
        assert_eq!(settings.cache_max, 256);
        assert_eq!(settings.metrics_window, 5000);
        assert!(settings
            .dataset_path()
            .ends_with("raw/names_dataset.csv"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("STORAGE", "SQLite"),
            ("DATA_ROOT", "/srv/data"),
            ("DATASET_MODE", "standardized+dedupe"),
            ("SQLITE_PATH", "/srv/names.db"),
            ("SQLITE_FORCE_RELOAD", "yes"),
            ("NGRAM_N", "2"),
            ("MAX_CANDIDATES", "50"),
            ("CACHE_MAX", "8"),
        ]))
        .unwrap();

        assert_eq!(settings.storage, StorageKind::Sqlite);
        assert!(settings.sqlite_force_reload);
        assert_eq!(settings.search.ngram_n, 2);
        assert_eq!(settings.cache_max, 8);
        assert_eq!(
            settings.dataset_path(),
            PathBuf::from("/srv/data/clean/names_dataset_standardized.csv")
        );
    }

    #[test]
    fn test_explicit_csv_path_wins() {
        let settings = Settings::from_lookup(lookup(&[("CSV_PATH", "/tmp/names.csv")])).unwrap();
        assert_eq!(settings.dataset_path(), PathBuf::from("/tmp/names.csv"));
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        for pairs in [
            [("NGRAM_N", "0")],
            [("NGRAM_N", "-1")],
            [("CACHE_MAX", "lots")],
            [("STORAGE", "postgres")],
            [("DATASET_MODE", "dedupe")],
            [("SQLITE_FORCE_RELOAD", "maybe")],
        ] {
            assert!(
                Settings::from_lookup(lookup(&pairs)).is_err(),
                "{:?} should be rejected",
                pairs
            );
        }
    }
}
