//! Startup load: pick the dataset, build the registry, and hand back a
//! repository for the configured storage.
//!
//! CHANGELOG:
//! - 10/19/2026 - SQLite storage imports on first start or when forced

use std::path::Path;
use std::time::Instant;

use super::csv_source::read_source_rows;
use super::{NameRepository, Registry, RegistryAudit, RegistryError, SqliteStore};
use crate::config::{Settings, StorageKind};

/// Records source plus the audit of the load that produced it.
pub struct LoadedRegistry {
    pub repository: Box<dyn NameRepository + Send + Sync>,
    pub audit: RegistryAudit,
}

impl std::fmt::Debug for LoadedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedRegistry")
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}

fn registry_from_csv(path: &Path, settings: &Settings, storage: &str) -> Result<Registry, RegistryError> {
    let rows = read_source_rows(path)?;
    Ok(Registry::from_rows(rows, settings.dataset_mode)?
        .with_origin(storage, Some(path.display().to_string())))
}

/// Load the registry the way `settings` describes.
///
/// CSV storage parses the dataset on every call. SQLite storage imports the
/// dataset only when the database is empty or `sqlite_force_reload` is set,
/// then streams records from the database.
pub fn load(settings: &Settings) -> Result<LoadedRegistry, RegistryError> {
    let started = Instant::now();
    let dataset = settings.dataset_path();

    let loaded = match settings.storage {
        StorageKind::Csv => {
            let registry = registry_from_csv(&dataset, settings, "csv")?;
            LoadedRegistry {
                audit: registry.audit(),
                repository: Box::new(registry),
            }
        }
        StorageKind::Sqlite => {
            let mut store = SqliteStore::open(&settings.sqlite_path)?;
            let loaded_rows = if settings.sqlite_force_reload || store.is_empty()? {
                tracing::info!(
                    dataset = %dataset.display(),
                    db = %store.path().display(),
                    forced = settings.sqlite_force_reload,
                    "importing dataset into sqlite"
                );
                let registry = registry_from_csv(&dataset, settings, "sqlite")?;
                store.replace_all(&registry)? as i64
            } else {
                tracing::info!(db = %store.path().display(), "reusing sqlite registry");
                -1
            };

            let mut audit = store.load_audit(settings.dataset_mode)?;
            audit.stats.sqlite_path = Some(store.path().display().to_string());
            audit.stats.sqlite_loaded_rows = Some(loaded_rows);
            LoadedRegistry {
                audit,
                repository: Box::new(store.repository()),
            }
        }
    };

    tracing::info!(
        storage = %settings.storage,
        mode = %loaded.audit.stats.mode,
        records = loaded.audit.stats.record_rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "registry loaded"
    );

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{collect_records, DatasetMode};
    use std::fs;

    const RAW: &str = "ID,Full Name\n1,Juan Pérez\n2,Dr. Juan Perez\n3,Ana Gómez\n";
    const CLEAN: &str = "ID,Full Name,strict_key\n1,Juan Pérez,juan perez\n2,Dr. Juan Perez,juan perez\n3,Ana Gómez,ana gomez\n";

    fn data_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("raw")).unwrap();
        fs::create_dir_all(dir.path().join("clean")).unwrap();
        fs::write(dir.path().join("raw/names_dataset.csv"), RAW).unwrap();
        fs::write(
            dir.path().join("clean/names_dataset_standardized.csv"),
            CLEAN,
        )
        .unwrap();
        dir
    }

    fn settings(root: &Path, storage: StorageKind, mode: DatasetMode) -> Settings {
        Settings {
            storage,
            data_root: root.to_path_buf(),
            dataset_mode: mode,
            sqlite_path: root.join("names.db"),
            ..Settings::default()
        }
    }

    #[test]
    fn test_csv_original() {
        let root = data_root();
        let loaded = load(&settings(root.path(), StorageKind::Csv, DatasetMode::Original)).unwrap();

        assert_eq!(loaded.audit.stats.storage, "csv");
        assert_eq!(loaded.audit.stats.sqlite_loaded_rows, None);
        assert_eq!(loaded.audit.stats.record_rows, 3);
        assert!(loaded
            .audit
            .stats
            .dataset_path
            .as_deref()
            .unwrap()
            .ends_with("names_dataset.csv"));
        assert_eq!(collect_records(loaded.repository.as_ref()).unwrap().len(), 3);
    }

    #[test]
    fn test_csv_dedupe_reads_clean_dataset() {
        let root = data_root();
        let loaded = load(&settings(
            root.path(),
            StorageKind::Csv,
            DatasetMode::StandardizedDedupe,
        ))
        .unwrap();

        assert_eq!(loaded.audit.stats.source_rows, 3);
        assert_eq!(loaded.audit.stats.record_rows, 2);
        assert_eq!(loaded.audit.group_ids_by_rep_id(1), Some(&[1, 2][..]));
    }

    #[test]
    fn test_sqlite_imports_once_unless_forced() {
        let root = data_root();
        let mut cfg = settings(root.path(), StorageKind::Sqlite, DatasetMode::Original);

        let first = load(&cfg).unwrap();
        assert_eq!(first.audit.stats.storage, "sqlite");
        assert_eq!(first.audit.stats.sqlite_loaded_rows, Some(3));
        assert!(first
            .audit
            .stats
            .sqlite_path
            .as_deref()
            .unwrap()
            .ends_with("names.db"));
        assert_eq!(collect_records(first.repository.as_ref()).unwrap().len(), 3);

        // a changed dataset is ignored while the database has rows
        fs::write(
            root.path().join("raw/names_dataset.csv"),
            "ID,Full Name\n9,Luis Ríos\n",
        )
        .unwrap();
        let reused = load(&cfg).unwrap();
        assert_eq!(reused.audit.stats.sqlite_loaded_rows, Some(-1));
        assert_eq!(collect_records(reused.repository.as_ref()).unwrap().len(), 3);

        cfg.sqlite_force_reload = true;
        let reloaded = load(&cfg).unwrap();
        assert_eq!(reloaded.audit.stats.sqlite_loaded_rows, Some(1));
        let ids: Vec<i64> = collect_records(reloaded.repository.as_ref())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![9]);
    }

    #[test]
    fn test_missing_dataset_fails() {
        let root = tempfile::tempdir().unwrap();
        let result = load(&settings(root.path(), StorageKind::Csv, DatasetMode::Original));
        assert!(matches!(result, Err(RegistryError::Io(_))));
    }
}
