//! SQLite storage for the registry.
//!
//! `SqliteStore` owns the schema and bulk (re)imports; `SqliteRepository`
//! streams records back out through a cursor without holding the whole
//! table in memory.
//!
//! CHANGELOG:
//! - 10/19/2026 - Persist dedupe groups and load stats next to the names table
//! - 01/10/2026 - Initial stub

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::manager::{Registry, RegistryAudit};
use crate::matching::normalize;
use super::{DatasetMode, DedupeGroups, NameRecord, NameRepository, RegistryError, RegistryStats};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS names (
        id INTEGER PRIMARY KEY,
        full_name TEXT NOT NULL,
        normalized_name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_names_norm ON names(normalized_name);
    CREATE TABLE IF NOT EXISTS dedupe_members (
        member_id INTEGER PRIMARY KEY,
        rep_id INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_dedupe_rep ON dedupe_members(rep_id);
    CREATE TABLE IF NOT EXISTS load_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const STATS_KEY: &str = "stats";

/// Read-write handle used at startup to create and fill the database.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(path)?;
        let journal: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        if migrate_legacy_names(&mut conn)? {
            tracing::info!(path = %path.display(), "migrated legacy names table");
        }
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(path = %path.display(), journal = %journal, "sqlite store opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> Result<usize, RegistryError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(1) FROM names", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.row_count()? == 0)
    }

    /// Replace all stored records, groups and stats in one transaction.
    pub fn replace_all(&mut self, registry: &Registry) -> Result<usize, RegistryError> {
        let mut stats = registry.stats().clone();
        stats.storage = "sqlite".to_string();
        let stats_json = serde_json::to_string(&stats)?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM names", [])?;
        tx.execute("DELETE FROM dedupe_members", [])?;
        tx.execute("DELETE FROM load_meta", [])?;

        {
            let mut insert_name = tx.prepare(
                "INSERT INTO names (id, full_name, normalized_name) VALUES (?1, ?2, ?3)",
            )?;
            for record in registry.records() {
                insert_name.execute(params![record.id, record.full_name, record.normalized_name])?;
            }

            let mut insert_member =
                tx.prepare("INSERT INTO dedupe_members (member_id, rep_id) VALUES (?1, ?2)")?;
            for (rep_id, members) in registry.groups().iter() {
                for member_id in members {
                    insert_member.execute(params![member_id, rep_id])?;
                }
            }

            tx.execute(
                "INSERT INTO load_meta (key, value) VALUES (?1, ?2)",
                params![STATS_KEY, stats_json],
            )?;
        }

        tx.commit()?;

        tracing::info!(
            path = %self.path.display(),
            records = registry.len(),
            groups = registry.groups().len(),
            "sqlite registry reloaded"
        );
        Ok(registry.len())
    }

    /// Stats and dedupe groups of the last import.
    ///
    /// Databases written before stats were persisted get stats derived from
    /// the row count, tagged with `fallback_mode`.
    pub fn load_audit(&self, fallback_mode: DatasetMode) -> Result<RegistryAudit, RegistryError> {
        let stored: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM load_meta WHERE key = ?1",
                params![STATS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let stats = match stored {
            Some(json) => serde_json::from_str(&json)?,
            None => {
                let rows = self.row_count()?;
                RegistryStats {
                    storage: "sqlite".to_string(),
                    mode: fallback_mode,
                    source_rows: rows,
                    record_rows: rows,
                    dedupe_groups: 0,
                    dedupe_ratio: if rows > 0 { 1.0 } else { 0.0 },
                    key_drift_rows: 0,
                    dataset_path: None,
                    sqlite_path: None,
                    sqlite_loaded_rows: None,
                }
            }
        };

        let mut members: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT rep_id, member_id FROM dedupe_members ORDER BY rep_id, member_id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let rep_id: i64 = row.get(0)?;
            let member_id: i64 = row.get(1)?;
            members.entry(rep_id).or_default().push(member_id);
        }

        Ok(RegistryAudit {
            stats,
            groups: DedupeGroups::from_map(members),
        })
    }

    /// Streaming repository over this database file.
    pub fn repository(&self) -> SqliteRepository {
        SqliteRepository::new(&self.path)
    }
}

fn names_columns(conn: &Connection) -> Result<Vec<String>, RegistryError> {
    let mut stmt = conn.prepare("PRAGMA table_info(names)")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Rebuild a `names` table that predates the `full_name` column.
///
/// The name comes from `name` or `"Full Name"`; `normalized_name` is kept
/// when present and computed otherwise. A table with neither name column is
/// replaced by an empty one, which the loader then fills from the dataset.
fn migrate_legacy_names(conn: &mut Connection) -> Result<bool, RegistryError> {
    let columns = names_columns(conn)?;
    let has = |name: &str| columns.iter().any(|c| c == name);
    if columns.is_empty() || has("full_name") {
        return Ok(false);
    }

    let name_column = if has("name") {
        Some("name")
    } else if has("Full Name") {
        Some("\"Full Name\"")
    } else {
        None
    };
    let normalized_column = if has("normalized_name") {
        "normalized_name"
    } else {
        "NULL"
    };

    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS names_new;
         CREATE TABLE names_new (
             id INTEGER PRIMARY KEY,
             full_name TEXT NOT NULL,
             normalized_name TEXT NOT NULL
         );",
    )?;

    if let Some(name_column) = name_column {
        let mut rows: Vec<(i64, String, Option<String>)> = Vec::new();
        {
            let mut select = tx.prepare(&format!(
                "SELECT id, COALESCE({}, ''), {} FROM names ORDER BY id",
                name_column, normalized_column
            ))?;
            let mut cursor = select.query([])?;
            while let Some(row) = cursor.next()? {
                rows.push((row.get(0)?, row.get(1)?, row.get(2)?));
            }
        }

        let mut insert = tx.prepare(
            "INSERT INTO names_new (id, full_name, normalized_name) VALUES (?1, ?2, ?3)",
        )?;
        for (id, full_name, stored) in &rows {
            let normalized = stored.clone().unwrap_or_else(|| normalize(full_name));
            insert.execute(params![id, full_name, normalized])?;
        }
    }

    tx.execute_batch("DROP TABLE names; ALTER TABLE names_new RENAME TO names;")?;
    tx.commit()?;
    Ok(true)
}

/// Cursor-backed repository: each scan opens a read-only connection and
/// streams rows in id order.
#[derive(Debug, Clone)]
pub struct SqliteRepository {
    path: PathBuf,
}

impl SqliteRepository {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl NameRepository for SqliteRepository {
    fn for_each_record(&self, visit: &mut dyn FnMut(NameRecord)) -> Result<(), RegistryError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let mut stmt = conn.prepare("SELECT id, full_name, normalized_name FROM names ORDER BY id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            visit(NameRecord {
                id: row.get(0)?,
                full_name: row.get(1)?,
                normalized_name: row.get(2)?,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{collect_records, SourceRow};

    fn registry(mode: DatasetMode) -> Registry {
        let rows = vec![
            SourceRow::new(3, "Juan Pérez"),
            SourceRow::new(1, "Dr. Juan Perez"),
            SourceRow::new(2, "Ana Gómez"),
        ];
        Registry::from_rows(rows, mode).unwrap()
    }

    #[test]
    fn test_roundtrip_records_and_audit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("names.db");

        let mut store = SqliteStore::open(&path).unwrap();
        assert!(store.is_empty().unwrap());

        let source = registry(DatasetMode::StandardizedDedupe);
        assert_eq!(store.replace_all(&source).unwrap(), 2);
        assert_eq!(store.row_count().unwrap(), 2);

        let records = collect_records(&store.repository()).unwrap();
        assert_eq!(records, source.records());

        let audit = store.load_audit(DatasetMode::Original).unwrap();
        assert_eq!(audit.stats.storage, "sqlite");
        assert_eq!(audit.stats.mode, DatasetMode::StandardizedDedupe);
        assert_eq!(audit.stats.source_rows, 3);
        assert_eq!(audit.group_ids_by_rep_id(1), Some(&[1, 3][..]));
    }

    #[test]
    fn test_replace_all_overwrites_previous_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.db");

        let mut store = SqliteStore::open(&path).unwrap();
        store.replace_all(&registry(DatasetMode::StandardizedDedupe)).unwrap();
        store.replace_all(&registry(DatasetMode::Original)).unwrap();

        assert_eq!(store.row_count().unwrap(), 3);
        let audit = store.load_audit(DatasetMode::Original).unwrap();
        assert!(audit.groups.is_empty());
        assert_eq!(audit.stats.mode, DatasetMode::Original);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.replace_all(&registry(DatasetMode::Original)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.row_count().unwrap(), 3);
        let ids: Vec<i64> = collect_records(&store.repository())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    fn legacy_db(path: &Path, schema: &str, inserts: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(schema).unwrap();
        conn.execute_batch(inserts).unwrap();
    }

    #[test]
    fn test_open_migrates_legacy_name_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        legacy_db(
            &path,
            "CREATE TABLE names (id INTEGER PRIMARY KEY, name TEXT);",
            "INSERT INTO names VALUES (2, 'Ana Gómez'); INSERT INTO names VALUES (1, 'Dr. Juan Pérez');",
        );

        let store = SqliteStore::open(&path).unwrap();
        let records = collect_records(&store.repository()).unwrap();
        assert_eq!(
            records,
            vec![
                NameRecord::new(1, "Dr. Juan Pérez", "juan perez"),
                NameRecord::new(2, "Ana Gómez", "ana gomez"),
            ]
        );

        // reopening leaves the migrated table alone
        drop(store);
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[test]
    fn test_open_migrates_keeping_stored_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        legacy_db(
            &path,
            "CREATE TABLE names (id INTEGER PRIMARY KEY, \"Full Name\" TEXT, normalized_name TEXT);",
            "INSERT INTO names VALUES (7, 'JUAN PEREZ', 'juan perez key');",
        );

        let store = SqliteStore::open(&path).unwrap();
        let records = collect_records(&store.repository()).unwrap();
        assert_eq!(records, vec![NameRecord::new(7, "JUAN PEREZ", "juan perez key")]);
    }

    #[test]
    fn test_open_replaces_unknown_legacy_layout_with_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.db");
        legacy_db(
            &path,
            "CREATE TABLE names (id INTEGER PRIMARY KEY, label TEXT);",
            "INSERT INTO names VALUES (1, 'x');",
        );

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_audit_without_stored_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.db");
        let store = SqliteStore::open(&path).unwrap();

        let audit = store.load_audit(DatasetMode::Standardized).unwrap();
        assert_eq!(audit.stats.mode, DatasetMode::Standardized);
        assert_eq!(audit.stats.record_rows, 0);
        assert_eq!(audit.stats.dedupe_ratio, 0.0);
    }
}
