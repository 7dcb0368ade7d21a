//! In-memory registry: builds the active record set for a dataset mode.
//!
//! CHANGELOG:
//! - 10/19/2026 - Dataset modes, dedupe and load stats
//! - 01/10/2026 - Initial stub

use serde::Serialize;
use std::collections::HashSet;

use super::dedupe::{dedupe, DedupeGroups, KeyedRow};
use super::{DatasetMode, NameRecord, NameRepository, RegistryError, RegistryStats, SourceRow};
use crate::matching::normalize;

/// Stats plus dedupe groups: everything the audit endpoints need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryAudit {
    pub stats: RegistryStats,
    #[serde(skip)]
    pub groups: DedupeGroups,
}

impl RegistryAudit {
    pub fn group_ids_by_rep_id(&self, rep_id: i64) -> Option<&[i64]> {
        self.groups.group_ids_by_rep_id(rep_id)
    }
}

/// Authoritative record set, built once per load and never mutated.
#[derive(Debug, Clone)]
pub struct Registry {
    records: Vec<NameRecord>,
    groups: DedupeGroups,
    stats: RegistryStats,
}

/// Key a row is indexed under, and whether a precomputed key disagrees
/// with a fresh normalization.
fn resolve_key(row: &SourceRow, mode: DatasetMode) -> (String, bool) {
    let fresh = normalize(&row.full_name);
    if !mode.uses_clean_dataset() {
        return (fresh, false);
    }

    match row.strict_key.as_deref() {
        Some(key) if !key.is_empty() => {
            let drifted = key != fresh;
            (key.to_string(), drifted)
        }
        _ => (fresh, false),
    }
}

impl Registry {
    /// Build the record set from loader rows.
    ///
    /// Ids must be unique within one load; a duplicate rejects the load.
    pub fn from_rows(rows: Vec<SourceRow>, mode: DatasetMode) -> Result<Self, RegistryError> {
        let source_rows = rows.len();

        let mut seen = HashSet::with_capacity(source_rows);
        for row in &rows {
            if !seen.insert(row.id) {
                return Err(RegistryError::DuplicateId(row.id));
            }
        }

        let mut key_drift_rows = 0;
        let keyed: Vec<KeyedRow> = rows
            .into_iter()
            .map(|row| {
                let (key, drifted) = resolve_key(&row, mode);
                if drifted {
                    key_drift_rows += 1;
                    tracing::debug!(id = row.id, key = %key, "precomputed key differs from normalize()");
                }
                KeyedRow {
                    id: row.id,
                    full_name: row.full_name,
                    key,
                }
            })
            .collect();

        if key_drift_rows > 0 {
            tracing::warn!(
                key_drift_rows,
                "precomputed strict keys disagree with the normalizer; keeping precomputed keys"
            );
        }

        let (records, groups) = match mode {
            DatasetMode::StandardizedDedupe => dedupe(keyed),
            DatasetMode::Original | DatasetMode::Standardized => {
                let records = keyed
                    .into_iter()
                    .map(|row| NameRecord {
                        id: row.id,
                        full_name: row.full_name,
                        normalized_name: row.key,
                    })
                    .collect();
                (records, DedupeGroups::default())
            }
        };

        let record_rows = records.len();
        let dedupe_ratio = if source_rows > 0 {
            record_rows as f64 / source_rows as f64
        } else {
            0.0
        };

        let stats = RegistryStats {
            storage: "memory".to_string(),
            mode,
            source_rows,
            record_rows,
            dedupe_groups: groups.len(),
            dedupe_ratio,
            key_drift_rows,
            dataset_path: None,
            sqlite_path: None,
            sqlite_loaded_rows: None,
        };

        tracing::info!(
            mode = %mode,
            source_rows,
            record_rows,
            dedupe_groups = stats.dedupe_groups,
            "registry built"
        );

        Ok(Self {
            records,
            groups,
            stats,
        })
    }

    pub fn records(&self) -> &[NameRecord] {
        &self.records
    }

    pub fn groups(&self) -> &DedupeGroups {
        &self.groups
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Tag where the records came from.
    pub fn with_origin(mut self, storage: &str, dataset_path: Option<String>) -> Self {
        self.stats.storage = storage.to_string();
        self.stats.dataset_path = dataset_path;
        self
    }

    pub fn audit(&self) -> RegistryAudit {
        RegistryAudit {
            stats: self.stats.clone(),
            groups: self.groups.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl NameRepository for Registry {
    fn for_each_record(&self, visit: &mut dyn FnMut(NameRecord)) -> Result<(), RegistryError> {
        for record in &self.records {
            visit(record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::collect_records;

    fn rows() -> Vec<SourceRow> {
        vec![
            SourceRow::new(10, "Juan Pérez"),
            SourceRow::new(4, "Dr. Juan Perez"),
            SourceRow::new(7, "Ana Gómez"),
            SourceRow::new(2, "12345"),
        ]
    }

    #[test]
    fn test_original_mode_keeps_every_row() {
        let registry = Registry::from_rows(rows(), DatasetMode::Original).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.records()[0].normalized_name, "juan perez");
        // empty keys are kept outside dedupe
        assert_eq!(registry.records()[3].normalized_name, "");
        assert_eq!(registry.stats().dedupe_groups, 0);
        assert_eq!(registry.stats().dedupe_ratio, 1.0);
    }

    #[test]
    fn test_standardized_prefers_precomputed_key() {
        let rows = vec![
            SourceRow::new(1, "Juan Pérez").with_strict_key("juan perez"),
            SourceRow::new(2, "Ana-María Paz").with_strict_key("anamaria paz"),
            SourceRow::new(3, "Luis Ríos").with_strict_key(""),
        ];
        let registry = Registry::from_rows(rows, DatasetMode::Standardized).unwrap();

        assert_eq!(registry.records()[1].normalized_name, "anamaria paz");
        assert_eq!(registry.records()[2].normalized_name, "luis rios");
        assert_eq!(registry.stats().key_drift_rows, 1);
    }

    #[test]
    fn test_original_mode_ignores_precomputed_key() {
        let rows = vec![SourceRow::new(1, "Juan Pérez").with_strict_key("something else")];
        let registry = Registry::from_rows(rows, DatasetMode::Original).unwrap();
        assert_eq!(registry.records()[0].normalized_name, "juan perez");
        assert_eq!(registry.stats().key_drift_rows, 0);
    }

    #[test]
    fn test_dedupe_mode_collapses_groups() {
        let registry = Registry::from_rows(rows(), DatasetMode::StandardizedDedupe).unwrap();
        let stats = registry.stats();

        assert_eq!(stats.source_rows, 4);
        assert_eq!(stats.record_rows, 2);
        assert_eq!(stats.dedupe_groups, 2);
        assert_eq!(stats.dedupe_ratio, 0.5);

        let juan = &registry.records()[0];
        assert_eq!(juan.id, 4);
        assert_eq!(juan.full_name, "Dr. Juan Perez");
        assert_eq!(registry.groups().group_ids_by_rep_id(4), Some(&[4, 10][..]));

        // member rows = source rows minus empty keys
        assert_eq!(registry.groups().member_count(), 3);
    }

    #[test]
    fn test_duplicate_ids_reject_load() {
        let rows = vec![SourceRow::new(1, "Juan"), SourceRow::new(1, "Ana")];
        assert!(matches!(
            Registry::from_rows(rows, DatasetMode::Original),
            Err(RegistryError::DuplicateId(1))
        ));
    }

    #[test]
    fn test_empty_load() {
        let registry = Registry::from_rows(Vec::new(), DatasetMode::StandardizedDedupe).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.stats().dedupe_ratio, 0.0);
    }

    #[test]
    fn test_repository_visits_all_records() {
        let registry = Registry::from_rows(rows(), DatasetMode::Original).unwrap();
        let collected = collect_records(&registry).unwrap();
        assert_eq!(collected, registry.records());
    }
}
