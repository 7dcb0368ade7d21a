//! Collapse rows sharing a strict key into representative records.

use serde::Serialize;
use std::collections::BTreeMap;

use super::NameRecord;

/// A source row with its resolved strict key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedRow {
    pub id: i64,
    pub full_name: String,
    pub key: String,
}

/// Representative id -> sorted ids of every source row in its group.
///
/// Frozen after the load; only used for audit lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupeGroups {
    members: BTreeMap<i64, Vec<i64>>,
}

impl DedupeGroups {
    pub(crate) fn from_map(members: BTreeMap<i64, Vec<i64>>) -> Self {
        Self { members }
    }

    /// Source ids that collapsed into `rep_id`, ascending.
    pub fn group_ids_by_rep_id(&self, rep_id: i64) -> Option<&[i64]> {
        self.members.get(&rep_id).map(Vec::as_slice)
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Total source rows across all groups.
    pub fn member_count(&self) -> usize {
        self.members.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[i64])> {
        self.members.iter().map(|(rep, ids)| (*rep, ids.as_slice()))
    }
}

/// Group rows by key, dropping empty keys.
///
/// Each group becomes one record: the minimum id is the representative and
/// keeps its own display name; the shared key is the normalized name.
/// Records come back in ascending id order.
pub fn dedupe(rows: Vec<KeyedRow>) -> (Vec<NameRecord>, DedupeGroups) {
    let mut by_key: BTreeMap<String, Vec<(i64, String)>> = BTreeMap::new();
    for row in rows {
        if row.key.is_empty() {
            continue;
        }
        by_key.entry(row.key).or_default().push((row.id, row.full_name));
    }

    let mut records = Vec::with_capacity(by_key.len());
    let mut members = BTreeMap::new();

    for (key, mut group) in by_key {
        group.sort_by_key(|(id, _)| *id);
        let ids: Vec<i64> = group.iter().map(|(id, _)| *id).collect();
        let Some((rep_id, rep_name)) = group.into_iter().next() else {
            continue;
        };

        records.push(NameRecord {
            id: rep_id,
            full_name: rep_name,
            normalized_name: key,
        });
        members.insert(rep_id, ids);
    }

    records.sort_by_key(|r| r.id);
    (records, DedupeGroups::from_map(members))
}
