//! Character n-gram inverted index for candidate generation.
//!
//! Built once from a registry snapshot and never mutated afterwards, so it
//! can be shared across request threads without locking.

use std::collections::{BTreeSet, HashMap};

use super::normalize::padded_grams;
use super::MatchError;
use crate::registry::NameRecord;

/// Inverted index: n-gram -> ascending record ids.
#[derive(Debug, Clone)]
pub struct NgramIndex {
    n: usize,
    postings: HashMap<String, Vec<i64>>,
    all_ids: Vec<i64>,
}

impl NgramIndex {
    /// Index every record under each n-gram of its padded normalized name.
    pub fn build(records: &[NameRecord], n: usize) -> Result<Self, MatchError> {
        if n == 0 {
            return Err(MatchError::InvalidArgument(
                "n-gram length must be > 0".to_string(),
            ));
        }

        let mut inverted: HashMap<String, BTreeSet<i64>> = HashMap::new();
        let mut all_ids = BTreeSet::new();

        for record in records {
            all_ids.insert(record.id);
            for gram in padded_grams(&record.normalized_name, n) {
                inverted.entry(gram).or_default().insert(record.id);
            }
        }

        let postings = inverted
            .into_iter()
            .map(|(gram, ids)| (gram, ids.into_iter().collect()))
            .collect();

        Ok(Self {
            n,
            postings,
            all_ids: all_ids.into_iter().collect(),
        })
    }

    /// Candidate record ids for an already-normalized query, ascending.
    ///
    /// - No gram hits: every indexed id, uncapped.
    /// - More than `max_candidates` hits: the `max_candidates` smallest ids.
    pub fn candidates(&self, query_norm: &str, max_candidates: usize) -> Vec<i64> {
        let mut union = BTreeSet::new();
        for gram in padded_grams(query_norm, self.n) {
            if let Some(ids) = self.postings.get(&gram) {
                union.extend(ids.iter().copied());
            }
        }

        if union.is_empty() {
            return self.all_ids.clone();
        }

        union.into_iter().take(max_candidates).collect()
    }

    /// Ids posted under one gram (empty when unknown).
    pub fn posting(&self, gram: &str) -> &[i64] {
        self.postings.get(gram).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn gram_count(&self) -> usize {
        self.postings.len()
    }
}
