//! Search engine: candidate generation, scoring, deterministic ranking.
//!
//! Ordering is fully determined by the raw (unrounded) scores:
//! 1. similarity desc
//! 2. token score desc
//! 3. edit score desc
//! 4. id asc
//!
//! Scores are rounded for display only after sorting and truncation.
//!
//! CHANGELOG:
//! - 10/19/2026 - Tie-break accounting moved next to the ranker
//! - 10/19/2026 - Initial implementation

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use super::fuzzy::{combine, edit_ratio, token_set_ratio};
use super::index::NgramIndex;
use super::MatchError;
use crate::registry::NameRecord;

/// Default n-gram length for the candidate index.
pub const DEFAULT_NGRAM_N: usize = 3;

/// Default safety cap on the candidate set size.
pub const DEFAULT_MAX_CANDIDATES: usize = 2000;

/// Round to a fixed number of decimals (display only). Exact halves go to
/// the even neighbor, so `0.125` rounds to `0.12` at two decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Index/engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchConfig {
    pub ngram_n: usize,
    /// Candidate sets above this size keep only the smallest ids.
    pub max_candidates: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ngram_n: DEFAULT_NGRAM_N,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.ngram_n == 0 {
            return Err(MatchError::InvalidArgument(
                "ngram_n must be > 0".to_string(),
            ));
        }
        if self.max_candidates == 0 {
            return Err(MatchError::InvalidArgument(
                "max_candidates must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// One ranked, explainable match. Scores are rounded (2 decimals, `w_token` 3).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub id: i64,
    pub full_name: String,
    pub token_score: f64,
    pub edit_score: f64,
    pub similarity: f64,
    pub w_token: f64,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub matches: Vec<ScoredMatch>,
    /// Size of the candidate set examined, before the threshold filter.
    pub candidate_count: usize,
}

/// How tie groups in one result list were resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TieBreakStats {
    pub groups: u64,
    pub by_token: u64,
    pub by_edit: u64,
    pub by_id: u64,
}

impl TieBreakStats {
    /// Classify every run of equal (rounded) similarity in a ranked list.
    ///
    /// A run of length > 1 is one tie group. It counts as resolved by the
    /// first field that varies inside it: token score, then edit score,
    /// otherwise id.
    pub fn from_matches(matches: &[ScoredMatch]) -> Self {
        let mut stats = Self::default();
        let mut start = 0;

        while start < matches.len() {
            let similarity = matches[start].similarity;
            let mut end = start + 1;
            while end < matches.len() && matches[end].similarity == similarity {
                end += 1;
            }

            let group = &matches[start..end];
            if group.len() > 1 {
                stats.groups += 1;
                let first = &group[0];
                if group.iter().any(|m| m.token_score != first.token_score) {
                    stats.by_token += 1;
                } else if group.iter().any(|m| m.edit_score != first.edit_score) {
                    stats.by_edit += 1;
                } else {
                    stats.by_id += 1;
                }
            }

            start = end;
        }

        stats
    }
}

/// Raw scores of a kept candidate, before rounding.
#[derive(Debug, Clone, Copy)]
struct RawScore {
    id: i64,
    token: f64,
    edit: f64,
    similarity: f64,
}

fn rank_order(a: &RawScore, b: &RawScore) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| b.token.total_cmp(&a.token))
        .then_with(|| b.edit.total_cmp(&a.edit))
        .then_with(|| a.id.cmp(&b.id))
}

/// Immutable search engine over one registry snapshot.
#[derive(Debug)]
pub struct SearchEngine {
    config: SearchConfig,
    index: NgramIndex,
    records: HashMap<i64, NameRecord>,
}

impl SearchEngine {
    /// Build the index over `records`. Ids must be unique.
    pub fn build(records: Vec<NameRecord>, config: SearchConfig) -> Result<Self, MatchError> {
        config.validate()?;

        let index = NgramIndex::build(&records, config.ngram_n)?;

        let mut by_id = HashMap::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if by_id.insert(id, record).is_some() {
                return Err(MatchError::InvalidArgument(format!(
                    "duplicate record id {}",
                    id
                )));
            }
        }

        tracing::info!(
            records = by_id.len(),
            grams = index.gram_count(),
            ngram_n = config.ngram_n,
            max_candidates = config.max_candidates,
            "search index built"
        );

        Ok(Self {
            config,
            index,
            records: by_id,
        })
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Score, filter and sort candidates by raw score; returns the ranked
    /// list (untruncated) and the candidate count.
    fn rank(&self, query_norm: &str, threshold: f64, w_token: f64) -> (Vec<RawScore>, usize) {
        let candidate_ids = self.index.candidates(query_norm, self.config.max_candidates);
        let candidate_count = candidate_ids.len();

        let mut kept: Vec<RawScore> = candidate_ids
            .par_iter()
            .filter_map(|id| {
                let record = self.records.get(id)?;
                let token = token_set_ratio(query_norm, &record.normalized_name);
                let edit = edit_ratio(query_norm, &record.normalized_name);
                let similarity = combine(token, edit, w_token);
                (similarity >= threshold).then_some(RawScore {
                    id: *id,
                    token,
                    edit,
                    similarity,
                })
            })
            .collect();

        kept.sort_by(rank_order);
        (kept, candidate_count)
    }

    /// Ranked matches for an already-normalized query.
    ///
    /// Fails only when `w_token` is outside `[0, 1]`; every other input
    /// produces a (possibly empty) result.
    pub fn search(
        &self,
        query_norm: &str,
        threshold: f64,
        limit: usize,
        w_token: f64,
    ) -> Result<SearchOutcome, MatchError> {
        if !(0.0..=1.0).contains(&w_token) {
            return Err(MatchError::InvalidArgument(format!(
                "w_token must be between 0 and 1, got {}",
                w_token
            )));
        }

        let (mut ranked, candidate_count) = self.rank(query_norm, threshold, w_token);
        ranked.truncate(limit);

        let matches = ranked
            .into_iter()
            .filter_map(|raw| {
                let record = self.records.get(&raw.id)?;
                Some(ScoredMatch {
                    id: raw.id,
                    full_name: record.full_name.clone(),
                    token_score: round_to(raw.token, 2),
                    edit_score: round_to(raw.edit, 2),
                    similarity: round_to(raw.similarity, 2),
                    w_token: round_to(w_token, 3),
                })
            })
            .collect();

        tracing::debug!(query = query_norm, candidate_count, "search finished");

        Ok(SearchOutcome {
            matches,
            candidate_count,
        })
    }
}
