//! In-process metrics: request/hit counters, rolling latency and candidate
//! windows, tie-break totals and query frequencies.
//!
//! Every update takes the lock once and does O(1) amortized work; the
//! snapshot is the only place that sorts.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use crate::matching::engine::round_to;
use crate::matching::{MatchError, TieBreakStats};
use crate::registry::RegistryStats;

/// Default rolling window size.
pub const DEFAULT_WINDOW: usize = 5000;

/// Default number of top queries in a snapshot.
pub const DEFAULT_TOP_K: usize = 10;

/// Fixed-capacity window; pushing past capacity drops the oldest value.
#[derive(Debug)]
struct Window {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Window {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Value at sorted index `floor(0.95 * (n - 1))`.
    fn p95(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.values.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let idx = (0.95 * (sorted.len() - 1) as f64).floor() as usize;
        sorted[idx]
    }
}

#[derive(Debug, Clone, Copy)]
struct QueryCount {
    count: u64,
    first_seen: u64,
}

#[derive(Debug)]
struct State {
    total_requests: u64,
    total_cache_hits: u64,
    queries: HashMap<String, QueryCount>,
    latency_ms: Window,
    candidates: Window,
    ties: TieBreakStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TieBreakSnapshot {
    pub tie_groups_total: u64,
    pub resolved_by_token_pct: f64,
    pub resolved_by_edit_pct: f64,
    pub resolved_by_id_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopQuery {
    pub query: String,
    pub count: u64,
}

/// Point-in-time report, in the shape served by the `metrics` method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub started_at: String,
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub total_cache_hits: u64,
    pub cache_hit_rate: f64,
    pub latency_ms_avg: f64,
    pub latency_ms_p95: f64,
    pub candidates_avg: f64,
    pub candidates_p95: f64,
    pub tie_break: TieBreakSnapshot,
    pub top_queries: Vec<TopQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<RegistryStats>,
}

impl MetricsSnapshot {
    pub fn with_repo(mut self, stats: RegistryStats) -> Self {
        self.repo = Some(stats);
        self
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Process-lifetime metrics collector. Counters only ever grow.
#[derive(Debug)]
pub struct Metrics {
    started: Instant,
    started_at: DateTime<Utc>,
    state: Mutex<State>,
}

impl Metrics {
    pub fn new(window: usize) -> Result<Self, MatchError> {
        if window == 0 {
            return Err(MatchError::InvalidArgument(
                "metrics window must be > 0".to_string(),
            ));
        }
        Ok(Self {
            started: Instant::now(),
            started_at: Utc::now(),
            state: Mutex::new(State {
                total_requests: 0,
                total_cache_hits: 0,
                queries: HashMap::new(),
                latency_ms: Window::new(window),
                candidates: Window::new(window),
                ties: TieBreakStats::default(),
            }),
        })
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn record_request(&self, query_norm: &str) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        let seq = state.queries.len() as u64;
        state
            .queries
            .entry(query_norm.to_string())
            .or_insert(QueryCount {
                count: 0,
                first_seen: seq,
            })
            .count += 1;
    }

    pub fn record_cache_hit(&self) {
        self.state.lock().total_cache_hits += 1;
    }

    pub fn record_search(&self, latency_ms: f64, candidate_count: usize) {
        let mut state = self.state.lock();
        state.latency_ms.push(latency_ms);
        state.candidates.push(candidate_count as f64);
    }

    pub fn record_tie_stats(&self, ties: &TieBreakStats) {
        let mut state = self.state.lock();
        state.ties.groups += ties.groups;
        state.ties.by_token += ties.by_token;
        state.ties.by_edit += ties.by_edit;
        state.ties.by_id += ties.by_id;
    }

    /// Snapshot with the `top_k` most frequent queries; equal counts keep
    /// first-seen order.
    pub fn snapshot(&self, top_k: usize) -> MetricsSnapshot {
        let state = self.state.lock();

        let mut top: Vec<(&String, QueryCount)> =
            state.queries.iter().map(|(q, c)| (q, *c)).collect();
        top.sort_by(|a, b| {
            b.1.count
                .cmp(&a.1.count)
                .then_with(|| a.1.first_seen.cmp(&b.1.first_seen))
        });
        let top_queries = top
            .into_iter()
            .take(top_k)
            .map(|(query, c)| TopQuery {
                query: query.clone(),
                count: c.count,
            })
            .collect();

        let ties = state.ties;
        MetricsSnapshot {
            started_at: self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            uptime_seconds: round_to(self.started.elapsed().as_secs_f64(), 2),
            total_requests: state.total_requests,
            total_cache_hits: state.total_cache_hits,
            cache_hit_rate: round_to(ratio(state.total_cache_hits, state.total_requests), 4),
            latency_ms_avg: round_to(state.latency_ms.mean(), 2),
            latency_ms_p95: round_to(state.latency_ms.p95(), 2),
            candidates_avg: round_to(state.candidates.mean(), 2),
            candidates_p95: round_to(state.candidates.p95(), 2),
            tie_break: TieBreakSnapshot {
                tie_groups_total: ties.groups,
                resolved_by_token_pct: round_to(ratio(ties.by_token, ties.groups), 4),
                resolved_by_edit_pct: round_to(ratio(ties.by_edit, ties.groups), 4),
                resolved_by_id_pct: round_to(ratio(ties.by_id, ties.groups), 4),
            },
            top_queries,
            repo: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let metrics = Metrics::new(DEFAULT_WINDOW).unwrap();
        let snap = metrics.snapshot(DEFAULT_TOP_K);
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.cache_hit_rate, 0.0);
        assert_eq!(snap.latency_ms_p95, 0.0);
        assert_eq!(snap.tie_break.resolved_by_id_pct, 0.0);
        assert!(snap.top_queries.is_empty());
        assert!(snap.repo.is_none());
    }

    #[test]
    fn test_zero_window_rejected() {
        assert!(Metrics::new(0).is_err());
    }

    #[test]
    fn test_hit_rate() {
        let metrics = Metrics::new(10).unwrap();
        for _ in 0..3 {
            metrics.record_request("juan");
        }
        metrics.record_cache_hit();
        assert_eq!(metrics.snapshot(5).cache_hit_rate, 0.3333);
    }

    #[test]
    fn test_p95_uses_floor_index() {
        let metrics = Metrics::new(100).unwrap();
        for v in 1..=20 {
            metrics.record_search(v as f64, v);
        }
        let snap = metrics.snapshot(0);
        // floor(0.95 * 19) = 18 -> 19th smallest
        assert_eq!(snap.latency_ms_p95, 19.0);
        assert_eq!(snap.candidates_p95, 19.0);
        assert_eq!(snap.latency_ms_avg, 10.5);
    }

    #[test]
    fn test_window_drops_oldest() {
        let metrics = Metrics::new(3).unwrap();
        for v in [100.0, 1.0, 2.0, 3.0] {
            metrics.record_search(v, 0);
        }
        let snap = metrics.snapshot(0);
        assert_eq!(snap.latency_ms_avg, 2.0);
        assert_eq!(snap.latency_ms_p95, 2.0);
    }

    #[test]
    fn test_top_queries_ties_keep_first_seen_order() {
        let metrics = Metrics::new(10).unwrap();
        for q in ["b", "a", "c", "a", "c", "d"] {
            metrics.record_request(q);
        }
        let top: Vec<(String, u64)> = metrics
            .snapshot(3)
            .top_queries
            .into_iter()
            .map(|t| (t.query, t.count))
            .collect();
        assert_eq!(
            top,
            vec![("a".to_string(), 2), ("c".to_string(), 2), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn test_tie_percentages() {
        let metrics = Metrics::new(10).unwrap();
        metrics.record_tie_stats(&TieBreakStats {
            groups: 3,
            by_token: 1,
            by_edit: 0,
            by_id: 2,
        });
        metrics.record_tie_stats(&TieBreakStats::default());

        let ties = metrics.snapshot(0).tie_break;
        assert_eq!(ties.tie_groups_total, 3);
        assert_eq!(ties.resolved_by_token_pct, 0.3333);
        assert_eq!(ties.resolved_by_edit_pct, 0.0);
        assert_eq!(ties.resolved_by_id_pct, 0.6667);
    }

    #[test]
    fn test_snapshot_serializes_field_names() {
        let metrics = Metrics::new(10).unwrap();
        let json = serde_json::to_value(metrics.snapshot(1)).unwrap();
        for field in [
            "uptime_seconds",
            "total_requests",
            "total_cache_hits",
            "cache_hit_rate",
            "latency_ms_avg",
            "latency_ms_p95",
            "candidates_avg",
            "candidates_p95",
            "tie_break",
            "top_queries",
        ] {
            assert!(json.get(field).is_some(), "missing {}", field);
        }
        assert!(json.get("repo").is_none());
    }
}
