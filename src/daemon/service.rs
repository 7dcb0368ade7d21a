//! Match service: owns the engine, cache and metrics, and answers method
//! calls from the daemon, the CLI and tests.
//!
//! All hot state is built once at startup. Per request only the cache and
//! the metrics collector are mutated, each behind its own short lock; the
//! scoring itself runs without holding either.
//!
//! CHANGELOG:
//! - 10/19/2026 - Rebuilt around the name matcher (match/metrics/group/normalize)
//! - 01/10/2026 - Initial implementation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::cache::{CacheKey, QueryCache};
use crate::config::Settings;
use crate::daemon::protocol::{codes, Params};
use crate::matching::fuzzy::DEFAULT_W_TOKEN;
use crate::matching::{normalize, MatchError, SearchEngine, TieBreakStats};
use crate::metrics::{Metrics, MetricsSnapshot, DEFAULT_TOP_K};
use crate::registry::{collect_records, loader, RegistryAudit};

pub const DEFAULT_THRESHOLD: f64 = 70.0;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ServiceError {
    /// Wire error code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::InvalidArgument(_) | ServiceError::Match(_) => codes::INVALID_ARGUMENT,
            ServiceError::NotFound(_) => codes::NOT_FOUND,
            ServiceError::UnknownMethod(_) => codes::UNKNOWN_METHOD,
            ServiceError::Encode(_) => codes::ERROR,
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_w_token() -> f64 {
    DEFAULT_W_TOKEN
}

fn default_true() -> bool {
    true
}

/// Parameters of one `match` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub name: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_w_token")]
    pub w_token: f64,
    /// Include token/edit scores and the weight in each hit.
    #[serde(default)]
    pub explain: bool,
    /// Also return hits keyed by id.
    #[serde(default = "default_true")]
    pub include_by_id: bool,
}

impl MatchRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_LIMIT,
            w_token: DEFAULT_W_TOKEN,
            explain: false,
            include_by_id: true,
        }
    }

    /// Range checks; out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ServiceError::InvalidArgument(format!(
                "threshold must be between 0 and 100, got {}",
                self.threshold
            )));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(ServiceError::InvalidArgument(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, self.limit
            )));
        }
        if !(0.0..=1.0).contains(&self.w_token) {
            return Err(ServiceError::InvalidArgument(format!(
                "w_token must be between 0 and 1, got {}",
                self.w_token
            )));
        }
        Ok(())
    }

    fn cache_key(&self, query_norm: &str) -> CacheKey {
        CacheKey::new(
            query_norm,
            self.threshold,
            self.limit,
            self.w_token,
            self.explain,
            self.include_by_id,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchHit {
    pub id: i64,
    pub name: String,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w_token: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchById {
    pub name: String,
    pub similarity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w_token: Option<f64>,
}

/// `results` carries the ranking; `results_by_id` is a lookup convenience.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResponse {
    pub results: Vec<MatchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_by_id: Option<BTreeMap<i64, MatchById>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMembers {
    pub rep_id: i64,
    pub member_ids: Vec<i64>,
}

pub struct MatchService {
    engine: Arc<SearchEngine>,
    cache: QueryCache<MatchResponse>,
    metrics: Metrics,
    audit: RegistryAudit,
}

impl MatchService {
    pub fn new(
        engine: Arc<SearchEngine>,
        audit: RegistryAudit,
        cache_max: usize,
        metrics_window: usize,
    ) -> Result<Self, MatchError> {
        Ok(Self {
            engine,
            cache: QueryCache::new(cache_max)?,
            metrics: Metrics::new(metrics_window)?,
            audit,
        })
    }

    /// Load the registry and build the index as configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let loaded = loader::load(settings).context("Failed to load name registry")?;
        let records = collect_records(loaded.repository.as_ref())
            .context("Failed to read registry records")?;
        let engine = SearchEngine::build(records, settings.search)
            .context("Failed to build search index")?;

        Ok(Self::new(
            Arc::new(engine),
            loaded.audit,
            settings.cache_max,
            settings.metrics_window,
        )?)
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn cache(&self) -> &QueryCache<MatchResponse> {
        &self.cache
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn audit(&self) -> &RegistryAudit {
        &self.audit
    }

    /// Validate, normalize, serve from cache or search, and record metrics.
    pub fn run_match(&self, request: &MatchRequest) -> Result<Arc<MatchResponse>, ServiceError> {
        request.validate()?;

        let query_norm = normalize(&request.name);
        self.metrics.record_request(&query_norm);

        let key = request.cache_key(&query_norm);
        if let Some(cached) = self.cache.get(&key) {
            self.metrics.record_cache_hit();
            tracing::debug!(query = %query_norm, "cache hit");
            return Ok(cached);
        }

        let started = Instant::now();
        let outcome = self.engine.search(
            &query_norm,
            request.threshold,
            request.limit,
            request.w_token,
        )?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        self.metrics.record_search(latency_ms, outcome.candidate_count);
        self.metrics
            .record_tie_stats(&TieBreakStats::from_matches(&outcome.matches));

        let explain = request.explain;
        let results: Vec<MatchHit> = outcome
            .matches
            .into_iter()
            .map(|m| MatchHit {
                id: m.id,
                name: m.full_name,
                similarity: m.similarity,
                token_score: explain.then_some(m.token_score),
                edit_score: explain.then_some(m.edit_score),
                w_token: explain.then_some(m.w_token),
            })
            .collect();

        let results_by_id = request.include_by_id.then(|| {
            results
                .iter()
                .map(|hit| {
                    (
                        hit.id,
                        MatchById {
                            name: hit.name.clone(),
                            similarity: hit.similarity,
                            token_score: hit.token_score,
                            edit_score: hit.edit_score,
                            w_token: hit.w_token,
                        },
                    )
                })
                .collect()
        });

        tracing::debug!(
            query = %query_norm,
            hits = results.len(),
            latency_ms,
            "match served"
        );

        let response = Arc::new(MatchResponse {
            results,
            results_by_id,
        });
        self.cache.set(key, Arc::clone(&response));
        Ok(response)
    }

    /// Metrics snapshot with the registry audit attached.
    pub fn metrics_snapshot(&self, top_k: usize) -> MetricsSnapshot {
        self.metrics
            .snapshot(top_k)
            .with_repo(self.audit.stats.clone())
    }

    /// Source ids that collapsed into `rep_id`.
    pub fn group(&self, rep_id: i64) -> Result<GroupMembers, ServiceError> {
        let members = self.audit.group_ids_by_rep_id(rep_id).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "no dedupe group with representative {} (mode {})",
                rep_id, self.audit.stats.mode
            ))
        })?;
        Ok(GroupMembers {
            rep_id,
            member_ids: members.to_vec(),
        })
    }

    pub fn health(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "pid": std::process::id(),
            "started_at": self.metrics.started_at().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
            "records": self.engine.record_count(),
            "mode": self.audit.stats.mode,
            "storage": self.audit.stats.storage,
            "cache_entries": self.cache.entry_count(),
            "cache_capacity": self.cache.capacity(),
        })
    }

    /// Dispatch one method call.
    pub fn dispatch(&self, method: &str, params: Params) -> Result<serde_json::Value, ServiceError> {
        match method {
            "health" => Ok(self.health()),
            "match" => {
                let request: MatchRequest = parse_params(params)?;
                let response = self.run_match(&request)?;
                Ok(serde_json::to_value(response.as_ref())?)
            }
            "metrics" => {
                let top_k = optional_u64(&params, "top_k")?
                    .map(|k| k as usize)
                    .unwrap_or(DEFAULT_TOP_K);
                Ok(serde_json::to_value(self.metrics_snapshot(top_k))?)
            }
            "group" => {
                let rep_id = required_i64(&params, "rep_id")?;
                Ok(serde_json::to_value(self.group(rep_id)?)?)
            }
            "normalize" => {
                let text = params
                    .get("text")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ServiceError::InvalidArgument("text is required".to_string()))?;
                Ok(serde_json::json!({
                    "text": text,
                    "normalized": normalize(text),
                }))
            }
            _ => Err(ServiceError::UnknownMethod(method.to_string())),
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Params) -> Result<T, ServiceError> {
    let object: serde_json::Map<String, serde_json::Value> = params.into_iter().collect();
    serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| ServiceError::InvalidArgument(e.to_string()))
}

fn optional_u64(params: &Params, key: &str) -> Result<Option<u64>, ServiceError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            ServiceError::InvalidArgument(format!("{} must be a non-negative integer", key))
        }),
    }
}

fn required_i64(params: &Params, key: &str) -> Result<i64, ServiceError> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ServiceError::InvalidArgument(format!("{} must be an integer", key)))
}
