//! namematch library
//!
//! Fuzzy person-name resolution against a reference registry. Exposes the
//! matching core plus the registry, cache, metrics and daemon layers used by
//! the CLI, daemon and client binaries.
//!
//! CHANGELOG:
//! - 10/19/2026 - Matching core, registry, cache and metrics modules
//! - 01/10/2026 - Initial library structure

pub mod cache;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod matching;
pub mod metrics;
pub mod output;
pub mod registry;
