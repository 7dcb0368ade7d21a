//! Name matching: normalization, n-gram candidate index, scoring and ranking.
//!
//! CHANGELOG:
//! - 10/19/2026 - Split engine/index out of the old fuzzy helper module

pub mod engine;
pub mod fuzzy;
pub mod index;
pub mod normalize;

use thiserror::Error;

/// Errors raised by the matching core.
///
/// Only bad configuration ends up here - degenerate queries (empty text,
/// no n-gram hits) are handled by fallback policy and never fail.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub use engine::{ScoredMatch, SearchConfig, SearchEngine, SearchOutcome, TieBreakStats};
pub use index::NgramIndex;
pub use normalize::{char_ngrams, normalize};
