//! Command implementations.
//!
//! CHANGELOG:
//! - 10/19/2026 - Replaced message commands with match/normalize/registry commands
//! - 01/10/2026 - Initial module structure

pub mod matching;
pub mod registry;
