//! Daemon mode: persistent server with the index kept hot.
//!
//! CHANGELOG:
//! - 10/19/2026 - Serves the match service
//! - 01/10/2026 - Initial module structure

pub mod protocol;
pub mod server;
pub mod service;

/// Default socket location (tilde-expanded by the binaries).
pub const DEFAULT_SOCKET: &str = "~/.namematch/daemon.sock";
