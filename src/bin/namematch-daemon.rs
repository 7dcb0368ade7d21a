//! namematch-daemon - persistent match server with the index kept hot.
//!
//! CHANGELOG:
//! - 10/19/2026 - Connection cap and idle timeout flags
//! - 10/19/2026 - Loads the registry once and serves the match service
//! - 01/10/2026 - Initial implementation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use namematch::config::Settings;
use namematch::daemon::server::{DaemonServer, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS};
use namematch::daemon::service::MatchService;
use namematch::daemon::DEFAULT_SOCKET;

#[derive(Parser)]
#[command(name = "namematch-daemon")]
#[command(about = "Persistent daemon for namematch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon
    Start {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,

        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,

        /// Max concurrently open client connections
        #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS as u64, value_parser = clap::value_parser!(u64).range(1..))]
        max_connections: u64,

        /// Seconds a connection may idle between requests
        #[arg(long, default_value_t = DEFAULT_IDLE_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..))]
        idle_timeout: u64,
    },

    /// Stop the daemon
    Stop {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,
    },

    /// Check daemon status
    Status {
        /// Socket path
        #[arg(long, default_value = DEFAULT_SOCKET)]
        socket: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            socket,
            foreground,
            max_connections,
            idle_timeout,
        } => {
            let limits = Limits {
                max_connections: max_connections as usize,
                idle_timeout: Duration::from_secs(idle_timeout),
            };
            cmd_start(&socket, foreground, limits)
        }
        Commands::Stop { socket } => cmd_stop(&socket),
        Commands::Status { socket } => cmd_status(&socket),
    }
}

#[derive(Clone, Copy)]
struct Limits {
    max_connections: usize,
    idle_timeout: Duration,
}

fn serve(settings: &Settings, socket_path: &str, limits: Limits) -> Result<()> {
    let service = MatchService::from_settings(settings)?;
    tracing::info!(
        records = service.engine().record_count(),
        mode = %service.audit().stats.mode,
        "match service ready"
    );
    DaemonServer::new(Arc::new(service), socket_path)
        .with_limits(limits.max_connections, limits.idle_timeout)
        .serve()
}

fn cmd_start(socket: &str, foreground: bool, limits: Limits) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();

    // bad configuration should fail before we detach
    let settings = Settings::from_env().context("Invalid configuration")?;

    if let Some(parent) = Path::new(&socket_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    if foreground {
        tracing::info!("starting in foreground");
        return serve(&settings, &socket_path, limits);
    }

    use daemonize::Daemonize;

    let pid_file = format!("{}.pid", socket_path);
    let daemonize = Daemonize::new()
        .pid_file(&pid_file)
        .working_directory("/tmp");

    match daemonize.start() {
        Ok(_) => serve(&settings, &socket_path, limits),
        Err(e) => {
            eprintln!("Failed to daemonize: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_stop(socket: &str) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();
    let pid_file = format!("{}.pid", socket_path);

    let pid_str = std::fs::read_to_string(&pid_file)
        .with_context(|| format!("No pid file at {}", pid_file))?;
    let pid: i32 = pid_str.trim().parse().context("Corrupt pid file")?;

    // SAFETY: kill(2) with a pid read from our own pid file; no memory involved.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        tracing::warn!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
    }

    let _ = std::fs::remove_file(&pid_file);
    let _ = std::fs::remove_file(&socket_path);

    println!("Daemon stopped (pid {})", pid);
    Ok(())
}

fn cmd_status(socket: &str) -> Result<()> {
    let socket_path = shellexpand::tilde(socket).to_string();

    match std::os::unix::net::UnixStream::connect(&socket_path) {
        Ok(_) => {
            println!("Daemon running at {}", socket_path);
            Ok(())
        }
        Err(_) => {
            println!("Daemon not running");
            std::process::exit(1);
        }
    }
}
