//! namematch - fuzzy person-name matching CLI
//!
//! One-shot commands against the configured registry. Settings come from the
//! environment (see `config`); global flags override them.
//!
//! CHANGELOG:
//! - 10/19/2026 - Match, normalize, group, stats and import commands
//! - 01/10/2026 - Initial scaffold with CLI skeleton

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use namematch::commands;
use namematch::config::{Settings, StorageKind};
use namematch::daemon::service::{MatchRequest, DEFAULT_LIMIT, DEFAULT_THRESHOLD};
use namematch::matching::fuzzy::DEFAULT_W_TOKEN;
use namematch::output;
use namematch::registry::DatasetMode;

/// Fuzzy person-name matching against a reference registry.
#[derive(Parser, Debug)]
#[command(name = "namematch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Compact JSON output (no whitespace)
    #[arg(long, global = true)]
    compact: bool,

    /// Comma-separated field allowlist
    #[arg(long, global = true)]
    fields: Option<String>,

    /// Registry storage (overrides STORAGE)
    #[arg(long, global = true, value_parser = parse_storage)]
    storage: Option<StorageKind>,

    /// Dataset mode: original, standardized, standardized+dedupe (overrides DATASET_MODE)
    #[arg(long, global = true, value_parser = parse_mode)]
    mode: Option<DatasetMode>,

    /// Data directory holding raw/ and clean/ (overrides DATA_ROOT)
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Explicit dataset CSV (overrides CSV_PATH)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// SQLite database path (overrides SQLITE_PATH)
    #[arg(long, global = true)]
    sqlite_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank registry names against a query
    Match {
        /// Name to look up
        name: String,

        /// Minimum similarity (0-100)
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Max results (1-100)
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Token-set weight in the combined score (0-1)
        #[arg(short, long, default_value_t = DEFAULT_W_TOKEN)]
        w_token: f64,

        /// Include token and edit scores per hit
        #[arg(long)]
        explain: bool,

        /// Omit the id-keyed result map
        #[arg(long)]
        no_by_id: bool,
    },

    /// Print the normalized form of a name
    Normalize {
        /// Raw text
        text: String,
    },

    /// Show the source ids merged into a representative record
    Group {
        /// Representative id
        rep_id: i64,
    },

    /// Load the registry and print load stats
    Stats,

    /// Re-import the dataset into SQLite
    Import,
}

fn parse_storage(s: &str) -> Result<StorageKind, String> {
    s.parse()
}

fn parse_mode(s: &str) -> Result<DatasetMode, String> {
    s.parse().map_err(|e: namematch::registry::RegistryError| e.to_string())
}

impl Cli {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::from_env()?;
        if let Some(storage) = self.storage {
            settings.storage = storage;
        }
        if let Some(mode) = self.mode {
            settings.dataset_mode = mode;
        }
        if let Some(root) = &self.data_root {
            settings.data_root = root.clone();
        }
        if let Some(csv) = &self.csv {
            settings.csv_path = Some(csv.clone());
        }
        if let Some(path) = &self.sqlite_path {
            settings.sqlite_path = path.clone();
        }
        Ok(settings)
    }
}

fn run(cli: &Cli, output_controls: &output::OutputControls) -> anyhow::Result<()> {
    match &cli.command {
        Command::Normalize { text } => commands::matching::normalize_text(text, output_controls),
        Command::Match {
            name,
            threshold,
            limit,
            w_token,
            explain,
            no_by_id,
        } => {
            let request = MatchRequest {
                name: name.clone(),
                threshold: *threshold,
                limit: *limit,
                w_token: *w_token,
                explain: *explain,
                include_by_id: !*no_by_id,
            };
            commands::matching::find(&cli.settings()?, &request, output_controls)
        }
        Command::Group { rep_id } => {
            commands::registry::group(&cli.settings()?, *rep_id, output_controls)
        }
        Command::Stats => commands::registry::stats(&cli.settings()?, output_controls),
        Command::Import => commands::registry::import(&cli.settings()?, output_controls),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let output_controls = output::OutputControls {
        json: cli.json,
        compact: cli.compact,
        fields: cli.fields.clone(),
    };

    match run(&cli, &output_controls) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if output_controls.wants_json() {
                println!("{}", output::format_error(&format!("{:#}", e)));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}
