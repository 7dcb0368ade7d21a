//! namematch-client - thin client for daemon mode.
//!
//! ```text
//! namematch-client match --params '{"name":"Juan Perez","explain":true}'
//! ```
//!
//! CHANGELOG:
//! - 10/19/2026 - Uses the shared protocol types
//! - 01/10/2026 - Initial implementation

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use namematch::daemon::protocol::{Params, Request, Response};
use namematch::daemon::DEFAULT_SOCKET;

#[derive(Parser)]
#[command(name = "namematch-client")]
#[command(about = "Thin client for the namematch daemon")]
struct Cli {
    /// Method to call (health, match, metrics, group, normalize)
    method: String,

    /// Socket path
    #[arg(long, default_value = DEFAULT_SOCKET)]
    socket: String,

    /// JSON parameters (as string)
    #[arg(long)]
    params: Option<String>,

    /// Request timeout (seconds)
    #[arg(long, default_value = "5.0")]
    timeout: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let params: Params = match cli.params.as_deref() {
        Some(p) => serde_json::from_str(p).context("--params must be a JSON object")?,
        None => Params::new(),
    };
    let request = Request::new(&cli.method, params);

    let socket_path = shellexpand::tilde(&cli.socket).to_string();
    let stream = UnixStream::connect(&socket_path)
        .with_context(|| format!("Daemon not reachable at {}", socket_path))?;

    let timeout = Duration::from_secs_f64(cli.timeout);
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    (&stream).write_all(request.to_ndjson_line()?.as_bytes())?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response = Response::from_ndjson_line(response_line.trim_end())?;
    if response.ok {
        let result = response.result.unwrap_or(serde_json::Value::Null);
        println!("{}", serde_json::to_string_pretty(&result)?);
        Ok(())
    } else {
        match response.error {
            Some(error) => eprintln!("Error [{}]: {}", error.code, error.message),
            None => eprintln!("Error: unknown"),
        }
        std::process::exit(1);
    }
}
