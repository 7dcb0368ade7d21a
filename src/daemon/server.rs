//! UNIX socket server for daemon mode.
//!
//! Each accepted connection is served on its own thread against one shared
//! `MatchService`, with at most `max_connections` open at once. A connection
//! may send any number of NDJSON requests; each gets exactly one response
//! line, in order. Connections idle past `idle_timeout` are closed.
//!
//! CHANGELOG:
//! - 10/19/2026 - Connection cap, idle read timeout, non-UTF-8 lines answered
//! - 10/19/2026 - Thread per connection, multiple requests per connection
//! - 01/10/2026 - Initial implementation

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::daemon::protocol::{codes, Request, Response};
use crate::daemon::service::MatchService;

/// Default cap on concurrently open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 64;

/// Default time a connection may sit between requests.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DaemonServer {
    service: Arc<MatchService>,
    socket_path: PathBuf,
    max_connections: usize,
    idle_timeout: Duration,
}

/// Releases a connection slot when the handler thread ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl DaemonServer {
    pub fn new(service: Arc<MatchService>, socket_path: impl AsRef<Path>) -> Self {
        Self {
            service,
            socket_path: socket_path.as_ref().to_path_buf(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Override the connection cap (at least 1) and the idle timeout.
    pub fn with_limits(mut self, max_connections: usize, idle_timeout: Duration) -> Self {
        self.max_connections = max_connections.max(1);
        self.idle_timeout = idle_timeout;
        self
    }

    /// Bind the socket (replacing a stale one) with owner-only permissions.
    pub fn bind(&self) -> Result<UnixListener> {
        let _ = std::fs::remove_file(&self.socket_path);
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind {}", self.socket_path.display()))?;

        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;

        Ok(listener)
    }

    /// Start serving requests (blocking).
    pub fn serve(&self) -> Result<()> {
        let listener = self.bind()?;
        tracing::info!(
            socket = %self.socket_path.display(),
            max_connections = self.max_connections,
            idle_timeout_s = self.idle_timeout.as_secs_f64(),
            "daemon listening"
        );
        self.serve_listener(listener)
    }

    /// Accept loop over an already bound listener.
    ///
    /// Only this loop takes slots, so checking then incrementing the counter
    /// cannot overshoot the cap.
    pub fn serve_listener(&self, listener: UnixListener) -> Result<()> {
        let active = Arc::new(AtomicUsize::new(0));

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                    continue;
                }
            };

            let open = active.load(Ordering::Acquire);
            if open >= self.max_connections {
                refuse_busy(stream, open, self.max_connections);
                continue;
            }

            if let Err(e) = stream.set_read_timeout(Some(self.idle_timeout)) {
                tracing::warn!(error = %e, "failed to set read timeout");
                continue;
            }

            active.fetch_add(1, Ordering::AcqRel);
            let slot = ConnectionSlot(Arc::clone(&active));
            let service = Arc::clone(&self.service);
            let spawned = thread::Builder::new()
                .name("namematch-conn".to_string())
                .spawn(move || {
                    let _slot = slot;
                    if let Err(e) = handle_connection(&service, stream) {
                        tracing::warn!(error = %e, "connection error");
                    }
                });
            if let Err(e) = spawned {
                tracing::warn!(error = %e, "failed to spawn connection thread");
            }
        }
        Ok(())
    }
}

/// Answer a connection past the cap with one error line and close it.
fn refuse_busy(mut stream: UnixStream, open: usize, max: usize) {
    tracing::warn!(open, max, "connection refused: server busy");
    let response = Response::error(
        String::new(),
        codes::ERROR,
        format!("server busy: {} connections open", open),
        0.0,
    )
    .with_details(serde_json::json!({"open_connections": open, "max_connections": max}));
    if let Ok(line) = response.to_ndjson_line() {
        let _ = stream.write_all(line.as_bytes());
    }
}

/// Answer one request line.
pub fn handle_line(service: &MatchService, line: &str) -> Response {
    let start = Instant::now();
    let elapsed_ms = |start: Instant| start.elapsed().as_secs_f64() * 1000.0;

    let request = match Request::from_ndjson_line(line) {
        Ok(request) => request,
        Err(e) => {
            return Response::error(
                String::new(),
                codes::INVALID_ARGUMENT,
                format!("{:#}", e),
                elapsed_ms(start),
            )
        }
    };

    let method = request.method.clone();
    match service.dispatch(&request.method, request.params) {
        Ok(result) => Response::success(request.id, result, elapsed_ms(start)),
        Err(e) => {
            tracing::debug!(method = %method, code = e.code(), error = %e, "request failed");
            Response::error(request.id, e.code(), e.to_string(), elapsed_ms(start))
        }
    }
}

fn handle_connection(service: &MatchService, stream: UnixStream) -> Result<()> {
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                tracing::debug!("idle connection closed");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(service, line.trim_end()),
            Err(e) => Response::error(
                String::new(),
                codes::INVALID_ARGUMENT,
                format!("request line is not valid UTF-8: {}", e),
                0.0,
            ),
        };
        writer.write_all(response.to_ndjson_line()?.as_bytes())?;
        writer.flush()?;
    }

    Ok(())
}
