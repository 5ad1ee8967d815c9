// ABOUTME: Control plane for a running scheduler: JSON-lines requests over a Unix socket, plus pid and status files.
// ABOUTME: The server side answers from a SchedulerControl; the client side is used by the CLI subcommands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use adloop_store::CachePaths;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::scheduler::{SchedulerControl, SchedulerStatus};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("scheduler '{0}' is not running")]
    NotRunning(String),

    #[error("scheduler '{name}' is already running with pid {pid}")]
    AlreadyRunning { name: String, pid: u32 },

    #[error("scheduler rejected the request: {0}")]
    Rejected(String),

    #[error("no reply from the scheduler within {0:?}")]
    Timeout(Duration),

    #[error("daemon did not come up: {0}")]
    Spawn(String),

    #[error("failed to signal pid {pid}: {source}")]
    Signal { pid: u32, source: std::io::Error },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    Status,
    Pause,
    Resume,
    Stop,
    Interval { seconds: u64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    fn ok(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    pub fn into_result(self) -> Result<Option<serde_json::Value>, ControlError> {
        if self.ok {
            Ok(self.data)
        } else {
            Err(ControlError::Rejected(self.error.unwrap_or_else(|| "unknown error".to_string())))
        }
    }
}

/// Apply one request to the scheduler.
pub fn handle(control: &SchedulerControl, request: ControlRequest) -> ControlResponse {
    let message = |m: &str| serde_json::json!({ "message": m });
    match request {
        ControlRequest::Status => match serde_json::to_value(control.status()) {
            Ok(status) => ControlResponse::ok(status),
            Err(e) => ControlResponse::err(e.to_string()),
        },
        ControlRequest::Pause => {
            if control.pause() {
                ControlResponse::ok(message("scheduler paused"))
            } else {
                ControlResponse::ok(message("scheduler was not running or already paused"))
            }
        }
        ControlRequest::Resume => {
            if control.resume() {
                ControlResponse::ok(message("scheduler resumed"))
            } else {
                ControlResponse::ok(message("scheduler was not paused"))
            }
        }
        ControlRequest::Stop => {
            control.stop();
            ControlResponse::ok(message("scheduler stopping"))
        }
        ControlRequest::Interval { seconds } => {
            if control.set_interval(seconds) {
                ControlResponse::ok(serde_json::json!({ "interval_seconds": seconds }))
            } else {
                ControlResponse::err("interval must be at least 1 second")
            }
        }
    }
}

/// Bind the control socket, replacing a leftover socket file.
pub fn bind(path: &Path) -> Result<UnixListener, ControlError> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    tracing::info!(socket = %path.display(), "control socket listening");
    Ok(listener)
}

/// Accept connections until the scheduler stops. Each connection may send
/// any number of newline-terminated requests.
pub async fn serve(listener: UnixListener, control: SchedulerControl) {
    while control.is_running() {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = tokio::time::sleep(Duration::from_secs(1)) => continue,
        };
        match accepted {
            Ok((stream, _)) => {
                let control = control.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(stream, control).await {
                        tracing::debug!(error = %e, "control connection closed with error");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "control socket accept failed"),
        }
    }
}

async fn serve_connection(stream: UnixStream, control: SchedulerControl) -> Result<(), ControlError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(&line) {
            Ok(request) => {
                tracing::debug!(?request, "control request");
                handle(&control, request)
            }
            Err(e) => ControlResponse::err(format!("invalid request: {}", e)),
        };
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
    }
    Ok(())
}

/// Send one request and read one reply.
pub async fn send(socket: &Path, request: &ControlRequest) -> Result<ControlResponse, ControlError> {
    let exchange = async {
        let mut stream = UnixStream::connect(socket).await?;
        let mut out = serde_json::to_vec(request)?;
        out.push(b'\n');
        stream.write_all(&out).await?;

        let mut line = String::new();
        BufReader::new(&mut stream).read_line(&mut line).await?;
        Ok::<_, ControlError>(serde_json::from_str(&line)?)
    };
    tokio::time::timeout(CLIENT_TIMEOUT, exchange)
        .await
        .map_err(|_| ControlError::Timeout(CLIENT_TIMEOUT))?
}

/// The pid, status, and socket files of one named scheduler.
#[derive(Debug, Clone)]
pub struct RuntimeFiles {
    pub name: String,
    pub pid: PathBuf,
    pub status: PathBuf,
    pub socket: PathBuf,
}

impl RuntimeFiles {
    pub fn new(paths: &CachePaths, name: &str) -> Self {
        Self {
            name: name.to_string(),
            pid: paths.pid_path(name),
            status: paths.status_path(name),
            socket: paths.socket_path(name),
        }
    }

    pub fn write_pid(&self) -> Result<(), ControlError> {
        std::fs::write(&self.pid, std::process::id().to_string())?;
        Ok(())
    }

    /// Pid of a live scheduler with this name. A pid file naming a dead
    /// process is removed along with the socket it left behind.
    pub fn running_pid(&self) -> Option<u32> {
        let pid = std::fs::read_to_string(&self.pid).ok()?.trim().parse::<u32>().ok();
        match pid {
            Some(pid) if process_alive(pid) => Some(pid),
            _ => {
                tracing::info!(pid_file = %self.pid.display(), "removing stale pid file");
                let _ = std::fs::remove_file(&self.pid);
                let _ = std::fs::remove_file(&self.socket);
                None
            }
        }
    }

    /// Fail if another live process owns this name.
    pub fn ensure_free(&self) -> Result<(), ControlError> {
        match self.running_pid() {
            Some(pid) if pid != std::process::id() => Err(ControlError::AlreadyRunning {
                name: self.name.clone(),
                pid,
            }),
            _ => Ok(()),
        }
    }

    /// Last status the scheduler wrote.
    pub fn read_status(&self) -> Result<SchedulerStatus, ControlError> {
        let bytes = std::fs::read(&self.status).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ControlError::NotRunning(self.name.clone()),
            _ => ControlError::Io(e),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request to the scheduler's socket.
    pub async fn request(&self, request: &ControlRequest) -> Result<ControlResponse, ControlError> {
        if !self.socket.exists() {
            return Err(ControlError::NotRunning(self.name.clone()));
        }
        send(&self.socket, request).await
    }

    /// Remove the pid file and socket on shutdown. The status file stays so
    /// `status` can still report the final state.
    pub fn cleanup(&self) {
        for path in [&self.pid, &self.socket] {
            if let Err(e) = std::fs::remove_file(path)
                && e.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %path.display(), error = %e, "cleanup failed");
            }
        }
    }
}

/// Whether a process with this pid exists.
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}
