// ABOUTME: Background mode: re-executes adloop with the hidden `run` subcommand, detached, and waits for its socket.
// ABOUTME: Also the last-resort `kill`, which sends SIGTERM to the pid in the pid file.

use std::ffi::OsString;
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::control::{ControlError, RuntimeFiles};

const STARTUP_WAIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(100);

/// Spawn a detached child running `args` and wait up to two seconds for its
/// control socket. Returns the child's pid.
pub async fn spawn_detached(args: &[OsString], files: &RuntimeFiles) -> Result<u32, ControlError> {
    files.ensure_free()?;
    // The child binds a fresh socket; an old one would look like success.
    if files.socket.exists() {
        std::fs::remove_file(&files.socket)?;
    }

    let exe = std::env::current_exe()?;
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()?;
    let pid = child.id();
    tracing::info!(pid, "spawned background scheduler");

    let mut waited = Duration::ZERO;
    while waited < STARTUP_WAIT {
        if files.socket.exists() {
            return Ok(pid);
        }
        if let Some(status) = child.try_wait()? {
            return Err(ControlError::Spawn(format!(
                "process exited with {} before it was ready; see the log for details",
                status
            )));
        }
        tokio::time::sleep(POLL).await;
        waited += POLL;
    }
    Err(ControlError::Spawn(format!(
        "pid {} did not open {} within {:?}",
        pid,
        files.socket.display(),
        STARTUP_WAIT
    )))
}

/// Send SIGTERM to the scheduler named by `files`.
pub fn kill(files: &RuntimeFiles) -> Result<u32, ControlError> {
    let pid = files
        .running_pid()
        .ok_or_else(|| ControlError::NotRunning(files.name.clone()))?;
    let raw = libc::pid_t::try_from(pid).map_err(|_| ControlError::Signal {
        pid,
        source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
    })?;
    // SAFETY: plain kill(2) on a pid we read from our own pid file.
    if unsafe { libc::kill(raw, libc::SIGTERM) } != 0 {
        return Err(ControlError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        });
    }
    tracing::info!(pid, "sent SIGTERM");
    Ok(pid)
}
