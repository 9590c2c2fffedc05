//! PID files and the OS process boundary.
//!
//! Liveness is checked by asking the OS for the process group of a PID. The
//! check is inherently racy: a process may exit, or its PID be reused, between
//! the probe and any signal sent afterwards. The periodic re-check model
//! tolerates this; nothing here tries to close the window.
use std::{
    fs,
    io::{self, ErrorKind},
    path::Path,
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::{self, Pid},
};
use tracing::{debug, warn};

use crate::error::SignalError;

/// Reads a PID from `path`.
///
/// The file holds a decimal integer, optionally padded with whitespace. A
/// missing or malformed file, or a value `<= 0`, yields `Ok(None)`. A file
/// that exists but cannot be read is an error: the process it names may
/// still be running.
pub fn read_pid_file(path: &Path) -> io::Result<Option<i32>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        Ok(_) => Ok(None),
        Err(err) => {
            debug!("Ignoring malformed PID file {}: {err}", path.display());
            Ok(None)
        }
    }
}

/// OS operations the lifecycle controller needs on a running process.
///
/// Implementations report failures through the portable [`SignalError`]
/// taxonomy so callers never depend on a platform's raw error set.
pub trait ProcessControl: Send + Sync {
    /// Whether `pid` refers to a running process. Never fails.
    fn is_alive(&self, pid: i32) -> bool;

    /// Requests graceful shutdown.
    fn terminate(&self, pid: i32) -> Result<(), SignalError>;

    /// Forcefully kills the process.
    fn kill(&self, pid: i32) -> Result<(), SignalError>;
}

/// [`ProcessControl`] backed by POSIX process groups and signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

impl SystemProcess {
    fn send(pid: i32, sig: Signal) -> Result<(), SignalError> {
        signal::kill(Pid::from_raw(pid), sig).map_err(|errno| SignalError::from_errno(pid, errno))
    }
}

impl ProcessControl for SystemProcess {
    fn is_alive(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        match unistd::getpgid(Some(Pid::from_raw(pid))) {
            Ok(_) => true,
            Err(Errno::ESRCH) => false,
            // The process exists but belongs to a session we may not inspect.
            Err(Errno::EPERM) => true,
            Err(err) => {
                warn!("Failed to query process group of PID {pid}: {err}");
                false
            }
        }
    }

    fn terminate(&self, pid: i32) -> Result<(), SignalError> {
        Self::send(pid, Signal::SIGTERM)
    }

    fn kill(&self, pid: i32) -> Result<(), SignalError> {
        Self::send(pid, Signal::SIGKILL)
    }
}
