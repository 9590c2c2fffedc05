//! Keepup supervises long-running external processes through their PID files.
//! It starts daemons when absent, re-checks liveness on a schedule, stops them
//! with a graceful-then-forceful protocol and fingerprints their launch
//! configuration so a reconciler can tell when a restart is due.

/// Supervisor-wide defaults and their YAML loader.
pub mod config;

/// Constants and default timings.
pub mod constants;

/// Daemon records and the lifecycle controller.
pub mod daemon;

/// Error handling.
pub mod error;

/// Launch configuration fingerprints.
pub mod fingerprint;

/// Tracing subscriber setup.
pub mod logging;

/// Installed package resolution.
pub mod package;

/// PID files and the OS process boundary.
pub mod probe;

/// Process-wide default context.
pub mod runtime;

/// Scheduler and log rotator contracts.
pub mod task;

/// Lazily evaluated configuration values.
pub mod value;

#[doc(hidden)]
pub mod test_utils;

pub use config::Context;
pub use daemon::{Daemon, DaemonBuilder, DaemonHandle, DaemonState};
pub use error::{DaemonError, ErrorKind};
pub use fingerprint::ExecKey;
pub use task::{Directive, LogRotator, Scheduler, Task, TaskMode};
