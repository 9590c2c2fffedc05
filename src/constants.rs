//! Constants and default values for the daemon lifecycle controller.
//!
//! Centralizes timing quanta, default periods and naming conventions so the
//! controller and the emitted tasks agree on them.

use std::time::Duration;

// ============================================================================
// Scheduling
// ============================================================================

/// Period of the primary re-check task emitted for each daemon.
pub const CHECK_PERIOD: Duration = Duration::from_secs(5);

/// Suffix appended to `full_name` to identify log rotation tasks.
pub const ROTATE_TASK_SUFFIX: &str = ".rotate";

// ============================================================================
// Stop protocol timing
// ============================================================================

/// Initial sleep between liveness checks while waiting for a process to exit.
/// Also the amount the sleep grows by on every iteration.
pub const WAIT_QUANTUM: Duration = Duration::from_micros(62_500);

/// Upper bound for a single sleep between liveness checks.
pub const WAIT_QUANTUM_CAP: Duration = Duration::from_millis(500);

/// Default window between the termination signal and the forceful kill.
pub const DEFAULT_STOP_DELAY: Duration = Duration::from_secs(30);

// ============================================================================
// File system
// ============================================================================

/// Mode used when auto-creating a run directory (rwxr-x---).
pub const RUN_DIR_MODE: u32 = 0o750;

/// Extension of the PID file written by a daemon inside its run directory.
pub const PID_FILE_EXTENSION: &str = "pid";

/// Extension of the default log file inside the run directory.
pub const LOG_FILE_EXTENSION: &str = "log";

/// Directory inside an installed package holding init scripts.
pub const PACKAGE_INIT_DIR: &str = "init";

/// Version requirement matching any installed version.
pub const ANY_VERSION: &str = ">= 0";

/// Base directory used in system runtime mode.
pub const SYSTEM_BASE_DIR: &str = "/opt/var";

/// Base directory below `$HOME` used in user runtime mode.
pub const USER_BASE_DIR: &str = ".local/share/keepup";

/// Root below which unresolvable executables get unique placeholder paths.
pub const UNRESOLVED_EXE_ROOT: &str = "/tmp/package-not-found";
