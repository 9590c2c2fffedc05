//! Error handling for keepup.
use std::{io, path::PathBuf, process::ExitStatus};

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// Coarse classification of [`DaemonError`], used by callers to decide how a
/// failure is contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid daemon definition. Only raised at construction time.
    Configuration,
    /// Run directory missing or not creatable, or PID file unreadable.
    Resource,
    /// Package or deferred value could not be resolved.
    Resolution,
    /// Executable missing, not executable, or the launcher reported failure.
    Launch,
    /// Signal delivery failed.
    Signal,
}

/// Defines all possible errors raised by the daemon lifecycle controller.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A daemon was built without a name.
    #[error("daemon name not specified")]
    MissingName,

    /// The name (with instance) cannot be used as a directory component.
    #[error("daemon name '{0}' is not safe to use as a file name")]
    UnsafeName(String),

    /// The context configuration file could not be read.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[source] io::Error),

    /// The context configuration file is not valid YAML.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// The configuration references an unset environment variable.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The run directory does not exist and may not be created.
    #[error("run_dir [{}] not found", .0.display())]
    RunDirMissing(PathBuf),

    /// Creating the run directory failed.
    #[error("Failed to create run_dir [{}]: {source}", .path.display())]
    RunDirCreate {
        /// Directory that could not be created.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The PID file exists but could not be read.
    #[error("Failed to read PID file [{}]: {source}", .path.display())]
    PidFileRead {
        /// PID file that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// A path, argument or package could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolveError),

    /// The resolved executable is missing or lacks the execute bit.
    #[error("Exe path: {} not found/executable", .0.display())]
    NotExecutable(PathBuf),

    /// The launcher could not be executed at all.
    #[error("Failed to launch '{}': {source}", .path.display())]
    SpawnError {
        /// Executable that was launched.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: io::Error,
    },

    /// The launcher ran but reported failure.
    #[error("Start failed with {0}")]
    SpawnFailed(ExitStatus),

    /// Signal delivery failed.
    #[error(transparent)]
    Signal(#[from] SignalError),
}

impl DaemonError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingName
            | Self::UnsafeName(_)
            | Self::ConfigReadError(_)
            | Self::ConfigParseError(_)
            | Self::MissingEnvVar(_) => ErrorKind::Configuration,
            Self::RunDirMissing(_) | Self::RunDirCreate { .. } | Self::PidFileRead { .. } => {
                ErrorKind::Resource
            }
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::NotExecutable(_) | Self::SpawnError { .. } | Self::SpawnFailed(_) => {
                ErrorKind::Launch
            }
            Self::Signal(_) => ErrorKind::Signal,
        }
    }
}

/// Error type for resolving deferred configuration values.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No installed package satisfies the requirement.
    #[error("Missing package {name} ({requirement})")]
    PackageNotFound {
        /// Package that was searched for.
        name: String,
        /// Version requirement that could not be satisfied.
        requirement: String,
    },

    /// The version requirement string is malformed.
    #[error("Invalid version requirement '{0}'")]
    InvalidRequirement(String),

    /// A caller-supplied resolver failed.
    #[error("Failed to resolve {attribute}: {message}")]
    Resolver {
        /// Attribute being resolved.
        attribute: &'static str,
        /// Resolver supplied failure description.
        message: String,
    },

    /// Filesystem error while resolving.
    #[error("Failed to resolve path: {0}")]
    Io(#[from] io::Error),
}

/// Error type for key ledger persistence.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Error reading or writing the ledger file.
    #[error("Failed to access key ledger: {0}")]
    Io(#[from] io::Error),

    /// Error parsing the ledger file.
    #[error("Failed to parse key ledger: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Portable classification of signal delivery and process query failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// The target process does not exist.
    #[error("No such process: {0}")]
    NoSuchProcess(i32),

    /// The caller may not signal the target process.
    #[error("Operation not permitted on PID {0}")]
    PermissionDenied(i32),

    /// Any other OS failure.
    #[error("Signal to PID {pid} failed: {errno}")]
    Os {
        /// Target process.
        pid: i32,
        /// Raw OS error.
        errno: nix::errno::Errno,
    },
}

impl SignalError {
    /// Maps an OS error for `pid` onto the portable taxonomy.
    pub fn from_errno(pid: i32, errno: nix::errno::Errno) -> Self {
        match errno {
            nix::errno::Errno::ESRCH => Self::NoSuchProcess(pid),
            nix::errno::Errno::EPERM => Self::PermissionDenied(pid),
            errno => Self::Os { pid, errno },
        }
    }
}
