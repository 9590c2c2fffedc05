//! Contracts with the external scheduler and log rotators.
use std::{fmt, path::Path, time::Duration};

use strum_macros::{AsRefStr, Display};

/// Outcome of a lifecycle operation, telling the scheduler whether the
/// daemon's work should keep being scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Directive {
    /// Nothing to do or recovered; keep scheduling.
    Continue,
    /// Unrecoverable; do not (re)schedule this daemon's tasks.
    Stop,
}

/// How a task may be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TaskMode {
    /// Runs on the scheduler's coordinating thread.
    Sync,
    /// May run on any worker thread.
    Async,
}

type TaskBody = Box<dyn FnMut() -> Directive + Send>;

/// A named periodic unit of work.
pub struct Task {
    name: String,
    period: Duration,
    mode: TaskMode,
    body: TaskBody,
}

impl Task {
    /// Creates a task.
    pub fn new<F>(name: impl Into<String>, period: Duration, mode: TaskMode, body: F) -> Self
    where
        F: FnMut() -> Directive + Send + 'static,
    {
        Self {
            name: name.into(),
            period,
            mode,
            body: Box::new(body),
        }
    }

    /// Unique task identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time between runs.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Dispatch mode.
    pub fn mode(&self) -> TaskMode {
        self.mode
    }

    /// Runs the body once.
    pub fn run(&mut self) -> Directive {
        (self.body)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("period", &self.period)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Receives tasks for periodic execution.
pub trait Scheduler {
    /// Registers `task`.
    fn add(&mut self, task: Task);
}

impl Scheduler for Vec<Task> {
    fn add(&mut self, task: Task) {
        self.push(task);
    }
}

/// A log rotation policy attached to one log file.
pub trait LogRotator: Send + Sync {
    /// Log file this policy rotates.
    fn log_path(&self) -> &Path;

    /// How often the policy wants to be checked.
    fn check_period(&self) -> Duration;

    /// Rotates the log if due, calling `on_rotate` with the rotated path when
    /// a rotation actually happens. `pid` is the daemon's current PID, if any.
    fn check_rotate(&self, pid: Option<i32>, on_rotate: &mut dyn FnMut(&Path));
}
