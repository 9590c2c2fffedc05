//! Lifecycle controller for a single supervised daemon.
//!
//! A [`Daemon`] is the record for one external process: its launch
//! configuration and the last observed [`DaemonState`]. An external scheduler
//! drives it through the [`Task`]s emitted by [`DaemonHandle::tasks`].
//!
//! The controller never owns the process. Liveness is derived from the PID
//! file the daemon writes itself, so every check is a point-in-time
//! observation and `state` is only as fresh as the last lifecycle call.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs,
    os::unix::fs::DirBuilderExt,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::Duration,
};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, error, info, warn};

use crate::{
    config::Context,
    constants::{
        ANY_VERSION, CHECK_PERIOD, LOG_FILE_EXTENSION, PID_FILE_EXTENSION, ROTATE_TASK_SUFFIX,
        RUN_DIR_MODE, UNRESOLVED_EXE_ROOT, WAIT_QUANTUM, WAIT_QUANTUM_CAP,
    },
    error::{DaemonError, ResolveError, SignalError},
    fingerprint::{ExecKey, absolute},
    package::{PackageLocator, PackageSpec, init_script_path},
    probe::{ProcessControl, SystemProcess, read_pid_file},
    runtime,
    task::{Directive, LogRotator, Scheduler, Task, TaskMode},
    value::{Deferred, resolve_or},
};

/// Last observed status of a daemon.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DaemonState {
    /// Never started or checked.
    Begin,
    /// Last check found the process alive, or a start succeeded.
    Up,
    /// Misconfigured, missing executable or launch failure.
    Failed,
    /// An explicit stop completed.
    Stopped,
}

/// Naming and file locations of a daemon.
///
/// Cloned into rotation tasks so they can read the PID file without taking
/// the daemon's lock.
#[derive(Debug, Clone)]
struct Layout {
    name: String,
    instance: Option<Deferred<String>>,
    base_dir: Option<Deferred<PathBuf>>,
    run_dir: Option<Deferred<PathBuf>>,
    pid_file: Option<Deferred<PathBuf>>,
    init_name: Option<Deferred<String>>,
    default_base_dir: PathBuf,
}

impl Layout {
    fn instance(&self) -> Result<Option<String>, ResolveError> {
        match &self.instance {
            Some(instance) => {
                let instance = instance.resolve()?;
                let trimmed = instance.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            None => Ok(None),
        }
    }

    fn full_name(&self) -> Result<String, ResolveError> {
        Ok(match self.instance()? {
            Some(instance) => format!("{}-{}", self.name, instance),
            None => self.name.clone(),
        })
    }

    fn label(&self) -> String {
        self.full_name().unwrap_or_else(|_| self.name.clone())
    }

    fn base_dir(&self) -> Result<PathBuf, ResolveError> {
        resolve_or(&self.base_dir, || Ok(self.default_base_dir.clone()))
    }

    fn run_dir(&self) -> Result<PathBuf, ResolveError> {
        resolve_or(&self.run_dir, || Ok(self.base_dir()?.join(self.full_name()?)))
    }

    fn init_name(&self) -> Result<String, ResolveError> {
        resolve_or(&self.init_name, || Ok(self.name.clone()))
    }

    fn in_dir(&self, file_name: &str) -> Result<PathBuf, ResolveError> {
        Ok(self.run_dir()?.join(file_name))
    }

    fn pid_file(&self) -> Result<PathBuf, ResolveError> {
        resolve_or(&self.pid_file, || {
            self.in_dir(&format!("{}.{PID_FILE_EXTENSION}", self.init_name()?))
        })
    }

    fn read_pid(&self) -> Result<Option<i32>, DaemonError> {
        let path = self.pid_file()?;
        read_pid_file(&path).map_err(|source| DaemonError::PidFileRead { path, source })
    }

    fn pid(&self) -> Option<i32> {
        self.read_pid().unwrap_or_else(|err| {
            warn!("PID of '{}': {err}", self.label());
            None
        })
    }
}

/// Configuration and observed state for one supervised process.
pub struct Daemon {
    layout: Layout,
    exe_path: Option<Deferred<PathBuf>>,
    args: Option<Deferred<Vec<String>>>,
    package_name: Option<Deferred<String>>,
    package_version: Option<Deferred<String>>,
    make_run_dir: bool,
    stop_on_exit: bool,
    stop_delay: Duration,
    state: DaemonState,
    rotators: BTreeMap<PathBuf, Arc<dyn LogRotator>>,
    locator: Arc<dyn PackageLocator>,
    process: Arc<dyn ProcessControl>,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("layout", &self.layout)
            .field("exe_path", &self.exe_path)
            .field("args", &self.args)
            .field("make_run_dir", &self.make_run_dir)
            .field("stop_on_exit", &self.stop_on_exit)
            .field("stop_delay", &self.stop_delay)
            .field("state", &self.state)
            .field("rotators", &self.rotators.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Builds a [`Daemon`], filling unset attributes from a [`Context`].
pub struct DaemonBuilder {
    context: Context,
    name: Option<String>,
    instance: Option<Deferred<String>>,
    exe_path: Option<Deferred<PathBuf>>,
    args: Option<Deferred<Vec<String>>>,
    base_dir: Option<Deferred<PathBuf>>,
    run_dir: Option<Deferred<PathBuf>>,
    pid_file: Option<Deferred<PathBuf>>,
    package_name: Option<Deferred<String>>,
    package_version: Option<Deferred<String>>,
    init_name: Option<Deferred<String>>,
    make_run_dir: Option<bool>,
    stop_on_exit: Option<bool>,
    stop_delay: Option<Duration>,
    locator: Option<Arc<dyn PackageLocator>>,
    process: Option<Arc<dyn ProcessControl>>,
}

impl DaemonBuilder {
    /// Starts a definition inheriting defaults from `context`.
    pub fn new(context: Context) -> Self {
        Self {
            context,
            name: None,
            instance: None,
            exe_path: None,
            args: None,
            base_dir: None,
            run_dir: None,
            pid_file: None,
            package_name: None,
            package_version: None,
            init_name: None,
            make_run_dir: None,
            stop_on_exit: None,
            stop_delay: None,
            locator: None,
            process: None,
        }
    }

    /// Name of the daemon. Required.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Disambiguator appended to the name, e.g. a port number.
    pub fn instance(mut self, instance: impl Into<Deferred<String>>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    /// Executable to launch (default: the package's init script).
    pub fn exe_path(mut self, exe_path: impl Into<Deferred<PathBuf>>) -> Self {
        self.exe_path = Some(exe_path.into());
        self
    }

    /// Arguments passed on start (default: none).
    pub fn args(mut self, args: impl Into<Deferred<Vec<String>>>) -> Self {
        self.args = Some(args.into());
        self
    }

    /// Directory under which the run directory is derived (default: context).
    pub fn base_dir(mut self, base_dir: impl Into<Deferred<PathBuf>>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Working directory of the daemon (default: `base_dir/full_name`).
    pub fn run_dir(mut self, run_dir: impl Into<Deferred<PathBuf>>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }

    /// PID file written by the daemon (default: `run_dir/<init_name>.pid`).
    pub fn pid_file(mut self, pid_file: impl Into<Deferred<PathBuf>>) -> Self {
        self.pid_file = Some(pid_file.into());
        self
    }

    /// Package providing the default executable (default: name).
    pub fn package_name(mut self, package_name: impl Into<Deferred<String>>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    /// Version requirement for the package (default: `>= 0`).
    pub fn package_version(mut self, package_version: impl Into<Deferred<String>>) -> Self {
        self.package_version = Some(package_version.into());
        self
    }

    /// Init script name inside the package (default: name).
    pub fn init_name(mut self, init_name: impl Into<Deferred<String>>) -> Self {
        self.init_name = Some(init_name.into());
        self
    }

    pub fn make_run_dir(mut self, make_run_dir: bool) -> Self {
        self.make_run_dir = Some(make_run_dir);
        self
    }

    pub fn stop_on_exit(mut self, stop_on_exit: bool) -> Self {
        self.stop_on_exit = Some(stop_on_exit);
        self
    }

    pub fn stop_delay(mut self, stop_delay: Duration) -> Self {
        self.stop_delay = Some(stop_delay);
        self
    }

    /// Overrides the package locator derived from the context.
    pub fn package_locator(mut self, locator: Arc<dyn PackageLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Overrides the OS process boundary.
    pub fn process_control(mut self, process: Arc<dyn ProcessControl>) -> Self {
        self.process = Some(process);
        self
    }

    /// Validates the definition.
    ///
    /// Fails when the name is missing or empty, or when the full name cannot
    /// be used as a directory component.
    pub fn build(self) -> Result<Daemon, DaemonError> {
        let name = match self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err(DaemonError::MissingName),
        };

        let locator: Arc<dyn PackageLocator> = match self.locator {
            Some(locator) => locator,
            None => self.context.package_locator(),
        };

        let daemon = Daemon {
            layout: Layout {
                name,
                instance: self.instance,
                base_dir: self.base_dir,
                run_dir: self.run_dir,
                pid_file: self.pid_file,
                init_name: self.init_name,
                default_base_dir: self.context.base_dir,
            },
            exe_path: self.exe_path,
            args: self.args,
            package_name: self.package_name,
            package_version: self.package_version,
            make_run_dir: self.make_run_dir.unwrap_or(self.context.make_run_dir),
            stop_on_exit: self.stop_on_exit.unwrap_or(self.context.stop_on_exit),
            stop_delay: self.stop_delay.unwrap_or(self.context.stop_delay),
            state: DaemonState::Begin,
            rotators: BTreeMap::new(),
            locator,
            process: self
                .process
                .unwrap_or_else(|| Arc::new(SystemProcess) as Arc<dyn ProcessControl>),
        };

        let full_name = daemon.full_name()?;
        if !is_file_name_safe(&full_name) {
            return Err(DaemonError::UnsafeName(full_name));
        }

        Ok(daemon)
    }
}

fn is_file_name_safe(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\0'])
}

fn is_executable(path: &Path) -> bool {
    path.is_file() && nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok()
}

/// A unique path that never equals another placeholder or a real executable.
fn unresolved_exe_path() -> PathBuf {
    PathBuf::from(UNRESOLVED_EXE_ROOT)
        .join(chrono::Utc::now().timestamp_micros().to_string())
        .join(uuid::Uuid::new_v4().simple().to_string())
}

impl Daemon {
    /// Starts a definition using the process-wide default context.
    pub fn builder() -> DaemonBuilder {
        DaemonBuilder::new(runtime::context())
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    /// Instance identifier, if any. Blank values count as absent.
    pub fn instance(&self) -> Result<Option<String>, ResolveError> {
        self.layout.instance()
    }

    /// `name`, followed by `-instance` when an instance is set.
    pub fn full_name(&self) -> Result<String, ResolveError> {
        self.layout.full_name()
    }

    /// Name used in log messages; falls back to `name` if the instance fails.
    fn label(&self) -> String {
        self.layout.label()
    }

    pub fn base_dir(&self) -> Result<PathBuf, ResolveError> {
        self.layout.base_dir()
    }

    pub fn run_dir(&self) -> Result<PathBuf, ResolveError> {
        self.layout.run_dir()
    }

    pub fn init_name(&self) -> Result<String, ResolveError> {
        self.layout.init_name()
    }

    pub fn package_name(&self) -> Result<String, ResolveError> {
        resolve_or(&self.package_name, || Ok(self.layout.name.clone()))
    }

    pub fn package_version(&self) -> Result<String, ResolveError> {
        resolve_or(&self.package_version, || Ok(ANY_VERSION.to_string()))
    }

    /// Path of `file_name` inside the run directory.
    pub fn in_dir(&self, file_name: &str) -> Result<PathBuf, ResolveError> {
        self.layout.in_dir(file_name)
    }

    pub fn pid_file(&self) -> Result<PathBuf, ResolveError> {
        self.layout.pid_file()
    }

    /// Log path used by [`Daemon::log_rotate`].
    pub fn default_log(&self) -> Result<PathBuf, ResolveError> {
        self.in_dir(&format!("{}.{LOG_FILE_EXTENSION}", self.init_name()?))
    }

    /// Resolved arguments, trimmed, with blanks dropped.
    pub fn args(&self) -> Result<Vec<String>, ResolveError> {
        let args = resolve_or(&self.args, || Ok(Vec::new()))?;
        Ok(args
            .iter()
            .map(|arg| arg.trim())
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Installed package providing the default executable.
    pub fn package(&self) -> Result<PackageSpec, ResolveError> {
        self.locator
            .locate(&self.package_name()?, &self.package_version()?)
    }

    /// Executable to launch.
    pub fn exe_path(&self) -> Result<PathBuf, ResolveError> {
        self.resolve_exe().map(|(path, _)| path)
    }

    /// Executable path plus the package version it came from, if any.
    fn resolve_exe(&self) -> Result<(PathBuf, Option<String>), ResolveError> {
        match &self.exe_path {
            Some(exe_path) => {
                let path = exe_path.resolve()?;
                if path.as_os_str().is_empty() {
                    return Err(ResolveError::Resolver {
                        attribute: "exe_path",
                        message: "empty path".to_string(),
                    });
                }
                Ok((path, None))
            }
            None => {
                let package = self.package()?;
                let path = init_script_path(&package, &self.init_name()?);
                Ok((path, Some(package.version)))
            }
        }
    }

    pub fn make_run_dir(&self) -> bool {
        self.make_run_dir
    }

    pub fn stop_on_exit(&self) -> bool {
        self.stop_on_exit
    }

    pub fn stop_delay(&self) -> Duration {
        self.stop_delay
    }

    pub fn set_exe_path(&mut self, exe_path: impl Into<Deferred<PathBuf>>) {
        self.exe_path = Some(exe_path.into());
    }

    pub fn set_args(&mut self, args: impl Into<Deferred<Vec<String>>>) {
        self.args = Some(args.into());
    }

    pub fn set_make_run_dir(&mut self, make_run_dir: bool) {
        self.make_run_dir = make_run_dir;
    }

    pub fn set_stop_on_exit(&mut self, stop_on_exit: bool) {
        self.stop_on_exit = stop_on_exit;
    }

    pub fn set_stop_delay(&mut self, stop_delay: Duration) {
        self.stop_delay = stop_delay;
    }

    /// Last observed state. Only updated by lifecycle calls.
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Attaches a rotation policy built for [`Daemon::default_log`].
    pub fn log_rotate<R, F>(&mut self, factory: F) -> Result<(), ResolveError>
    where
        R: LogRotator + 'static,
        F: FnOnce(PathBuf) -> R,
    {
        let log = self.default_log()?;
        self.add_rotator(Arc::new(factory(log)));
        Ok(())
    }

    /// Attaches a rotation policy, replacing any previous one for the same log.
    pub fn add_rotator(&mut self, rotator: Arc<dyn LogRotator>) {
        let log = rotator.log_path().to_path_buf();
        if self.rotators.insert(log.clone(), rotator).is_some() {
            debug!("Replaced log rotator for {} on '{}'", log.display(), self.label());
        }
    }

    /// Attached rotation policies, keyed by log path.
    pub fn rotators(&self) -> impl Iterator<Item = (&Path, &Arc<dyn LogRotator>)> {
        self.rotators.iter().map(|(log, rotator)| (log.as_path(), rotator))
    }

    /// PID recorded in the PID file, if any. An unresolvable or unreadable
    /// PID file is logged and reported as no PID.
    pub fn pid(&self) -> Option<i32> {
        self.layout.pid()
    }

    /// Whether the process named by the PID file is running.
    pub fn is_alive(&self) -> bool {
        self.pid().is_some_and(|pid| self.process.is_alive(pid))
    }

    /// Validates the run directory and performs the first check.
    ///
    /// Every failure is contained: it is logged, the daemon is marked
    /// [`DaemonState::Failed`] and [`Directive::Stop`] is returned.
    pub fn do_first(&mut self) -> Directive {
        if let Err(err) = self.ensure_run_dir() {
            error!("Do first for '{}': {err}", self.label());
            self.state = DaemonState::Failed;
            return Directive::Stop;
        }

        match self.start_check() {
            Directive::Stop => {
                self.state = DaemonState::Failed;
                Directive::Stop
            }
            directive => directive,
        }
    }

    fn ensure_run_dir(&self) -> Result<(), DaemonError> {
        let run_dir = self.run_dir()?;
        if run_dir.is_dir() {
            return Ok(());
        }
        if !self.make_run_dir {
            return Err(DaemonError::RunDirMissing(run_dir));
        }

        info!("Creating run_dir [{}] for '{}'", run_dir.display(), self.label());
        fs::DirBuilder::new()
            .recursive(true)
            .mode(RUN_DIR_MODE)
            .create(&run_dir)
            .map_err(|source| DaemonError::RunDirCreate {
                path: run_dir,
                source,
            })
    }

    /// Periodic re-check: confirms liveness, starting the daemon if needed.
    ///
    /// A PID file that exists but cannot be read may still name a running
    /// process, so nothing is started and the check is retried next period.
    pub fn start_check(&mut self) -> Directive {
        let pid = match self.layout.read_pid() {
            Ok(pid) => pid,
            Err(err) => {
                error!("Check of '{}' ({}): {err}", self.label(), err.kind());
                return Directive::Continue;
            }
        };

        if let Some(pid) = pid
            && self.process.is_alive(pid)
        {
            debug!("Checked '{}': alive pid: {pid}", self.label());
            self.state = DaemonState::Up;
            return Directive::Continue;
        }

        if self.start() {
            Directive::Continue
        } else {
            info!("Start of '{}' failed, done trying", self.label());
            Directive::Stop
        }
    }

    /// Launches the daemon. Returns whether the launcher succeeded.
    pub fn start(&mut self) -> bool {
        match self.launch() {
            Ok(()) => {
                self.state = DaemonState::Up;
                true
            }
            Err(err) => {
                error!("On exec for '{}' ({}): {err}", self.label(), err.kind());
                self.state = DaemonState::Failed;
                false
            }
        }
    }

    /// Runs the executable to completion with the run directory as its
    /// working directory. The supervisor's own working directory is untouched.
    fn launch(&self) -> Result<(), DaemonError> {
        let (exe, version) = self.resolve_exe()?;
        let epath = PathBuf::from(absolute(&exe)?);
        let args = self.args()?;
        let run_dir = self.run_dir()?;

        let launched = version.unwrap_or_else(|| epath.display().to_string());
        info!("Starting '{}': {} {}", self.label(), launched, args.join(" "));

        if !is_executable(&epath) {
            return Err(DaemonError::NotExecutable(epath));
        }

        let status = Command::new(&epath)
            .args(&args)
            .current_dir(&run_dir)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| DaemonError::SpawnError {
                path: epath.clone(),
                source,
            })?;

        if !status.success() {
            return Err(DaemonError::SpawnFailed(status));
        }
        Ok(())
    }

    /// Whether the daemon could be started, without starting it.
    pub fn pre_check(&self) -> bool {
        let epath = match self
            .exe_path()
            .and_then(|exe| absolute(&exe).map(PathBuf::from))
        {
            Ok(epath) => epath,
            Err(err) => {
                warn!("Pre-check for '{}': {err}", self.label());
                return false;
            }
        };

        let executable = is_executable(&epath);
        if !executable {
            warn!("{} is not executable", epath.display());
        }
        executable
    }

    /// Fingerprint of the launch configuration.
    ///
    /// An unresolvable executable is replaced by a unique placeholder, so two
    /// daemons that both fail resolution never compare equal.
    pub fn exec_key(&self) -> Result<ExecKey, ResolveError> {
        let exe = self.exe_path().unwrap_or_else(|err| {
            warn!("Exec key for '{}': {err}", self.label());
            unresolved_exe_path()
        });

        let mut parts = vec![absolute(&self.run_dir()?)?, absolute(&exe)?];
        parts.extend(self.args()?);
        Ok(ExecKey::new(parts))
    }

    /// Sends SIGTERM, waits up to `stop_delay`, then SIGKILL if still running.
    ///
    /// Returns true once the termination signal was delivered. A missing PID,
    /// an already gone process or a refused signal yield false.
    pub fn stop(&mut self) -> bool {
        let Some(pid) = self.pid() else {
            debug!("No PID for '{}', nothing to stop", self.label());
            return false;
        };

        info!("Sending TERM signal to '{}' (PID {pid})", self.label());
        match self.process.terminate(pid) {
            Ok(()) => {}
            Err(SignalError::NoSuchProcess(_)) => {
                debug!("'{}' (PID {pid}) already gone", self.label());
                return false;
            }
            Err(err) => {
                let err = DaemonError::from(err);
                error!("On stop for '{}' ({}): {err}", self.label(), err.kind());
                return false;
            }
        }

        if !self.wait_pid(pid) {
            info!("Sending KILL signal to '{}' (PID {pid})", self.label());
            match self.process.kill(pid) {
                Ok(()) | Err(SignalError::NoSuchProcess(_)) => {}
                Err(err) => {
                    let err = DaemonError::from(err);
                    error!("On kill for '{}' ({}): {err}", self.label(), err.kind());
                }
            }
        }

        self.state = DaemonState::Stopped;
        true
    }

    /// Polls until `pid` is gone or `stop_delay` is spent.
    ///
    /// Sleeps start at [`WAIT_QUANTUM`] and grow by it each round up to
    /// [`WAIT_QUANTUM_CAP`], clipped to the remaining budget. The process is
    /// checked once more when the budget runs out. Returns true if it exited.
    pub fn wait_pid(&self, pid: i32) -> bool {
        let mut delta = WAIT_QUANTUM;
        let mut waited = Duration::ZERO;

        loop {
            if !self.process.is_alive(pid) {
                return true;
            }
            if waited >= self.stop_delay {
                return false;
            }

            let nap = delta.min(self.stop_delay - waited);
            thread::sleep(nap);
            waited += nap;
            delta = (delta + WAIT_QUANTUM).min(WAIT_QUANTUM_CAP);
        }
    }

    /// Supervisor shutdown hook: stops the daemon if `stop_on_exit` is set.
    pub fn do_exit(&mut self) -> bool {
        self.stop_on_exit && self.stop()
    }
}

/// Shared handle to a [`Daemon`], captured by the tasks it emits.
///
/// The mutex serialises lifecycle calls, so at most one operation is in
/// flight per daemon. Records are never shared between handles of different
/// daemons.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    inner: Arc<Mutex<Daemon>>,
}

impl From<Daemon> for DaemonHandle {
    fn from(daemon: Daemon) -> Self {
        Self::new(daemon)
    }
}

impl DaemonHandle {
    pub fn new(daemon: Daemon) -> Self {
        Self {
            inner: Arc::new(Mutex::new(daemon)),
        }
    }

    /// Locks the record. A poisoned lock is recovered; `state` is rewritten by
    /// the next lifecycle call anyway.
    pub fn lock(&self) -> MutexGuard<'_, Daemon> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs [`Daemon::do_first`] and registers the daemon's tasks unless it
    /// returned [`Directive::Stop`].
    pub fn do_first(&self, scheduler: &mut dyn Scheduler) -> Directive {
        if self.lock().do_first() == Directive::Stop {
            return Directive::Stop;
        }

        match self.tasks() {
            Ok(tasks) => {
                for task in tasks {
                    scheduler.add(task);
                }
                Directive::Continue
            }
            Err(err) => {
                let mut daemon = self.lock();
                error!("Scheduling '{}': {err}", daemon.label());
                daemon.state = DaemonState::Failed;
                Directive::Stop
            }
        }
    }

    /// Periodic work for this daemon: the re-check, plus one task per
    /// attached log rotator.
    ///
    /// The rotator on the default log is named `<full_name>.rotate`; others
    /// get the log's file name appended so names stay unique.
    pub fn tasks(&self) -> Result<Vec<Task>, ResolveError> {
        let daemon = self.lock();
        let full_name = daemon.full_name()?;
        let default_log = daemon.default_log().ok();

        let check = self.clone();
        let mut tasks = vec![Task::new(
            full_name.clone(),
            CHECK_PERIOD,
            TaskMode::Sync,
            move || check.lock().start_check(),
        )];

        for (log, rotator) in daemon.rotators() {
            let name = if default_log.as_deref() == Some(log) {
                format!("{full_name}{ROTATE_TASK_SUFFIX}")
            } else {
                let file_name = log
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                format!("{full_name}{ROTATE_TASK_SUFFIX}.{file_name}")
            };

            let layout = daemon.layout.clone();
            let rotator = Arc::clone(rotator);
            let label = full_name.clone();
            tasks.push(Task::new(
                name,
                rotator.check_period(),
                TaskMode::Async,
                move || {
                    let pid = layout.pid();
                    rotator.check_rotate(pid, &mut |rotated: &Path| {
                        info!("Rotating log {} for '{label}'", rotated.display());
                    });
                    Directive::Continue
                },
            ));
        }

        Ok(tasks)
    }

    /// See [`Daemon::do_exit`].
    pub fn do_exit(&self) -> bool {
        self.lock().do_exit()
    }

    pub fn state(&self) -> DaemonState {
        self.lock().state()
    }
}
