//! Integration tests for emitted scheduler tasks and configuration drift.

#[path = "common/mod.rs"]
mod common;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use common::context_in;
use keepup::{
    DaemonBuilder, DaemonHandle, Directive, LogRotator, TaskMode, fingerprint::KeyLedger,
    test_utils::write_script,
};
use tempfile::tempdir;

/// Rotator that rotates on every check and remembers the PIDs it was given.
struct RecordingRotator {
    log: PathBuf,
    period: Duration,
    seen: Mutex<Vec<Option<i32>>>,
}

impl RecordingRotator {
    fn new(log: PathBuf, period: Duration) -> Self {
        Self {
            log,
            period,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl LogRotator for RecordingRotator {
    fn log_path(&self) -> &Path {
        &self.log
    }

    fn check_period(&self) -> Duration {
        self.period
    }

    fn check_rotate(&self, pid: Option<i32>, on_rotate: &mut dyn FnMut(&Path)) {
        self.seen.lock().unwrap().push(pid);
        on_rotate(&self.log);
    }
}

#[test]
fn rotation_tasks_run_independently_with_current_pid() {
    let temp = tempdir().expect("failed to create temp dir");
    let mut daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .instance("9")
        .exe_path("/bin/sh")
        .build()
        .unwrap();

    daemon
        .log_rotate(|log| RecordingRotator::new(log, Duration::from_secs(60)))
        .unwrap();
    let access = Arc::new(RecordingRotator::new(
        daemon.in_dir("access.log").unwrap(),
        Duration::from_secs(300),
    ));
    daemon.add_rotator(access.clone());
    assert_eq!(daemon.rotators().count(), 2);

    let pid_file = daemon.pid_file().unwrap();
    fs::create_dir_all(pid_file.parent().unwrap()).unwrap();
    fs::write(&pid_file, "777\n").unwrap();

    let handle = DaemonHandle::new(daemon);
    let mut tasks = handle.tasks().unwrap();
    let names: Vec<_> = tasks.iter().map(|task| task.name().to_string()).collect();
    assert_eq!(
        names,
        vec!["worker-9", "worker-9.rotate.access.log", "worker-9.rotate"]
    );

    let access_task = tasks
        .iter_mut()
        .find(|task| task.name() == "worker-9.rotate.access.log")
        .unwrap();
    assert_eq!(access_task.mode(), TaskMode::Async);
    assert_eq!(access_task.period(), Duration::from_secs(300));
    assert_eq!(access_task.run(), Directive::Continue);
    assert_eq!(*access.seen.lock().unwrap(), vec![Some(777)]);

    fs::remove_file(&pid_file).unwrap();
    assert_eq!(access_task.run(), Directive::Continue);
    assert_eq!(*access.seen.lock().unwrap(), vec![Some(777), None]);

    let default_task = tasks
        .iter()
        .find(|task| task.name() == "worker-9.rotate")
        .unwrap();
    assert_eq!(default_task.period(), Duration::from_secs(60));
}

#[test]
fn rotation_tasks_can_run_on_worker_threads() {
    let temp = tempdir().expect("failed to create temp dir");
    let mut daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .exe_path("/bin/sh")
        .build()
        .unwrap();
    let rotator = Arc::new(RecordingRotator::new(
        daemon.default_log().unwrap(),
        Duration::from_secs(1),
    ));
    daemon.add_rotator(rotator.clone());

    let handle = DaemonHandle::new(daemon);
    let mut tasks = handle.tasks().unwrap();
    let mut rotate = tasks.pop().unwrap();
    assert_eq!(rotate.name(), "worker.rotate");

    std::thread::spawn(move || rotate.run()).join().unwrap();
    assert_eq!(*rotator.seen.lock().unwrap(), vec![None]);
}

#[test]
fn check_task_drives_start_check() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(
        &temp.path().join("bin/worker"),
        "echo launched >> launches.log",
    );
    let daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .exe_path(exe.as_path())
        .build()
        .unwrap();
    let run_dir = daemon.run_dir().unwrap();
    fs::create_dir_all(&run_dir).unwrap();

    let handle = DaemonHandle::new(daemon);
    let mut check = handle.tasks().unwrap().remove(0);
    assert_eq!(check.run(), Directive::Continue);
    assert_eq!(check.run(), Directive::Continue);

    let launches = fs::read_to_string(run_dir.join("launches.log")).unwrap();
    assert_eq!(launches.lines().count(), 2);

    handle.lock().set_exe_path(temp.path().join("missing"));
    assert_eq!(check.run(), Directive::Stop);
}

#[test]
fn ledger_flags_changed_launch_configuration() {
    let temp = tempdir().expect("failed to create temp dir");
    let ledger_path = temp.path().join("state/exec_keys.json");
    let mut daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .instance("9")
        .exe_path("/usr/local/bin/worker")
        .args(vec!["--port", "9"])
        .build()
        .unwrap();
    let full_name = daemon.full_name().unwrap();

    let mut ledger = KeyLedger::load(&ledger_path).unwrap();
    ledger.record(&full_name, daemon.exec_key().unwrap());
    ledger.save(&ledger_path).unwrap();

    let ledger = KeyLedger::load(&ledger_path).unwrap();
    assert!(!ledger.changed(&full_name, &daemon.exec_key().unwrap()));

    daemon.set_exe_path("/usr/local/bin/worker2");
    assert!(ledger.changed(&full_name, &daemon.exec_key().unwrap()));
}
