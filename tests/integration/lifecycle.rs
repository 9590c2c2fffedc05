//! Integration tests covering start, re-check and first-run validation.

#[path = "common/mod.rs"]
mod common;

use std::{fs, time::Duration};

use common::{context_in, is_process_alive, read_pid};
use keepup::{
    DaemonBuilder, DaemonHandle, DaemonState, Directive, Task, TaskMode,
    constants::CHECK_PERIOD, test_utils::write_script,
};
use tempfile::tempdir;

/// Init script that backgrounds a long sleep, records its PID and each launch.
const FORKING_INIT: &str = r#"
echo launched >> launches.log
sleep 30 > /dev/null 2>&1 &
echo $! > worker.pid
"#;

fn launches(run_dir: &std::path::Path) -> usize {
    fs::read_to_string(run_dir.join("launches.log"))
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

#[test]
fn start_check_spawns_once_then_observes_live_pid() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(&temp.path().join("bin/worker"), FORKING_INIT);

    let mut daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .instance("9")
        .exe_path(exe.as_path())
        .stop_delay(Duration::from_secs(2))
        .build()
        .expect("daemon definition");

    let run_dir = daemon.run_dir().unwrap();
    assert_eq!(run_dir, temp.path().join("worker-9"));
    fs::create_dir_all(&run_dir).unwrap();
    assert_eq!(daemon.pid(), None);

    assert_eq!(daemon.start_check(), Directive::Continue);
    assert_eq!(daemon.state(), DaemonState::Up);
    assert_eq!(launches(&run_dir), 1);

    let pid = read_pid(&run_dir.join("worker.pid"));
    assert!(is_process_alive(pid), "daemon process should be running");
    assert_eq!(daemon.pid(), Some(pid as i32));
    assert!(daemon.is_alive());

    assert_eq!(daemon.start_check(), Directive::Continue);
    assert_eq!(daemon.state(), DaemonState::Up);
    assert_eq!(launches(&run_dir), 1, "live daemon must not be relaunched");

    assert!(daemon.stop());
    assert_eq!(daemon.state(), DaemonState::Stopped);
}

#[test]
fn start_check_restarts_when_pid_file_is_stale() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(&temp.path().join("bin/worker"), "echo launched >> launches.log");

    let mut daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .exe_path(exe.as_path())
        .build()
        .unwrap();
    let run_dir = daemon.run_dir().unwrap();
    fs::create_dir_all(&run_dir).unwrap();

    for stale in ["garbage", "0", "-5"] {
        fs::write(daemon.pid_file().unwrap(), stale).unwrap();
        assert_eq!(daemon.start_check(), Directive::Continue);
    }
    assert_eq!(launches(&run_dir), 3);
    assert_eq!(daemon.state(), DaemonState::Up);
}

#[test]
fn do_first_refuses_missing_run_dir_when_not_allowed_to_create() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(&temp.path().join("bin/worker"), "exit 0");

    let handle = DaemonHandle::new(
        DaemonBuilder::new(context_in(temp.path()))
            .name("worker")
            .instance("9")
            .exe_path(exe.as_path())
            .make_run_dir(false)
            .build()
            .unwrap(),
    );

    let mut scheduler: Vec<Task> = Vec::new();
    assert_eq!(handle.do_first(&mut scheduler), Directive::Stop);
    assert_eq!(handle.state(), DaemonState::Failed);
    assert!(scheduler.is_empty());
    assert!(!temp.path().join("worker-9").exists());
}

#[test]
fn do_first_contains_run_dir_creation_failure() {
    let temp = tempdir().expect("failed to create temp dir");
    let blocker = temp.path().join("base");
    fs::write(&blocker, "a file, not a directory").unwrap();

    let handle = DaemonHandle::new(
        DaemonBuilder::new(context_in(&blocker))
            .name("worker")
            .exe_path("/bin/sh")
            .build()
            .unwrap(),
    );

    let mut scheduler: Vec<Task> = Vec::new();
    assert_eq!(handle.do_first(&mut scheduler), Directive::Stop);
    assert_eq!(handle.state(), DaemonState::Failed);
    assert!(scheduler.is_empty());
}

#[test]
fn do_first_creates_run_dir_and_registers_check_task() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(&temp.path().join("bin/worker"), "exit 0");

    let handle = DaemonHandle::new(
        DaemonBuilder::new(context_in(temp.path()))
            .name("worker")
            .instance("9")
            .exe_path(exe.as_path())
            .build()
            .unwrap(),
    );

    let mut scheduler: Vec<Task> = Vec::new();
    assert_eq!(handle.do_first(&mut scheduler), Directive::Continue);
    assert_eq!(handle.state(), DaemonState::Up);
    assert!(temp.path().join("worker-9").is_dir());

    assert_eq!(scheduler.len(), 1);
    let check = &mut scheduler[0];
    assert_eq!(check.name(), "worker-9");
    assert_eq!(check.period(), CHECK_PERIOD);
    assert_eq!(check.mode(), TaskMode::Sync);
    assert_eq!(check.run(), Directive::Continue);
}

#[test]
fn pre_check_does_not_launch() {
    let temp = tempdir().expect("failed to create temp dir");
    let exe = write_script(&temp.path().join("bin/worker"), "echo launched >> launches.log");

    let daemon = DaemonBuilder::new(context_in(temp.path()))
        .name("worker")
        .exe_path(exe.as_path())
        .build()
        .unwrap();
    fs::create_dir_all(daemon.run_dir().unwrap()).unwrap();

    assert!(daemon.pre_check());
    assert_eq!(launches(&daemon.run_dir().unwrap()), 0);
    assert_eq!(daemon.state(), DaemonState::Begin);
}
