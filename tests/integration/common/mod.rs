#![allow(dead_code)]

use std::{
    fs,
    path::Path,
    process::{Command, ExitStatus},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use keepup::Context;
use sysinfo::{Pid, ProcessesToUpdate, System};

pub fn context_in(dir: &Path) -> Context {
    Context::with_base_dir(dir.to_path_buf())
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn read_pid(path: &Path) -> u32 {
    wait_for_path(path);
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Ok(contents) = fs::read_to_string(path)
            && let Ok(pid) = contents.trim().parse::<u32>()
        {
            return pid;
        }
        if Instant::now() >= deadline {
            panic!("Timed out waiting for a PID in {:?}", path);
        }
        thread::sleep(Duration::from_millis(50));
    }
}

pub fn is_process_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    system.process(Pid::from_u32(pid)).is_some()
}

/// A child of the test process that is reaped as soon as it exits, so it
/// never lingers as a zombie that still answers liveness probes.
pub struct ReapedChild {
    pub pid: u32,
    waiter: JoinHandle<ExitStatus>,
}

impl ReapedChild {
    /// Runs `script` under `sh -c` in `dir` and records its PID in `pid_file`.
    pub fn spawn(dir: &Path, script: &str, pid_file: &Path) -> Self {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(dir)
            .spawn()
            .expect("spawn child");
        let pid = child.id();
        if let Some(parent) = pid_file.parent() {
            fs::create_dir_all(parent).expect("create pid dir");
        }
        fs::write(pid_file, format!("{pid}\n")).expect("write pid file");

        let waiter = thread::spawn(move || child.wait().expect("wait child"));
        Self { pid, waiter }
    }

    /// Waits for the child to be reaped and returns its exit status.
    pub fn join(self) -> ExitStatus {
        self.waiter.join().expect("reaper thread")
    }
}
