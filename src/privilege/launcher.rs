// src/privilege/launcher.rs

//! Launching the privileged helper as a child process
//!
//! The child is polled with `try_wait` until it exits or the timeout
//! passes, so no SIGCHLD handler is installed in the caller's process. A
//! child that outlives the timeout, or whose wait fails, gets SIGTERM.

use crate::error::{Error, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exit status reported when the helper could not be executed at all
pub const EXEC_FAILED: i32 = 0xde;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an argument vector and reports the child's exit status
pub trait Launcher: Send + Sync {
    fn launch(&self, argv: &[String]) -> Result<i32>;
}

/// Launcher that forks and execs real processes
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn terminate(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = kill(pid, Signal::SIGTERM) {
        debug!("SIGTERM to {} failed: {}", pid, e);
    }
    let _ = child.wait();
}

impl Launcher for ProcessLauncher {
    fn launch(&self, argv: &[String]) -> Result<i32> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::ParseError("empty argument vector".to_string()))?;

        debug!("Launching {:?}", argv);
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to execute {}: {}", program, e);
                return Ok(EXEC_FAILED);
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let code = status.code().unwrap_or(EXEC_FAILED);
                    debug!("{} exited with {}", program, code);
                    return Ok(code);
                }
                Ok(None) if Instant::now() >= deadline => {
                    terminate(&mut child);
                    return Err(Error::TimeoutError(format!(
                        "{} did not finish within {} seconds",
                        program,
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    terminate(&mut child);
                    return Err(Error::IoError(format!("waiting for {program}: {e}")));
                }
            }
        }
    }
}

/// Launcher that records every argument vector and returns a fixed status
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    exit_code: i32,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingLauncher {
    pub fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Launcher for RecordingLauncher {
    fn launch(&self, argv: &[String]) -> Result<i32> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(argv.to_vec());
        }
        Ok(self.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exit_status_is_reported() {
        let launcher = ProcessLauncher::new(Duration::from_secs(10));
        assert_eq!(launcher.launch(&argv(&["/bin/sh", "-c", "exit 0"])).unwrap(), 0);
        assert_eq!(launcher.launch(&argv(&["/bin/sh", "-c", "exit 3"])).unwrap(), 3);
    }

    #[test]
    fn test_missing_program_is_exec_failure() {
        let launcher = ProcessLauncher::new(Duration::from_secs(1));
        let code = launcher
            .launch(&argv(&["/nonexistent/prodreg-helper", "register"]))
            .unwrap();
        assert_eq!(code, EXEC_FAILED);
    }

    #[test]
    fn test_timeout_terminates_child() {
        let launcher = ProcessLauncher::new(Duration::from_millis(200));
        let started = Instant::now();
        let result = launcher.launch(&argv(&["/bin/sh", "-c", "sleep 30"]));
        assert!(matches!(result, Err(Error::TimeoutError(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_empty_argv() {
        let launcher = ProcessLauncher::new(Duration::from_secs(1));
        assert!(launcher.launch(&[]).is_err());
    }

    #[test]
    fn test_recording_launcher() {
        let launcher = RecordingLauncher::new(0);
        launcher.launch(&argv(&["a", "b"])).unwrap();
        assert_eq!(launcher.calls(), vec![argv(&["a", "b"])]);
    }
}
