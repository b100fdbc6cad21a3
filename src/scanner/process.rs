//! Supervision of one external engine process.
//!
//! The wait loop polls the child with a short sleep so a cancellation flag
//! is observed within one poll interval. Cancellation escalates from SIGTERM
//! to SIGKILL, each step bounded by a fixed grace period.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::config::EngineConfig;
use crate::core::error::{Error, Result};

/// Exit code reported when the process died from a signal or was never reaped.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Output collected from a finished or cancelled engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub was_cancelled: bool,
}

/// Handle on a running engine process.
///
/// Dropping the handle kills and reaps the process if it is still running.
pub struct ProcessHandle {
    program: String,
    child: Arc<Mutex<Child>>,
    status: Option<ExitStatus>,
    stdout_rx: Option<Receiver<String>>,
    stderr_rx: Option<Receiver<String>>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("program", &self.program)
            .field("pid", &self.pid())
            .field("status", &self.status)
            .finish()
    }
}

impl ProcessHandle {
    /// Program name the handle was spawned from.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id.
    pub fn pid(&self) -> u32 {
        lock_child(&self.child).id()
    }

    /// A cloneable handle that can signal the process from another thread.
    pub fn signaller(&self) -> ProcessSignaller {
        ProcessSignaller {
            child: Arc::clone(&self.child),
        }
    }

    /// Whether the process has been reaped.
    pub fn has_exited(&mut self) -> bool {
        self.poll().is_some()
    }

    /// Non-blocking reap.
    fn poll(&mut self) -> Option<ExitStatus> {
        if self.status.is_none() {
            match lock_child(&self.child).try_wait() {
                Ok(status) => self.status = status,
                Err(e) => log::debug!("try_wait on {} failed: {}", self.program, e),
            }
        }
        self.status
    }

    /// Poll until the process exits or `timeout` passes.
    fn wait_for_exit(&mut self, timeout: Duration, poll_interval: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll().is_some() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(poll_interval.min(deadline - now));
        }
    }

    fn exit_code(&self) -> i32 {
        self.status
            .and_then(|s| s.code())
            .unwrap_or(UNKNOWN_EXIT_CODE)
    }

    fn force_kill(&mut self) {
        if self.poll().is_some() {
            return;
        }
        if let Err(e) = lock_child(&self.child).kill() {
            log::debug!("Failed to kill {}: {}", self.program, e);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        cleanup(Some(self));
    }
}

/// Sends termination requests to a running process from any thread.
#[derive(Clone)]
pub struct ProcessSignaller {
    child: Arc<Mutex<Child>>,
}

impl ProcessSignaller {
    /// Ask the process to terminate without waiting for it.
    ///
    /// The check and the signal happen under the same lock as reaping, so a
    /// reaped (and possibly reused) pid is never signalled.
    pub fn terminate(&self) {
        let mut child = lock_child(&self.child);
        if let Ok(None) = child.try_wait() {
            send_terminate(&mut child);
        }
    }
}

fn lock_child(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) {
    use rustix::process::{kill_process, Pid, Signal};

    let Some(pid) = Pid::from_raw(child.id() as i32) else {
        return;
    };
    if let Err(e) = kill_process(pid, Signal::Term) {
        log::debug!("SIGTERM to pid {} failed: {}", child.id(), e);
    }
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to stop pid {}: {}", child.id(), e);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = source.read_to_end(&mut buf) {
            log::debug!("Engine output stream closed with error: {}", e);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

fn collect(rx: Option<Receiver<String>>, timeout: Duration) -> String {
    let Some(rx) = rx else {
        return String::new();
    };
    match rx.recv_timeout(timeout) {
        Ok(text) => text,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Timed out collecting engine output");
            String::new()
        }
        Err(RecvTimeoutError::Disconnected) => String::new(),
    }
}

/// Spawns and supervises engine processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
    terminate_grace: Duration,
    kill_wait: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl ProcessRunner {
    /// Create a runner using the engine timing settings.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            terminate_grace: config.terminate_grace(),
            kill_wait: config.kill_wait(),
        }
    }

    /// Override the timing constants.
    pub fn with_timings(poll_interval: Duration, terminate_grace: Duration, kill_wait: Duration) -> Self {
        Self {
            poll_interval,
            terminate_grace,
            kill_wait,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Spawn `command[0]` with the remaining arguments, capturing stdout and
    /// stderr separately.
    pub fn run(&self, command: &[String]) -> Result<ProcessHandle> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::spawn("<empty>", "no command given"))?;

        log::debug!("Spawning: {}", command.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::spawn(program, "executable not found"),
                std::io::ErrorKind::PermissionDenied => {
                    Error::spawn(program, "permission denied when executing")
                }
                _ => Error::spawn(program, e.to_string()),
            })?;

        let stdout_rx = child.stdout.take().map(spawn_reader);
        let stderr_rx = child.stderr.take().map(spawn_reader);

        Ok(ProcessHandle {
            program: program.clone(),
            child: Arc::new(Mutex::new(child)),
            status: None,
            stdout_rx,
            stderr_rx,
        })
    }

    /// Wait for the process, checking `is_cancelled` once per poll interval.
    ///
    /// On cancellation the process is terminated gracefully and whatever it
    /// wrote before exiting is returned.
    pub fn wait_cancellable<F>(&self, handle: &mut ProcessHandle, is_cancelled: F) -> ProcessOutput
    where
        F: Fn() -> bool,
    {
        let mut was_cancelled = false;

        loop {
            if is_cancelled() {
                log::info!("Cancellation observed, stopping {}", handle.program);
                was_cancelled = true;
                self.terminate_gracefully(handle);
                break;
            }
            if handle.poll().is_some() {
                break;
            }
            thread::sleep(self.poll_interval);
        }

        // Natural exit closes the pipes; after a kill allow only the short wait.
        let drain = if was_cancelled {
            self.kill_wait
        } else {
            self.terminate_grace
        };
        let stdout = collect(handle.stdout_rx.take(), drain);
        let stderr = collect(handle.stderr_rx.take(), drain);

        ProcessOutput {
            stdout,
            stderr,
            exit_code: handle.exit_code(),
            was_cancelled,
        }
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL and wait briefly.
    ///
    /// Failure to reap is logged and otherwise ignored.
    pub fn terminate_gracefully(&self, handle: &mut ProcessHandle) {
        if handle.has_exited() {
            return;
        }

        handle.signaller().terminate();
        if handle.wait_for_exit(self.terminate_grace, self.poll_interval) {
            return;
        }

        log::warn!(
            "{} did not exit within {:?}, killing",
            handle.program,
            self.terminate_grace
        );
        handle.force_kill();
        if !handle.wait_for_exit(self.kill_wait, self.poll_interval) {
            log::warn!("{} could not be reaped after kill", handle.program);
        }
    }
}

/// Kill and reap a process if it is still running. Safe to call repeatedly,
/// on exited processes, and with `None`.
pub fn cleanup(handle: Option<&mut ProcessHandle>) {
    let Some(handle) = handle else {
        return;
    };
    if handle.has_exited() {
        return;
    }
    handle.force_kill();
    handle.wait_for_exit(Duration::from_secs(2), Duration::from_millis(20));
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sh(script: &str) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn fast_runner() -> ProcessRunner {
        ProcessRunner::with_timings(
            Duration::from_millis(20),
            Duration::from_millis(500),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_run_collects_output_and_exit_code() {
        let runner = fast_runner();
        let mut handle = runner
            .run(&sh("echo out; echo err >&2; exit 1"))
            .unwrap();
        let output = runner.wait_cancellable(&mut handle, || false);

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 1);
        assert!(!output.was_cancelled);
    }

    #[test]
    fn test_spawn_missing_executable() {
        let runner = fast_runner();
        let err = runner
            .run(&["/nonexistent/clamscan".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
        assert!(err.to_string().contains("executable not found"));

        assert!(runner.run(&[]).is_err());
    }

    #[test]
    fn test_cancellation_terminates_process() {
        let runner = fast_runner();
        let mut handle = runner.run(&sh("echo started; exec sleep 30")).unwrap();
        let cancelled = AtomicBool::new(false);

        let start = Instant::now();
        let output = runner.wait_cancellable(&mut handle, || {
            if start.elapsed() > Duration::from_millis(200) {
                cancelled.store(true, Ordering::SeqCst);
            }
            cancelled.load(Ordering::SeqCst)
        });

        assert!(output.was_cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(handle.has_exited());
    }

    #[test]
    fn test_escalates_to_kill_when_term_is_ignored() {
        let runner = fast_runner();
        let mut handle = runner.run(&sh("trap '' TERM; while true; do sleep 0.05; done")).unwrap();
        thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        runner.terminate_gracefully(&mut handle);
        assert!(handle.has_exited());
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_signaller_and_cleanup_are_idempotent() {
        let runner = fast_runner();
        let mut handle = runner.run(&sh("exec sleep 30")).unwrap();
        let signaller = handle.signaller();
        signaller.terminate();
        assert!(handle.wait_for_exit(Duration::from_secs(2), Duration::from_millis(20)));

        signaller.terminate();
        cleanup(Some(&mut handle));
        cleanup(Some(&mut handle));
        cleanup(None);
    }
}
