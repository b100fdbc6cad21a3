//! The scan pipeline shared by every backend, and the per-attempt context
//! that makes cancellation and the single in-flight scan explicit.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::BackendScanner;
use crate::core::error::{Error, Result};
use crate::core::types::{LifecycleState, ScanResult, ScanTarget};
use crate::detection::parser;
use crate::history::{LogEntry, LogSink};
use crate::scanner::process::{ProcessRunner, ProcessSignaller};

/// Shared, thread-safe cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State of one scan attempt, owned by the thread running it.
pub struct ScanContext {
    token: CancellationToken,
    process: Mutex<Option<ProcessSignaller>>,
    state: Mutex<LifecycleState>,
}

impl ScanContext {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            process: Mutex::new(None),
            state: Mutex::new(LifecycleState::Running),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn state(&self) -> LifecycleState {
        *lock(&self.state)
    }

    fn set_state(&self, state: LifecycleState) {
        *lock(&self.state) = state;
    }

    /// Flag the attempt as cancelled and signal the engine if it is running.
    pub fn cancel(&self) {
        self.token.cancel();
        {
            let mut state = lock(&self.state);
            if matches!(*state, LifecycleState::Running | LifecycleState::Completing) {
                *state = LifecycleState::Cancelling;
            }
        }
        if let Some(signaller) = lock(&self.process).as_ref() {
            signaller.terminate();
        }
    }

    fn attach_process(&self, signaller: ProcessSignaller) {
        *lock(&self.process) = Some(signaller);
    }

    fn detach_process(&self) {
        *lock(&self.process) = None;
    }
}

type Slot = Arc<Mutex<Option<Arc<ScanContext>>>>;

/// Proof that the caller owns the scanner's single in-flight slot. The slot
/// is released on drop.
pub struct ScanGuard {
    slot: Slot,
    context: Arc<ScanContext>,
}

impl ScanGuard {
    pub fn context(&self) -> &ScanContext {
        &self.context
    }
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.context))
        {
            *slot = None;
        }
    }
}

/// Engine supervision, parsing and persistence common to all backends.
pub struct ScanCore {
    runner: ProcessRunner,
    log_sink: Option<Arc<dyn LogSink>>,
    slot: Slot,
}

impl ScanCore {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner,
            log_sink: None,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Persist every finished scan to `sink`.
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Claim the in-flight slot. Fails with [`Error::ScanInProgress`] while
    /// another attempt holds it.
    pub fn begin(&self) -> Result<ScanGuard> {
        let mut slot = lock(&self.slot);
        if slot.is_some() {
            return Err(Error::ScanInProgress);
        }
        let context = Arc::new(ScanContext::new());
        *slot = Some(Arc::clone(&context));
        Ok(ScanGuard {
            slot: Arc::clone(&self.slot),
            context,
        })
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// Lifecycle state of the in-flight scan, `Idle` when there is none.
    pub fn state(&self) -> LifecycleState {
        lock(&self.slot)
            .as_ref()
            .map(|ctx| ctx.state())
            .unwrap_or(LifecycleState::Idle)
    }

    /// Cancel the in-flight scan, if any. Does not wait.
    pub fn cancel(&self) {
        let current = lock(&self.slot).clone();
        match current {
            Some(ctx) => {
                log::info!("Cancelling scan");
                ctx.cancel();
            }
            None => log::debug!("Cancel requested with no scan running"),
        }
    }

    /// Run one scan attempt to a terminal result. Never fails: every error
    /// is folded into the returned [`ScanResult`].
    pub fn execute<B>(&self, backend: &B, target: &ScanTarget, guard: &ScanGuard) -> ScanResult
    where
        B: BackendScanner + ?Sized,
    {
        let started = Instant::now();
        let ctx = guard.context();
        let target = &target.absolutized();
        let path = target.display_path();

        log::info!("Starting {} scan of {}", backend.mode(), path);

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run(backend, target, ctx)))
            .unwrap_or_else(|_| {
                log::error!("Scan of {} aborted unexpectedly", path);
                ScanResult::error(&path, "Unexpected internal error during scan")
            });

        ctx.set_state(LifecycleState::Terminal(result.status));
        let elapsed = started.elapsed();
        log::info!(
            "Scan of {} finished: {} ({} infected, {:.1}s)",
            path,
            result.status,
            result.infected_count,
            elapsed.as_secs_f64()
        );
        self.persist(&result, elapsed);
        result
    }

    fn run<B>(&self, backend: &B, target: &ScanTarget, ctx: &ScanContext) -> ScanResult
    where
        B: BackendScanner + ?Sized,
    {
        let path = target.display_path();

        if let Err(e) = validate_target(&target.path) {
            log::warn!("Rejected scan target {}: {}", path, e);
            return ScanResult::error(&path, e.to_string());
        }

        if ctx.is_cancelled() {
            return ScanResult::cancelled(&path, String::new(), String::new());
        }

        let is_cancelled = || ctx.is_cancelled();
        let availability = backend.check_available_with(&is_cancelled);

        if ctx.is_cancelled() {
            return ScanResult::cancelled(&path, String::new(), String::new());
        }

        if !availability.available {
            log::warn!("{} backend unavailable: {}", backend.mode(), availability.detail);
            return ScanResult::error(&path, availability.detail);
        }

        let hints = backend.count_hints(target, &is_cancelled);
        let command = backend.build_command(target);
        log::debug!("Engine command: {:?}", command);

        let mut handle = match self.runner.run(&command) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("{}", e);
                return ScanResult::error(&path, e.to_string());
            }
        };

        ctx.attach_process(handle.signaller());
        // A cancel that landed before the signaller was attached
        if ctx.is_cancelled() {
            handle.signaller().terminate();
        }

        let output = self.runner.wait_cancellable(&mut handle, is_cancelled);
        ctx.detach_process();
        drop(handle);

        // The flag is checked before the exit code is trusted.
        if output.was_cancelled || ctx.is_cancelled() {
            return ScanResult::cancelled(&path, output.stdout, output.stderr);
        }

        ctx.set_state(LifecycleState::Completing);
        parser::parse(&path, &output.stdout, &output.stderr, output.exit_code, hints)
    }

    fn persist(&self, result: &ScanResult, elapsed: Duration) {
        let Some(sink) = &self.log_sink else {
            return;
        };
        let entry = LogEntry::from_scan(result, elapsed);
        if let Err(e) = sink.save_log(&entry) {
            log::warn!("Failed to save scan log: {}", e);
        }
    }
}

/// Check that the target exists and can be read.
pub fn validate_target(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::EmptyPath);
    }

    let metadata = fs::metadata(path).map_err(|e| Error::from_io(path, e))?;
    if metadata.is_dir() {
        fs::read_dir(path).map_err(|e| Error::from_io(path, e))?;
    } else {
        fs::File::open(path).map_err(|e| Error::from_io(path, e))?;
    }
    Ok(())
}
