//! Scan backends.
//!
//! Both engine modes share one pipeline ([`ScanCore`]); a backend only
//! decides how to check availability, how to build the engine command and
//! whether to gather file counts itself.

pub mod daemon;
pub mod pipeline;
pub mod precount;
pub mod standalone;

pub use daemon::DaemonScanner;
pub use pipeline::{CancellationToken, ScanContext, ScanCore, ScanGuard};
pub use standalone::StandaloneScanner;

use std::sync::Arc;
use std::thread;

use crate::core::error::{Error, Result};
use crate::core::types::{BackendMode, LifecycleState, ScanResult, ScanTarget};
use crate::detection::parser::CountHints;
use crate::scanner::dispatch::ContextHandle;

/// Result of an engine availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub available: bool,
    /// Version or location on success, a user-facing reason on failure.
    pub detail: String,
}

/// Detail reported when an availability check was stopped by cancellation.
pub const CHECK_CANCELLED: &str = "Availability check cancelled";

impl Availability {
    pub fn available(detail: impl Into<String>) -> Self {
        Self {
            available: true,
            detail: detail.into(),
        }
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            detail: detail.into(),
        }
    }

    /// Unavailable, described by the engine error that caused it.
    pub fn from_error(error: Error) -> Self {
        log::debug!("Availability check failed ({}): {}", error.category(), error);
        Self::unavailable(error.to_string())
    }
}

/// A scanner driving one ClamAV engine mode.
///
/// Each instance allows a single in-flight scan. `scan_sync` and
/// [`scan_async`] only fail with [`Error::ScanInProgress`]; every other
/// problem is reported as an error-status [`ScanResult`].
pub trait BackendScanner: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// The shared pipeline state of this scanner.
    fn core(&self) -> &ScanCore;

    /// Check the engine. A check that is still running when `is_cancelled`
    /// turns true is stopped and reports [`CHECK_CANCELLED`].
    fn check_available_with(&self, is_cancelled: &dyn Fn() -> bool) -> Availability;

    fn check_available(&self) -> Availability {
        self.check_available_with(&|| false)
    }

    /// Engine argv for `target`, program first.
    fn build_command(&self, target: &ScanTarget) -> Vec<String>;

    /// Counts the engine will not report itself.
    fn count_hints(&self, _target: &ScanTarget, _is_cancelled: &dyn Fn() -> bool) -> CountHints {
        CountHints::default()
    }

    /// Run a scan on the calling thread.
    fn scan_sync(&self, target: &ScanTarget) -> Result<ScanResult> {
        let guard = self.core().begin()?;
        Ok(self.core().execute(self, target, &guard))
    }

    /// Request cancellation of the in-flight scan. Returns immediately.
    fn cancel(&self) {
        self.core().cancel();
    }

    fn is_busy(&self) -> bool {
        self.core().is_busy()
    }

    fn state(&self) -> LifecycleState {
        self.core().state()
    }
}

/// Run a scan on a worker thread and deliver the result on `context`.
///
/// The in-flight check happens before this returns, so a second call while
/// a scan runs fails immediately. The slot is released before the callback
/// is posted.
pub fn scan_async<F>(
    scanner: Arc<dyn BackendScanner>,
    target: ScanTarget,
    context: &ContextHandle,
    callback: F,
) -> Result<()>
where
    F: FnOnce(ScanResult) + Send + 'static,
{
    let guard = scanner.core().begin()?;
    let name = format!("clamcore-{}-scan", scanner.mode());

    spawn_scan(
        name,
        move || {
            let result = scanner.core().execute(scanner.as_ref(), &target, &guard);
            drop(guard);
            result
        },
        context,
        callback,
    )
}

/// Run `job` on a named thread and post its result to `context`.
///
/// `job` must release whatever slot it holds before returning.
pub(crate) fn spawn_scan<J, F>(name: String, job: J, context: &ContextHandle, callback: F) -> Result<()>
where
    J: FnOnce() -> ScanResult + Send + 'static,
    F: FnOnce(ScanResult) + Send + 'static,
{
    let context = context.clone();

    thread::Builder::new()
        .name(name)
        .spawn(move || {
            let result = job();
            if !context.post(move || callback(result)) {
                log::warn!("Result context closed; scan result dropped");
            }
        })
        .map_err(|e| Error::Internal(format!("Failed to start scan thread: {}", e)))?;

    Ok(())
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    //! Fake engines written as shell scripts.

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script into `dir`.
    pub fn fake_engine(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        // Let concurrent test forks drop the inherited write handle (ETXTBSY)
        std::thread::sleep(std::time::Duration::from_millis(20));
        path
    }
}
