//! Scan façade: backend selection, availability caching and dispatch.

use std::path::Path;
use std::sync::{Arc, Mutex};

use super::backend::{self, Availability, BackendScanner, DaemonScanner, ScanGuard, StandaloneScanner};
use super::dispatch::ContextHandle;
use crate::core::config::Config;
use crate::core::error::{Error, Result};
use crate::core::types::{BackendMode, QuarantineOutcome, ScanResult, ScanTarget};
use crate::history::LogSink;
use crate::quarantine::QuarantineManager;

/// Cached result of the daemon availability check.
///
/// Owned by one coordinator; cleared only by [`AvailabilityCache::invalidate`].
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    daemon: Mutex<Option<Availability>>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value or run `check` and cache it.
    pub fn get_or_check<F>(&self, check: F) -> Availability
    where
        F: FnOnce() -> Availability,
    {
        let mut slot = self.daemon.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(cached) = slot.as_ref() {
            return cached.clone();
        }
        let fresh = check();
        log_availability(&fresh);
        *slot = Some(fresh.clone());
        fresh
    }

    pub fn cached(&self) -> Option<Availability> {
        self.daemon.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn store(&self, availability: Availability) {
        log_availability(&availability);
        *self.daemon.lock().unwrap_or_else(|p| p.into_inner()) = Some(availability);
    }

    pub fn invalidate(&self) {
        *self.daemon.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }
}

fn log_availability(availability: &Availability) {
    log::debug!(
        "Daemon availability: {} ({})",
        availability.available,
        availability.detail
    );
}

/// The mode `Auto` resolves to for a given daemon availability.
fn auto_mode(daemon: &Availability) -> BackendMode {
    if daemon.available {
        BackendMode::Daemon
    } else {
        log::info!("Daemon unavailable ({}), using standalone scanner", daemon.detail);
        BackendMode::Standalone
    }
}

/// A scan whose slots are claimed, ready to run on a worker.
enum ScanJob {
    Ready {
        backend: Arc<dyn BackendScanner>,
        guard: ScanGuard,
    },
    /// `Auto` with nothing cached: both slots are held until the daemon
    /// check decides which backend runs.
    Resolve {
        standalone: Arc<StandaloneScanner>,
        daemon: Arc<DaemonScanner>,
        cache: Arc<AvailabilityCache>,
        standalone_guard: ScanGuard,
        daemon_guard: ScanGuard,
    },
}

impl ScanJob {
    fn run(self, target: &ScanTarget) -> ScanResult {
        match self {
            ScanJob::Ready { backend, guard } => backend.core().execute(backend.as_ref(), target, &guard),
            ScanJob::Resolve {
                standalone,
                daemon,
                cache,
                standalone_guard,
                daemon_guard,
            } => {
                let is_cancelled =
                    || standalone_guard.context().is_cancelled() || daemon_guard.context().is_cancelled();

                let availability = match cache.cached() {
                    Some(cached) => cached,
                    None => {
                        let fresh = daemon.check_available_with(&is_cancelled);
                        // An interrupted check says nothing about the daemon
                        if !is_cancelled() {
                            cache.store(fresh.clone());
                        }
                        fresh
                    }
                };

                if is_cancelled() {
                    standalone_guard.context().cancel();
                    daemon_guard.context().cancel();
                }

                match auto_mode(&availability) {
                    BackendMode::Daemon => {
                        drop(standalone_guard);
                        daemon.core().execute(daemon.as_ref(), target, &daemon_guard)
                    }
                    _ => {
                        drop(daemon_guard);
                        standalone
                            .core()
                            .execute(standalone.as_ref(), target, &standalone_guard)
                    }
                }
            }
        }
    }
}

/// Entry point for callers: picks a backend, runs scans and quarantines.
pub struct ScanCoordinator {
    mode: BackendMode,
    standalone: Arc<StandaloneScanner>,
    daemon: Arc<DaemonScanner>,
    availability: Arc<AvailabilityCache>,
    quarantine: QuarantineManager,
}

impl ScanCoordinator {
    pub fn new(config: &Config) -> Self {
        Self::build(config, None)
    }

    /// Coordinator whose scans are recorded in `sink`.
    pub fn with_log_sink(config: &Config, sink: Arc<dyn LogSink>) -> Self {
        Self::build(config, Some(sink))
    }

    fn build(config: &Config, sink: Option<Arc<dyn LogSink>>) -> Self {
        let mut standalone = StandaloneScanner::new(&config.engine);
        let mut daemon = DaemonScanner::new(&config.engine);
        if let Some(sink) = sink {
            standalone = standalone.with_log_sink(Arc::clone(&sink));
            daemon = daemon.with_log_sink(sink);
        }

        Self {
            mode: config.engine.backend,
            standalone: Arc::new(standalone),
            daemon: Arc::new(daemon),
            availability: Arc::new(AvailabilityCache::new()),
            quarantine: QuarantineManager::from_config(&config.quarantine),
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: BackendMode) {
        self.mode = mode;
    }

    pub fn availability_cache(&self) -> &AvailabilityCache {
        &self.availability
    }

    /// Drop the cached daemon availability so the next scan re-checks it.
    pub fn invalidate_availability(&self) {
        self.availability.invalidate();
    }

    /// Resolve `Auto` to a concrete mode, checking the daemon on this
    /// thread when nothing is cached.
    pub fn resolve_mode(&self) -> BackendMode {
        match self.mode {
            BackendMode::Auto => {
                let daemon = self.availability.get_or_check(|| self.daemon.check_available());
                auto_mode(&daemon)
            }
            mode => mode,
        }
    }

    fn backend_for(&self, mode: BackendMode) -> Arc<dyn BackendScanner> {
        match mode {
            BackendMode::Daemon => Arc::clone(&self.daemon) as Arc<dyn BackendScanner>,
            _ => Arc::clone(&self.standalone) as Arc<dyn BackendScanner>,
        }
    }

    /// Claim the slot(s) a scan needs without running any engine.
    ///
    /// An uncached `Auto` claims both backends so the daemon check can run
    /// on the worker.
    fn prepare(&self) -> Result<ScanJob> {
        let mode = match self.mode {
            BackendMode::Auto => match self.availability.cached() {
                Some(cached) => auto_mode(&cached),
                None => {
                    let standalone_guard = self.standalone.core().begin()?;
                    let daemon_guard = self.daemon.core().begin()?;
                    return Ok(ScanJob::Resolve {
                        standalone: Arc::clone(&self.standalone),
                        daemon: Arc::clone(&self.daemon),
                        cache: Arc::clone(&self.availability),
                        standalone_guard,
                        daemon_guard,
                    });
                }
            },
            mode => mode,
        };

        let backend = self.backend_for(mode);
        let guard = backend.core().begin()?;
        Ok(ScanJob::Ready { backend, guard })
    }

    /// Check both backends without touching the cache.
    pub fn check_backends(&self) -> Vec<(BackendMode, Availability)> {
        vec![
            (BackendMode::Standalone, self.standalone.check_available()),
            (BackendMode::Daemon, self.daemon.check_available()),
        ]
    }

    /// Blocking scan on the calling thread.
    pub fn scan_sync(&self, target: &ScanTarget) -> Result<ScanResult> {
        Ok(self.prepare()?.run(target))
    }

    /// Background scan; `callback` runs on `context`.
    ///
    /// Returns as soon as the slot is claimed. Backend resolution and every
    /// engine invocation happen on the worker.
    pub fn scan_async<F>(&self, target: ScanTarget, context: &ContextHandle, callback: F) -> Result<()>
    where
        F: FnOnce(ScanResult) + Send + 'static,
    {
        let job = self.prepare()?;
        backend::spawn_scan("clamcore-scan".to_string(), move || job.run(&target), context, callback)
    }

    /// Async scan for callers already inside a tokio runtime.
    pub async fn scan(&self, target: ScanTarget) -> Result<ScanResult> {
        let job = self.prepare()?;
        tokio::task::spawn_blocking(move || job.run(&target))
            .await
            .map_err(|e| Error::Internal(format!("Scan task failed: {}", e)))
    }

    /// Cancel whatever scan is running on either backend.
    pub fn cancel(&self) {
        self.standalone.cancel();
        self.daemon.cancel();
    }

    pub fn is_busy(&self) -> bool {
        self.standalone.is_busy() || self.daemon.is_busy()
    }

    pub fn quarantine_manager(&self) -> &QuarantineManager {
        &self.quarantine
    }

    /// Quarantine every file `result` reports as infected.
    pub fn quarantine(&self, result: &ScanResult, dir: Option<&Path>) -> QuarantineOutcome {
        self.quarantine.quarantine_result(result, dir)
    }
}
