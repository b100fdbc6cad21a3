//! Daemon backend (`clamdscan`).
//!
//! The daemon keeps signatures loaded, so scans start fast, but its client
//! prints no file or directory totals. Counts are gathered by walking the
//! target before the engine starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{precount, Availability, BackendScanner, ScanCore, CHECK_CANCELLED};
use crate::core::config::EngineConfig;
use crate::core::error::Error;
use crate::core::types::{BackendMode, ScanTarget};
use crate::detection::parser::CountHints;
use crate::history::LogSink;
use crate::scanner::exclusions::{exclusion_flags, ExclusionMatcher};
use crate::scanner::process::ProcessRunner;
use crate::utils::paths::find_executable;

pub const CLIENT_NOT_FOUND_MESSAGE: &str = "ClamAV daemon client (clamdscan) not found";
/// Leading text of every unreachable-daemon detail.
pub const UNREACHABLE_MESSAGE: &str = "ClamAV daemon is not reachable";

pub struct DaemonScanner {
    program: PathBuf,
    ping_attempts: u32,
    core: ScanCore,
}

impl DaemonScanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.clamdscan(),
            ping_attempts: config.daemon_ping_attempts.max(1),
            core: ScanCore::new(ProcessRunner::new(config)),
        }
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.core = self.core.with_log_sink(sink);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl BackendScanner for DaemonScanner {
    fn mode(&self) -> BackendMode {
        BackendMode::Daemon
    }

    fn core(&self) -> &ScanCore {
        &self.core
    }

    /// The client must exist and the daemon must answer a ping.
    fn check_available_with(&self, is_cancelled: &dyn Fn() -> bool) -> Availability {
        let Some(program) = find_executable(&self.program) else {
            let error = Error::EngineUnavailable(CLIENT_NOT_FOUND_MESSAGE.to_string());
            return Availability::from_error(error);
        };

        let command = vec![
            program.to_string_lossy().into_owned(),
            "--ping".to_string(),
            self.ping_attempts.to_string(),
        ];
        let runner = self.core.runner();
        let output = match runner.run(&command) {
            Ok(mut handle) => runner.wait_cancellable(&mut handle, is_cancelled),
            Err(e) => return Availability::from_error(Error::DaemonUnreachable(e.to_string())),
        };

        if output.was_cancelled {
            return Availability::unavailable(CHECK_CANCELLED);
        }

        if output.exit_code == 0 {
            return Availability::available(format!("{} (daemon reachable)", program.display()));
        }

        let reason = [output.stderr.trim(), output.stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("ping exited with code {}", output.exit_code));
        Availability::from_error(Error::DaemonUnreachable(reason))
    }

    /// `clamdscan --multiscan --fdpass -i <exclusions> <path>`. The daemon
    /// always recurses.
    fn build_command(&self, target: &ScanTarget) -> Vec<String> {
        let program = find_executable(&self.program).unwrap_or_else(|| self.program.clone());
        let mut command = vec![
            program.to_string_lossy().into_owned(),
            "--multiscan".to_string(),
            "--fdpass".to_string(),
            "-i".to_string(),
        ];
        command.extend(exclusion_flags(&target.exclusions.effective_rules()));
        command.push(target.display_path());
        command
    }

    fn count_hints(&self, target: &ScanTarget, is_cancelled: &dyn Fn() -> bool) -> CountHints {
        let matcher = ExclusionMatcher::from_set(&target.exclusions);
        let hints = precount::count_hints(&target.path, &matcher, is_cancelled);
        log::debug!(
            "Pre-counted {:?} files and {:?} directories under {}",
            hints.files,
            hints.dirs,
            target.display_path()
        );
        hints
    }
}
