//! Standalone engine backend (`clamscan`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Availability, BackendScanner, ScanCore, CHECK_CANCELLED};
use crate::core::config::EngineConfig;
use crate::core::error::Error;
use crate::core::types::{BackendMode, ScanTarget};
use crate::history::LogSink;
use crate::scanner::exclusions::exclusion_flags;
use crate::scanner::process::ProcessRunner;
use crate::utils::paths::find_executable;

pub const NOT_FOUND_MESSAGE: &str = "ClamAV scanner (clamscan) not found";

/// Scans by running `clamscan` directly. Loads signatures on every run.
pub struct StandaloneScanner {
    program: PathBuf,
    core: ScanCore,
}

impl StandaloneScanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.clamscan(),
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

    fn resolved_program(&self) -> String {
        find_executable(&self.program)
            .unwrap_or_else(|| self.program.clone())
            .to_string_lossy()
            .into_owned()
    }
}

impl BackendScanner for StandaloneScanner {
    fn mode(&self) -> BackendMode {
        BackendMode::Standalone
    }

    fn core(&self) -> &ScanCore {
        &self.core
    }

    /// `clamscan --version` must succeed.
    fn check_available_with(&self, is_cancelled: &dyn Fn() -> bool) -> Availability {
        let Some(program) = find_executable(&self.program) else {
            return Availability::from_error(Error::EngineUnavailable(NOT_FOUND_MESSAGE.to_string()));
        };

        let command = vec![program.to_string_lossy().into_owned(), "--version".to_string()];
        let runner = self.core.runner();
        let output = match runner.run(&command) {
            Ok(mut handle) => runner.wait_cancellable(&mut handle, is_cancelled),
            Err(e) => return Availability::from_error(e),
        };

        if output.was_cancelled {
            return Availability::unavailable(CHECK_CANCELLED);
        }

        if output.exit_code != 0 {
            return Availability::from_error(Error::EngineUnavailable(format!(
                "{} failed to report its version (exit code {})",
                program.display(),
                output.exit_code
            )));
        }

        let version = output.stdout.trim();
        if version.is_empty() {
            Availability::available(program.to_string_lossy())
        } else {
            Availability::available(version)
        }
    }

    /// `clamscan [-r] -i <exclusions> <path>`. Recursion only applies to
    /// directory targets.
    fn build_command(&self, target: &ScanTarget) -> Vec<String> {
        let mut command = vec![self.resolved_program()];
        if target.recursive && target.path.is_dir() {
            command.push("-r".to_string());
        }
        command.push("-i".to_string());
        command.extend(exclusion_flags(&target.exclusions.effective_rules()));
        command.push(target.display_path());
        command
    }
}
