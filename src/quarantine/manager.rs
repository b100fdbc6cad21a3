//! Quarantine manager.
//!
//! Moves infected files into an owner-only directory under unique names.
//! Each file is handled on its own so one failure never stops the batch.

use std::path::{Path, PathBuf};

use super::operations::{check_quarantinable, prepare_directory, restrict_file, safe_move, unique_destination};
use crate::core::config::QuarantineConfig;
use crate::core::types::{QuarantineOutcome, ScanResult};

/// Relocates infected files into a quarantine directory.
#[derive(Debug, Clone)]
pub struct QuarantineManager {
    /// Directory used when the caller does not name one
    default_dir: PathBuf,
}

impl QuarantineManager {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    pub fn from_config(config: &QuarantineConfig) -> Self {
        Self::new(config.quarantine_dir())
    }

    pub fn default_dir(&self) -> &Path {
        &self.default_dir
    }

    /// Quarantine `paths` into `dir`, or the default directory.
    ///
    /// If the directory cannot be prepared every path is reported as failed
    /// and nothing is moved.
    pub fn quarantine<P: AsRef<Path>>(&self, paths: &[P], dir: Option<&Path>) -> QuarantineOutcome {
        let dir = dir.unwrap_or(&self.default_dir);
        let mut outcome = QuarantineOutcome::default();

        if let Err(e) = prepare_directory(dir) {
            log::error!("Cannot prepare quarantine directory {}: {}", dir.display(), e);
            let reason = format!("Could not create quarantine directory {}: {}", dir.display(), e);
            for path in paths {
                outcome.fail(path.as_ref(), reason.clone());
            }
            return outcome;
        }

        for path in paths {
            let path = path.as_ref();
            match self.quarantine_file(path, dir) {
                Ok(dest) => {
                    log::info!("Quarantined {} -> {}", path.display(), dest.display());
                    outcome.quarantined.push(path.to_path_buf());
                }
                Err(reason) => {
                    log::warn!("Failed to quarantine {}: {}", path.display(), reason);
                    outcome.fail(path, reason);
                }
            }
        }

        outcome
    }

    /// Quarantine every file a scan reported as infected.
    pub fn quarantine_result(&self, result: &ScanResult, dir: Option<&Path>) -> QuarantineOutcome {
        let paths = result.infected_paths();
        self.quarantine(paths.as_slice(), dir)
    }

    fn quarantine_file(&self, path: &Path, dir: &Path) -> Result<PathBuf, String> {
        check_quarantinable(path)?;

        let dest = unique_destination(dir, path).map_err(|e| e.to_string())?;
        safe_move(path, &dest).map_err(|e| format!("Failed to move into quarantine: {}", e))?;

        // The file already left its original location
        if let Err(e) = restrict_file(&dest) {
            log::warn!("Could not restrict permissions on {}: {}", dest.display(), e);
        }

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ScanStatus;
    use crate::detection::parser::{parse, CountHints};
    use std::fs;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut names: Vec<PathBuf> = fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_same_base_names_do_not_collide() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(a.join("payload.exe"), b"first").unwrap();
        fs::write(b.join("payload.exe"), b"second").unwrap();

        let vault = temp_dir.path().join("vault");
        let manager = QuarantineManager::new(&vault);
        let outcome = manager.quarantine(&[a.join("payload.exe"), b.join("payload.exe")], None);

        assert!(outcome.is_complete_success());
        assert_eq!(outcome.quarantined.len(), 2);

        let stored = entries(&vault);
        assert_eq!(stored.len(), 2);
        let mut contents: Vec<Vec<u8>> = stored.iter().map(|p| fs::read(p).unwrap()).collect();
        contents.sort();
        assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);
        for path in &stored {
            let name = path.file_name().unwrap().to_string_lossy();
            assert!(name.starts_with("payload.exe.quarantined."));
        }
    }

    #[test]
    fn test_partial_failure_continues() {
        let temp_dir = TempDir::new().unwrap();
        let present = temp_dir.path().join("bad.bin");
        fs::write(&present, b"x").unwrap();
        let missing = temp_dir.path().join("already-gone.bin");

        let vault = temp_dir.path().join("q");
        let outcome = QuarantineManager::new("/unused").quarantine(&[&missing, &present], Some(&vault));

        assert_eq!(outcome.quarantined, vec![present.clone()]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].path, missing);
        assert_eq!(outcome.failed[0].reason, "File no longer exists");
        assert!(!present.exists());
        assert_eq!(entries(&vault).len(), 1);
    }

    #[test]
    fn test_directory_failure_fails_everything() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, b"file in the way").unwrap();
        let victim = temp_dir.path().join("v.bin");
        fs::write(&victim, b"x").unwrap();

        let outcome = QuarantineManager::new(blocker.join("vault")).quarantine(&[&victim], None);
        assert!(outcome.quarantined.is_empty());
        assert_eq!(outcome.failed.len(), 1);
        assert!(outcome.failed[0].reason.starts_with("Could not create quarantine directory"));
        assert!(victim.exists());
    }

    #[test]
    fn test_quarantine_from_scan_result() {
        let temp_dir = TempDir::new().unwrap();
        let infected = temp_dir.path().join("eicar.com");
        fs::write(&infected, b"X5O!P%@AP").unwrap();

        let stdout = format!("{}: Eicar-Test-Signature FOUND\n", infected.display());
        let result = parse(&temp_dir.path().to_string_lossy(), &stdout, "", 1, CountHints::default());
        assert_eq!(result.status, ScanStatus::Infected);

        let vault = temp_dir.path().join("vault");
        let outcome = QuarantineManager::new(&vault).quarantine_result(&result, None);
        assert_eq!(outcome.quarantined, vec![infected.clone()]);
        assert!(!infected.exists());
    }
}
