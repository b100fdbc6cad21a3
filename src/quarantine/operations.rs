//! File operations for quarantine.
//!
//! Provides:
//! - Collision-resistant destination naming
//! - Safe file moving with a cross-filesystem fallback
//! - Owner-only permissions for the quarantine directory and its files

use rand::RngCore;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::error::{Error, Result};

/// Infix placed between the original file name and the random token.
pub const QUARANTINE_SUFFIX: &str = ".quarantined";

/// Random bytes per token (hex-encoded to twice as many characters).
const TOKEN_BYTES: usize = 6;

/// Attempts at drawing a free destination name before giving up.
const MAX_NAME_ATTEMPTS: usize = 16;

fn random_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Quarantined file name for `original`: `<name>.quarantined.<token>`.
pub fn quarantine_name(original: &Path) -> String {
    let name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    format!("{}{}.{}", name, QUARANTINE_SUFFIX, random_token())
}

/// Pick a destination inside `dir` that does not exist yet.
pub fn unique_destination(dir: &Path, original: &Path) -> Result<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(quarantine_name(original));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::quarantine_failed(
        original,
        "could not generate a unique quarantine name",
    ))
}

/// Check that `path` is an existing, readable regular file.
pub fn check_quarantinable(path: &Path) -> std::result::Result<(), String> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err("File no longer exists".to_string());
        }
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err("Permission denied reading file metadata".to_string());
        }
        Err(e) => return Err(format!("Cannot inspect file: {}", e)),
    };

    if !metadata.is_file() {
        return Err("Not a regular file".to_string());
    }

    fs::File::open(path).map(|_| ()).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => "File is not readable (permission denied)".to_string(),
        _ => format!("File is not readable: {}", e),
    })
}

/// Move a file, falling back to copy-then-delete when a rename is not
/// possible (different filesystems).
pub fn safe_move(source: &Path, dest: &Path) -> Result<()> {
    let rename_err = match fs::rename(source, dest) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    match rename_err.kind() {
        ErrorKind::NotFound => return Err(Error::PathNotFound(source.to_path_buf())),
        ErrorKind::PermissionDenied => return Err(Error::permission_denied(source, rename_err)),
        _ => log::debug!(
            "Rename {} -> {} failed ({}), copying instead",
            source.display(),
            dest.display(),
            rename_err
        ),
    }

    fs::copy(source, dest).map_err(|e| Error::file_write(dest, e))?;

    // Verify copy
    let source_size = fs::metadata(source)
        .map_err(|e| Error::file_read(source, e))?
        .len();
    let dest_size = fs::metadata(dest)
        .map_err(|e| Error::file_read(dest, e))?
        .len();

    if source_size != dest_size {
        let _ = fs::remove_file(dest);
        return Err(Error::quarantine_failed(source, "copy verification failed"));
    }

    if let Err(e) = fs::remove_file(source) {
        // Leave exactly one copy behind: the original
        let _ = fs::remove_file(dest);
        return Err(Error::from_io(source, e));
    }

    Ok(())
}

/// Create `dir` if needed and restrict it to its owner.
pub fn prepare_directory(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::DirectoryAccess {
        path: dir.to_path_buf(),
        source: e,
    })?;
    restrict_directory(dir)
}

#[cfg(unix)]
fn restrict_directory(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| Error::DirectoryAccess {
        path: dir.to_path_buf(),
        source: e,
    })
}

#[cfg(not(unix))]
fn restrict_directory(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Make a quarantined file read-only for its owner and inaccessible to others.
#[cfg(unix)]
pub fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o400)).map_err(|e| Error::file_write(path, e))
}

#[cfg(not(unix))]
pub fn restrict_file(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .map_err(|e| Error::file_read(path, e))?
        .permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms).map_err(|e| Error::file_write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_quarantine_name_format() {
        let name = quarantine_name(Path::new("/tmp/evil.exe"));
        let token = name.strip_prefix("evil.exe.quarantined.").unwrap();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(
            quarantine_name(Path::new("a")),
            quarantine_name(Path::new("a"))
        );
    }

    #[test]
    fn test_safe_move() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source.txt");
        let dest = temp_dir.path().join("dest.txt");

        fs::write(&source, b"Content to move").unwrap();
        safe_move(&source, &dest).unwrap();

        assert!(!source.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"Content to move");
    }

    #[test]
    fn test_safe_move_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let err = safe_move(&temp_dir.path().join("gone"), &temp_dir.path().join("x")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn test_check_quarantinable() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f.bin");
        fs::write(&file, b"x").unwrap();

        assert!(check_quarantinable(&file).is_ok());
        assert_eq!(
            check_quarantinable(&temp_dir.path().join("nope")).unwrap_err(),
            "File no longer exists"
        );
        assert_eq!(check_quarantinable(temp_dir.path()).unwrap_err(), "Not a regular file");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let vault = temp_dir.path().join("vault");
        prepare_directory(&vault).unwrap();
        let mode = fs::metadata(&vault).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);

        let file = vault.join("f");
        fs::write(&file, b"x").unwrap();
        restrict_file(&file).unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o400);
    }
}
