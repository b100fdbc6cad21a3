//! Error types and result handling for clamcore.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for clamcore operations.
///
/// Scan-domain failures never leave the scanner as an `Err`: they are folded
/// into an error-status [`ScanResult`](crate::core::types::ScanResult). The
/// variants still exist so the folding can say precisely what went wrong.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Path Errors =====
    #[error("No path specified")]
    EmptyPath,

    #[error("Path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Engine Errors =====
    #[error("{0}")]
    EngineUnavailable(String),

    #[error("ClamAV daemon is not reachable: {0}")]
    DaemonUnreachable(String),

    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    // ===== Scanning Errors =====
    #[error("A scan is already running on this scanner")]
    ScanInProgress,

    // ===== Quarantine Errors =====
    #[error("Failed to quarantine file: {path} - {reason}")]
    QuarantineFailed { path: PathBuf, reason: String },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a permission denied error.
    pub fn permission_denied(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PermissionDenied {
            path: path.into(),
            source,
        }
    }

    /// Create a spawn error.
    pub fn spawn(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawn {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Create a quarantine failure.
    pub fn quarantine_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::QuarantineFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map an I/O error on `path` to the most specific variant.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::FileRead { path, source },
        }
    }

    /// Check if this error is recoverable (a batch can continue past it).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. }
                | Error::PermissionDenied { .. }
                | Error::PathNotFound(_)
                | Error::QuarantineFailed { .. }
        )
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied { .. } => {
                Some("Check file permissions or run the scan with sufficient privileges")
            }
            Error::PathNotFound(_) | Error::EmptyPath => {
                Some("Check that the path exists and is accessible")
            }
            Error::EngineUnavailable(_) => {
                Some("Install ClamAV (clamscan/clamdscan) or set the engine path in the configuration")
            }
            Error::DaemonUnreachable(_) => {
                Some("Start the clamd service or switch the backend to standalone")
            }
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::ScanInProgress => Some("Wait for the running scan to finish or cancel it"),
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::EmptyPath
            | Error::PathNotFound(_)
            | Error::PermissionDenied { .. }
            | Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::DirectoryAccess { .. }
            | Error::Io(_) => ErrorCategory::Io,

            Error::EngineUnavailable(_) | Error::DaemonUnreachable(_) | Error::Spawn { .. } => {
                ErrorCategory::Engine
            }

            Error::ScanInProgress => ErrorCategory::Scanning,

            Error::QuarantineFailed { .. } => ErrorCategory::Quarantine,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::Internal(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Engine,
    Scanning,
    Quarantine,
    Configuration,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Engine => write!(f, "Engine"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Quarantine => write!(f, "Quarantine"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PathNotFound(PathBuf::from("/test/path"));
        assert_eq!(err.to_string(), "Path does not exist: /test/path");

        let err = Error::spawn("clamscan", "No such file or directory");
        assert_eq!(
            err.to_string(),
            "Failed to start clamscan: No such file or directory"
        );
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let err = Error::from_io(
            "/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::PathNotFound(_)));

        let err = Error::from_io(
            "/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(Error::quarantine_failed("/a", "gone").is_recoverable());
        assert!(!Error::ScanInProgress.is_recoverable());
        assert!(Error::DaemonUnreachable("x".into()).suggestion().is_some());
    }
}
