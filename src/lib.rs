//! clamcore: the scan-execution core of a ClamAV desktop front-end
//!
//! This crate drives the external `clamscan`/`clamdscan` engines, supervises
//! and cancels their processes, parses and classifies their output, applies
//! exclusion rules, and moves infected files into quarantine.

pub mod core;
pub mod detection;
pub mod history;
pub mod quarantine;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
pub use crate::scanner::{BackendScanner, ScanCoordinator};
