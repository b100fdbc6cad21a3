//! Quarantine of infected files.
//!
//! This module handles:
//! - Moving detected files into an owner-only directory
//! - Unique naming so batches never overwrite each other
//! - Per-file failure tracking

pub mod manager;
pub mod operations;

pub use manager::QuarantineManager;
pub use operations::QUARANTINE_SUFFIX;
