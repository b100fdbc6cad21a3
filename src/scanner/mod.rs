//! Engine-driven scanning.
//!
//! This module provides:
//! - Exclusion matching and engine exclude flags
//! - Supervision of the engine process with cooperative cancellation
//! - The standalone and daemon backends over one shared pipeline
//! - Hand-off of background results to the caller's context
//! - The `ScanCoordinator` façade

pub mod backend;
pub mod coordinator;
pub mod dispatch;
pub mod exclusions;
pub mod process;

pub use backend::{scan_async, Availability, BackendScanner, DaemonScanner, StandaloneScanner};
pub use coordinator::{AvailabilityCache, ScanCoordinator};
pub use dispatch::{ContextHandle, MainContext};
pub use exclusions::{exclusion_flags, glob_to_regex, is_excluded, ExclusionMatcher};
pub use process::{ProcessHandle, ProcessOutput, ProcessRunner};
