//! User interface components.
//!
//! This module provides:
//! - CLI interface
//! - Report generation (text, CSV, JSON)

pub mod cli;
pub mod report;

pub use cli::Cli;
pub use report::{generate_report, CsvExporter, ReportFormat, TextReporter};
