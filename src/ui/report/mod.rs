//! Report generation for scan results.
//!
//! This module provides export functionality in multiple formats:
//! - Plain-text reports
//! - CSV spreadsheets
//! - JSON export

pub mod csv;
pub mod text;

use crate::core::error::{Error, Result};
use crate::core::types::ScanResult;
use std::path::Path;

pub use csv::CsvExporter;
pub use text::TextReporter;

/// Report format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Csv,
    Json,
}

/// Generate a report from scan results.
pub fn generate_report(result: &ScanResult, format: ReportFormat, output_path: &Path) -> Result<()> {
    match format {
        ReportFormat::Text => TextReporter::new().generate(result, output_path),
        ReportFormat::Csv => CsvExporter::new().export(result, output_path),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(result)?;
            std::fs::write(output_path, json).map_err(|e| Error::file_write(output_path, e))?;
            Ok(())
        }
    }
}
