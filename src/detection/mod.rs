//! Interpretation of engine output.
//!
//! This module provides:
//! - Detection-line and summary parsing into a `ScanResult`
//! - Severity and category classification of signature names

pub mod classifier;
pub mod parser;

pub use classifier::{categorize_threat, classify_severity};
pub use parser::{parse, parse_detection_line, CountHints};
