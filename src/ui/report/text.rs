//! Plain-text report generator.

use chrono::Local;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::core::error::{Error, Result};
use crate::core::types::{ScanResult, ScanStatus};

const RULE: &str = "============================================================";

/// Human-readable report of one scan.
pub struct TextReporter {
    /// Append the raw engine output
    include_raw_output: bool,
}

impl TextReporter {
    pub fn new() -> Self {
        Self {
            include_raw_output: false,
        }
    }

    pub fn with_raw_output(mut self, include: bool) -> Self {
        self.include_raw_output = include;
        self
    }

    /// Generate a text report file.
    pub fn generate(&self, result: &ScanResult, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.render(result)).map_err(|e| Error::file_write(output_path, e))
    }

    /// Render the report content.
    pub fn render(&self, result: &ScanResult) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "ClamAV Scan Report");
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "Generated:   {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out, "Path:        {}", result.path);
        let _ = writeln!(out, "Status:      {}", result.status);
        let _ = writeln!(out, "Files:       {}", result.scanned_files);
        let _ = writeln!(out, "Directories: {}", result.scanned_dirs);
        let _ = writeln!(out, "Threats:     {}", result.infected_count);
        if let Some(message) = &result.error_message {
            let _ = writeln!(out, "Error:       {}", message);
        }
        let _ = writeln!(out);

        match result.status {
            ScanStatus::Clean => {
                let _ = writeln!(out, "No threats detected.");
            }
            ScanStatus::Cancelled => {
                let _ = writeln!(out, "The scan was cancelled before it finished.");
            }
            _ => {}
        }

        if !result.threat_details.is_empty() {
            let _ = writeln!(out, "Detected threats");
            let _ = writeln!(out, "{}", "-".repeat(RULE.len()));
            for (i, threat) in result.threat_details.iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {}", i + 1, threat.file_path);
                let _ = writeln!(out, "     Threat:   {}", threat.threat_name);
                let _ = writeln!(out, "     Category: {}", threat.category);
                let _ = writeln!(out, "     Severity: {}", threat.severity);
            }
        } else if result.infected_count > 0 {
            let _ = writeln!(
                out,
                "The engine reported {} infected file(s) without detail lines.",
                result.infected_count
            );
        }

        if self.include_raw_output && !result.raw_stdout.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Engine output");
            let _ = writeln!(out, "{}", "-".repeat(RULE.len()));
            out.push_str(&result.raw_stdout);
            if !result.raw_stdout.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::parser::{parse, CountHints};

    #[test]
    fn test_render_infected() {
        let stdout = "/tmp/eicar.com: Eicar-Test-Signature FOUND\n";
        let result = parse("/tmp", stdout, "", 1, CountHints::new(4, 1));
        let report = TextReporter::new().render(&result);

        assert!(report.contains("Status:      Infected"));
        assert!(report.contains("Threats:     1"));
        assert!(report.contains("  1. /tmp/eicar.com"));
        assert!(report.contains("Severity: Low"));
        assert!(!report.contains("Engine output"));
    }

    #[test]
    fn test_render_clean_with_raw_output() {
        let stdout = "Scanned files: 2\nInfected files: 0\n";
        let result = parse("/srv", stdout, "", 0, CountHints::default());
        let report = TextReporter::new().with_raw_output(true).render(&result);

        assert!(report.contains("No threats detected."));
        assert!(report.ends_with("Infected files: 0\n"));
    }

    #[test]
    fn test_render_error() {
        let result = ScanResult::error("/x", "ClamAV daemon is not reachable");
        let report = TextReporter::new().render(&result);
        assert!(report.contains("Error:       ClamAV daemon is not reachable"));
    }
}
