//! CSV export functionality.
//!
//! Exports one row per detected threat for spreadsheet analysis.

use crate::core::error::{Error, Result};
use crate::core::types::ScanResult;
use std::fs;
use std::path::Path;

const COLUMNS: [&str; 4] = ["File Path", "Threat Name", "Category", "Severity"];

/// CSV exporter for scan results.
pub struct CsvExporter {
    /// Delimiter character
    delimiter: char,
    /// Include header row
    include_header: bool,
}

impl CsvExporter {
    /// Create a new CSV exporter.
    pub fn new() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
        }
    }

    /// Set the delimiter character.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether to include headers.
    pub fn with_header(mut self, include: bool) -> Self {
        self.include_header = include;
        self
    }

    /// Render the threat table. Rows end in CRLF.
    pub fn render(&self, result: &ScanResult) -> String {
        let mut out = String::new();

        if self.include_header {
            self.push_row(&mut out, &COLUMNS);
        }

        for threat in &result.threat_details {
            let severity = threat.severity.to_string();
            self.push_row(
                &mut out,
                &[
                    threat.file_path.as_str(),
                    threat.threat_name.as_str(),
                    threat.category.as_str(),
                    severity.as_str(),
                ],
            );
        }

        out
    }

    /// Export scan results to CSV.
    pub fn export(&self, result: &ScanResult, output_path: &Path) -> Result<()> {
        fs::write(output_path, self.render(result)).map_err(|e| Error::file_write(output_path, e))
    }

    fn push_row(&self, out: &mut String, fields: &[&str]) {
        let delimiter = self.delimiter.to_string();
        let row: Vec<String> = fields.iter().map(|f| self.escape_csv(f)).collect();
        out.push_str(&row.join(&delimiter));
        out.push_str("\r\n");
    }

    /// Escape a CSV field.
    fn escape_csv(&self, field: &str) -> String {
        if field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r')
        {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::parser::{parse, CountHints};

    #[test]
    fn test_escape_csv() {
        let exporter = CsvExporter::new();
        assert_eq!(exporter.escape_csv("simple"), "simple");
        assert_eq!(exporter.escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(exporter.escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(exporter.escape_csv("with\nnewline"), "\"with\nnewline\"");
        assert_eq!(exporter.escape_csv("cr\rhere"), "\"cr\rhere\"");
    }

    #[test]
    fn test_render_rows() {
        let stdout = "/home/u/a,b.exe: Win.Trojan.Agent-1 FOUND\n/tmp/eicar.com: Eicar-Test-Signature FOUND\n";
        let result = parse("/", stdout, "", 1, CountHints::default());

        let csv = CsvExporter::new().render(&result);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], "File Path,Threat Name,Category,Severity");
        assert_eq!(lines[1], "\"/home/u/a,b.exe\",Win.Trojan.Agent-1,Trojan,High");
        assert_eq!(lines[2], "/tmp/eicar.com,Eicar-Test-Signature,Test,Low");
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_exporter_with_options() {
        let result = parse("/", "/x;y: Win.Worm.A FOUND\n", "", 1, CountHints::default());
        let csv = CsvExporter::new().with_delimiter(';').with_header(false).render(&result);
        assert_eq!(csv, "\"/x;y\";Win.Worm.A;Worm;High\r\n");
    }
}
