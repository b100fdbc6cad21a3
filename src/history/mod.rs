//! Scan history.
//!
//! Every finished scan, including failed and cancelled ones, is turned into
//! a [`LogEntry`] and handed to a [`LogSink`].

pub mod store;

pub use store::{FileLogStore, MemoryLogStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::types::{ScanResult, ScanStatus};

/// Operation kind recorded for scans.
pub const SCAN_KIND: &str = "scan";

/// Receiver of history entries.
pub trait LogSink: Send + Sync {
    fn save_log(&self, entry: &LogEntry) -> Result<()>;
}

/// One persisted history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub status: String,
    pub summary: String,
    pub details: String,
    pub path: String,
    pub duration_secs: f64,
}

impl LogEntry {
    /// Build the history record for a finished scan.
    pub fn from_scan(result: &ScanResult, duration: Duration) -> Self {
        let summary = match result.status {
            ScanStatus::Clean => format!(
                "Clean scan of {} ({} files, {} directories)",
                result.path, result.scanned_files, result.scanned_dirs
            ),
            ScanStatus::Infected => format!(
                "Found {} threat(s) in {}",
                result.infected_count, result.path
            ),
            ScanStatus::Error => format!("Scan of {} failed", result.path),
            ScanStatus::Cancelled => format!("Scan of {} cancelled", result.path),
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: SCAN_KIND.to_string(),
            status: result.status.as_str().to_string(),
            summary,
            details: details_for(result),
            path: result.path.clone(),
            duration_secs: duration.as_secs_f64(),
        }
    }
}

fn details_for(result: &ScanResult) -> String {
    match result.status {
        ScanStatus::Error => {
            let mut details = format!(
                "Error: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            );
            let stderr = result.raw_stderr.trim();
            if !stderr.is_empty() {
                details.push_str("\n\n");
                details.push_str(stderr);
            }
            details
        }
        ScanStatus::Infected if !result.threat_details.is_empty() => {
            let mut details = String::from("Threats:\n");
            for threat in &result.threat_details {
                details.push_str(&format!(
                    "  {} - {} [{} / {}]\n",
                    threat.file_path, threat.threat_name, threat.category, threat.severity
                ));
            }
            if !result.raw_stdout.is_empty() {
                details.push('\n');
                details.push_str(&result.raw_stdout);
            }
            details
        }
        _ => result.raw_stdout.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::parser::{parse, CountHints};

    #[test]
    fn test_entry_for_infected_scan() {
        let stdout = "/srv/x.exe: Win.Trojan.Agent-1 FOUND\n";
        let result = parse("/srv", stdout, "", 1, CountHints::default());
        let entry = LogEntry::from_scan(&result, Duration::from_millis(1500));

        assert_eq!(entry.kind, "scan");
        assert_eq!(entry.status, "infected");
        assert_eq!(entry.summary, "Found 1 threat(s) in /srv");
        assert!(entry.details.contains("/srv/x.exe - Win.Trojan.Agent-1 [Trojan / High]"));
        assert_eq!(entry.path, "/srv");
        assert!((entry.duration_secs - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_entry_for_error_and_cancel() {
        let result = ScanResult::error("/nope", "Path does not exist: /nope");
        let entry = LogEntry::from_scan(&result, Duration::ZERO);
        assert_eq!(entry.status, "error");
        assert_eq!(entry.details, "Error: Path does not exist: /nope");

        let result = ScanResult::cancelled("/d", "partial".to_string(), String::new());
        let entry = LogEntry::from_scan(&result, Duration::ZERO);
        assert_eq!(entry.status, "cancelled");
        assert_eq!(entry.summary, "Scan of /d cancelled");
        assert_eq!(entry.details, "partial");
    }
}
