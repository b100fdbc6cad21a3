//! Engine output parsing.
//!
//! Both engine modes print one `<path>: <signature> FOUND` line per
//! detection. `clamscan` additionally prints a summary block; `clamdscan`
//! does not report file or directory counts, so callers pass counts they
//! gathered themselves as hints.

use crate::core::types::{ScanResult, ScanStatus, ThreatDetail};
use crate::detection::classifier::{categorize_threat, classify_severity};

const FOUND_MARKER: &str = "FOUND";

/// Counts gathered outside the engine output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountHints {
    pub files: Option<u64>,
    pub dirs: Option<u64>,
}

impl CountHints {
    pub fn new(files: u64, dirs: u64) -> Self {
        Self {
            files: Some(files),
            dirs: Some(dirs),
        }
    }
}

/// Split a detection line into `(file path, threat name)`.
///
/// The path is everything before the last colon, which keeps paths that
/// contain colons intact as long as signature names do not.
pub fn parse_detection_line(line: &str) -> Option<(String, String)> {
    let line = line.trim_end();
    if !line.ends_with(FOUND_MARKER) {
        return None;
    }

    let (path, rest) = line.rsplit_once(':')?;
    let threat = rest
        .trim()
        .strip_suffix(FOUND_MARKER)
        .unwrap_or(rest)
        .trim_end();

    Some((path.to_string(), threat.to_string()))
}

/// Parse `"<label>: <number>"`. Unparsable numbers yield `None`.
fn summary_value(line: &str, label: &str) -> Option<Option<u64>> {
    let rest = line.strip_prefix(label)?;
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim().parse::<u64>().ok())
}

/// Turn engine output and exit code into a [`ScanResult`].
pub fn parse(path: &str, stdout: &str, stderr: &str, exit_code: i32, hints: CountHints) -> ScanResult {
    let mut infected_files = Vec::new();
    let mut threat_details = Vec::new();
    let mut scanned_files = hints.files.unwrap_or(0);
    let mut scanned_dirs = hints.dirs.unwrap_or(0);
    let mut summary_infected: Option<u64> = None;

    for raw in stdout.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((file_path, threat_name)) = parse_detection_line(line) {
            threat_details.push(ThreatDetail {
                category: categorize_threat(&threat_name).to_string(),
                severity: classify_severity(&threat_name),
                file_path: file_path.clone(),
                threat_name,
            });
            infected_files.push(file_path);
            continue;
        }

        if let Some(value) = summary_value(line, "Scanned files") {
            if let Some(n) = value {
                scanned_files = n;
            }
        } else if let Some(value) = summary_value(line, "Scanned directories") {
            if let Some(n) = value {
                scanned_dirs = n;
            }
        } else if let Some(value) = summary_value(line, "Infected files") {
            if value.is_some() {
                summary_infected = value;
            }
        }
    }

    let detected = threat_details.len() as u64;
    let infected_count = match summary_infected {
        Some(n) if n != detected => {
            log::warn!(
                "Engine summary reports {} infected file(s) but {} detection line(s) were parsed",
                n,
                detected
            );
            n
        }
        Some(n) => n,
        None => detected,
    };

    let (status, error_message) = match exit_code {
        0 => (ScanStatus::Clean, None),
        1 => (ScanStatus::Infected, None),
        code => {
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("Scan failed with exit code {}", code)
            } else {
                stderr.to_string()
            };
            (ScanStatus::Error, Some(message))
        }
    };

    log::debug!(
        "Parsed engine output: status={}, files={}, dirs={}, infected={}",
        status,
        scanned_files,
        scanned_dirs,
        infected_count
    );

    ScanResult {
        status,
        path: path.to_string(),
        raw_stdout: stdout.to_string(),
        raw_stderr: stderr.to_string(),
        exit_code,
        infected_files,
        scanned_files,
        scanned_dirs,
        infected_count,
        error_message,
        threat_details,
    }
}
