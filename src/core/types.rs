//! Core type definitions used throughout clamcore.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::paths::{absolutize, expand_home};

/// Severity level of a detected threat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Test signatures and generic/heuristic hits
    Low,
    /// Adware, PUA, spyware, miners (and anything unrecognised)
    Medium,
    /// Trojans, worms, backdoors, exploits, droppers
    High,
    /// Ransomware, rootkits, bootkits
    Critical,
}

impl Severity {
    /// Get string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// Terminal status of one scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Engine exited 0, nothing found
    Clean,
    /// Engine exited 1, threats found
    Infected,
    /// Anything else, including failures before the engine ran
    Error,
    /// Cancellation was observed before the result was trusted
    Cancelled,
}

impl ScanStatus {
    /// Get string representation for log entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "clean",
            ScanStatus::Infected => "infected",
            ScanStatus::Error => "error",
            ScanStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Clean => write!(f, "Clean"),
            ScanStatus::Infected => write!(f, "Infected"),
            ScanStatus::Error => write!(f, "Error"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Lifecycle of one in-flight scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Running,
    Completing,
    Cancelling,
    Terminal(ScanStatus),
}

/// Which engine mode to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Daemon when reachable, standalone otherwise
    Auto,
    /// `clamscan`, loads the database per scan
    Standalone,
    /// `clamdscan`, talks to a running clamd
    Daemon,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Auto => write!(f, "auto"),
            BackendMode::Standalone => write!(f, "standalone"),
            BackendMode::Daemon => write!(f, "daemon"),
        }
    }
}

/// Kind of a user-defined exclusion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionKind {
    File,
    Directory,
    #[serde(alias = "glob")]
    Pattern,
}

impl ExclusionKind {
    /// Parse the `type` field of a stored rule. Unknown values fall back to
    /// a plain pattern.
    pub fn from_setting(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "file" => ExclusionKind::File,
            "directory" | "dir" | "folder" => ExclusionKind::Directory,
            _ => ExclusionKind::Pattern,
        }
    }
}

/// A single exclusion rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pub pattern: String,
    pub kind: ExclusionKind,
    pub enabled: bool,
}

impl ExclusionRule {
    /// Create an enabled rule.
    pub fn new(pattern: impl Into<String>, kind: ExclusionKind) -> Self {
        Self {
            pattern: pattern.into(),
            kind,
            enabled: true,
        }
    }

    /// Whether the pattern names a location (absolute or `~`-relative) rather
    /// than a glob.
    pub fn is_path_prefix(&self) -> bool {
        is_path_prefix(&self.pattern)
    }
}

/// True for absolute and home-relative patterns.
pub fn is_path_prefix(pattern: &str) -> bool {
    pattern.starts_with('/') || pattern.starts_with('~')
}

/// Read-only snapshot of the exclusions that apply to one scan: global rules
/// plus the active profile's `paths` and `patterns` lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    pub rules: Vec<ExclusionRule>,
    #[serde(default)]
    pub profile_paths: Vec<String>,
    #[serde(default)]
    pub profile_patterns: Vec<String>,
}

impl ExclusionSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global rule.
    pub fn with_rule(mut self, rule: ExclusionRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Add a profile-scoped path.
    pub fn with_profile_path(mut self, path: impl Into<String>) -> Self {
        self.profile_paths.push(path.into());
        self
    }

    /// Add a profile-scoped glob pattern.
    pub fn with_profile_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.profile_patterns.push(pattern.into());
        self
    }

    /// Check whether the set holds no rules at all.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.profile_paths.is_empty() && self.profile_patterns.is_empty()
    }

    /// Flatten the set into the enabled rules that actually apply.
    ///
    /// Profile paths are home-expanded and become directory rules when they
    /// name an existing directory, file rules otherwise. Profile patterns
    /// become glob rules.
    pub fn effective_rules(&self) -> Vec<ExclusionRule> {
        let mut rules: Vec<ExclusionRule> =
            self.rules.iter().filter(|r| r.enabled).cloned().collect();

        for path in self.profile_paths.iter().filter(|p| !p.trim().is_empty()) {
            let expanded = expand_home(path.trim());
            let kind = if expanded.is_dir() {
                ExclusionKind::Directory
            } else {
                ExclusionKind::File
            };
            rules.push(ExclusionRule::new(expanded.to_string_lossy(), kind));
        }

        for pattern in self.profile_patterns.iter().filter(|p| !p.trim().is_empty()) {
            rules.push(ExclusionRule::new(pattern.trim(), ExclusionKind::Pattern));
        }

        rules
    }
}

/// Immutable input to a single scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub recursive: bool,
    pub exclusions: ExclusionSet,
}

impl ScanTarget {
    /// Create a recursive target with no exclusions.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            recursive: true,
            exclusions: ExclusionSet::default(),
        }
    }

    /// Set recursion.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the exclusion snapshot.
    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Copy of the target with an absolute path, so location exclusions and
    /// the paths the engine reports line up with it.
    pub fn absolutized(&self) -> Self {
        Self {
            path: absolutize(&self.path),
            ..self.clone()
        }
    }

    /// Display form of the target path.
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// One detected infection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreatDetail {
    pub file_path: String,
    pub threat_name: String,
    pub category: String,
    pub severity: Severity,
}

/// The outcome record of one scan attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub path: String,
    pub raw_stdout: String,
    pub raw_stderr: String,
    pub exit_code: i32,
    pub infected_files: Vec<String>,
    pub scanned_files: u64,
    pub scanned_dirs: u64,
    pub infected_count: u64,
    pub error_message: Option<String>,
    pub threat_details: Vec<ThreatDetail>,
}

impl ScanResult {
    /// Error result for a failure that happened before or around the engine.
    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: ScanStatus::Error,
            path: path.into(),
            raw_stdout: String::new(),
            raw_stderr: String::new(),
            exit_code: -1,
            infected_files: Vec::new(),
            scanned_files: 0,
            scanned_dirs: 0,
            infected_count: 0,
            error_message: Some(message.into()),
            threat_details: Vec::new(),
        }
    }

    /// Cancelled result carrying whatever output the engine produced.
    pub fn cancelled(path: impl Into<String>, stdout: String, stderr: String) -> Self {
        Self {
            status: ScanStatus::Cancelled,
            path: path.into(),
            raw_stdout: stdout,
            raw_stderr: stderr,
            exit_code: -1,
            infected_files: Vec::new(),
            scanned_files: 0,
            scanned_dirs: 0,
            infected_count: 0,
            error_message: None,
            threat_details: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status == ScanStatus::Clean
    }

    pub fn has_threats(&self) -> bool {
        self.status == ScanStatus::Infected
    }

    /// Paths of all detected files, in detection order.
    pub fn infected_paths(&self) -> Vec<PathBuf> {
        self.threat_details
            .iter()
            .map(|t| PathBuf::from(&t.file_path))
            .collect()
    }
}

/// A file that could not be quarantined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of one quarantine batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineOutcome {
    /// Original paths of the files that were moved
    pub quarantined: Vec<PathBuf>,
    pub failed: Vec<QuarantineFailure>,
}

impl QuarantineOutcome {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn fail(&mut self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.failed.push(QuarantineFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}
