//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::core::types::BackendMode;
use crate::ui::report::ReportFormat;

/// clamcore: run ClamAV scans, classify detections and quarantine threats
#[derive(Parser, Debug)]
#[command(name = "clamcore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this configuration file instead of the default one
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Engine backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    /// Daemon when reachable, standalone otherwise
    Auto,
    /// clamscan
    Standalone,
    /// clamdscan
    Daemon,
}

impl From<BackendArg> for BackendMode {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendMode::Auto,
            BackendArg::Standalone => BackendMode::Standalone,
            BackendArg::Daemon => BackendMode::Daemon,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a file or directory
    Scan {
        /// Path to scan
        path: PathBuf,

        /// Engine backend (defaults to the configured one)
        #[arg(short, long)]
        backend: Option<BackendArg>,

        /// Do not descend into subdirectories
        #[arg(long)]
        no_recursive: bool,

        /// Skip files matching this glob (repeatable)
        #[arg(long = "exclude", value_name = "GLOB")]
        exclude: Vec<String>,

        /// Skip directories matching this glob or path (repeatable)
        #[arg(long = "exclude-dir", value_name = "GLOB")]
        exclude_dir: Vec<String>,

        /// Quarantine detected files after the scan
        #[arg(short, long)]
        quarantine: bool,

        /// Write a report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        report_format: ReportFormat,
    },

    /// Move files into quarantine
    Quarantine {
        /// Files to quarantine
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Quarantine directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show which engine backends are available
    Check,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from([
            "clamcore",
            "scan",
            "/srv",
            "--backend",
            "daemon",
            "--exclude",
            "*.log",
            "--exclude-dir",
            "node_modules",
            "--exclude-dir",
            "/srv/cache",
            "--report",
            "out.csv",
            "--report-format",
            "csv",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan {
                path,
                backend,
                no_recursive,
                exclude,
                exclude_dir,
                report_format,
                ..
            } => {
                assert_eq!(path, PathBuf::from("/srv"));
                assert_eq!(backend, Some(BackendArg::Daemon));
                assert!(!no_recursive);
                assert_eq!(exclude, vec!["*.log"]);
                assert_eq!(exclude_dir, vec!["node_modules", "/srv/cache"]);
                assert_eq!(report_format, ReportFormat::Csv);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_quarantine_requires_files() {
        assert!(Cli::try_parse_from(["clamcore", "quarantine"]).is_err());
        let cli = Cli::try_parse_from(["clamcore", "-v", "quarantine", "a", "b", "--dir", "/q"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Quarantine { ref files, .. } if files.len() == 2));
    }
}
