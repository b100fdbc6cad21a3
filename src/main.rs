//! clamcore: run ClamAV scans from the command line.
//!
//! This is the main entry point for the CLI application.

use clamcore::core::config::Config;
use clamcore::core::error::Result;
use clamcore::core::settings::JsonSettings;
use clamcore::core::types::{
    BackendMode, ExclusionKind, ExclusionRule, ExclusionSet, QuarantineOutcome, ScanResult, ScanStatus,
    ScanTarget,
};
use clamcore::history::FileLogStore;
use clamcore::quarantine::QuarantineManager;
use clamcore::scanner::ScanCoordinator;
use clamcore::ui::cli::{Cli, Commands};
use clamcore::ui::report::{generate_report, ReportFormat};
use clamcore::utils::logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_CLEAN: u8 = 0;
const EXIT_INFECTED: u8 = 1;
const EXIT_ERROR: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse_args();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    config.validate()?;

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config)?;

    log::debug!("clamcore v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Scan {
            path,
            backend,
            no_recursive,
            exclude,
            exclude_dir,
            quarantine,
            report,
            report_format,
        } => {
            let options = ScanOptions {
                backend: backend.map(BackendMode::from),
                recursive: !no_recursive,
                exclude,
                exclude_dir,
                quarantine,
                report: report.map(|path| (path, report_format)),
            };
            run_scan(config, path, options).await
        }
        Commands::Quarantine { files, dir } => Ok(run_quarantine(&config, &files, dir.as_deref())),
        Commands::Check => Ok(run_check(&config)),
    }
}

struct ScanOptions {
    backend: Option<BackendMode>,
    recursive: bool,
    exclude: Vec<String>,
    exclude_dir: Vec<String>,
    quarantine: bool,
    report: Option<(PathBuf, ReportFormat)>,
}

/// Global exclusions from the settings file plus the command-line ones.
fn build_exclusions(options: &ScanOptions) -> ExclusionSet {
    let settings_path = Config::default_config_path().with_file_name("settings.json");
    let settings = JsonSettings::load_or_default(&settings_path);
    let mut exclusions = ExclusionSet::from_settings(&settings);

    for pattern in &options.exclude {
        exclusions = exclusions.with_rule(ExclusionRule::new(pattern.as_str(), ExclusionKind::Pattern));
    }
    for pattern in &options.exclude_dir {
        exclusions = exclusions.with_rule(ExclusionRule::new(pattern.as_str(), ExclusionKind::Directory));
    }
    exclusions
}

async fn run_scan(mut config: Config, path: PathBuf, options: ScanOptions) -> Result<u8> {
    if let Some(backend) = options.backend {
        config.engine.backend = backend;
    }

    let coordinator = match FileLogStore::from_config(&config) {
        Ok(store) => ScanCoordinator::with_log_sink(&config, Arc::new(store)),
        Err(e) => {
            log::warn!("Scan history disabled: {}", e);
            ScanCoordinator::new(&config)
        }
    };

    let target = ScanTarget::new(path)
        .with_recursive(options.recursive)
        .with_exclusions(build_exclusions(&options));

    let result = coordinator.scan(target).await?;
    print_result(&result);

    if let Some((report_path, format)) = &options.report {
        generate_report(&result, *format, report_path)?;
        println!("Report written to {}", report_path.display());
    }

    if options.quarantine && !result.threat_details.is_empty() {
        let outcome = coordinator.quarantine(&result, None);
        print_quarantine(&outcome, coordinator.quarantine_manager().default_dir());
    }

    Ok(exit_code_for(result.status))
}

fn exit_code_for(status: ScanStatus) -> u8 {
    match status {
        ScanStatus::Clean => EXIT_CLEAN,
        ScanStatus::Infected => EXIT_INFECTED,
        ScanStatus::Error => EXIT_ERROR,
        ScanStatus::Cancelled => EXIT_CANCELLED,
    }
}

fn print_result(result: &ScanResult) {
    println!();
    println!("=== Scan Complete ===");
    println!("Path:            {}", result.path);
    println!("Status:          {}", result.status);
    println!("Files Scanned:   {}", result.scanned_files);
    println!("Directories:     {}", result.scanned_dirs);
    println!("Threats Found:   {}", result.infected_count);
    if let Some(message) = &result.error_message {
        println!("Error:           {}", message);
    }

    for threat in &result.threat_details {
        println!(
            "  [{}] {} - {} ({})",
            threat.severity, threat.file_path, threat.threat_name, threat.category
        );
    }
}

fn print_quarantine(outcome: &QuarantineOutcome, dir: &Path) {
    println!();
    println!(
        "Quarantined {} file(s) into {}",
        outcome.quarantined.len(),
        dir.display()
    );
    for failure in &outcome.failed {
        println!("  FAILED {}: {}", failure.path.display(), failure.reason);
    }
}

fn run_quarantine(config: &Config, files: &[PathBuf], dir: Option<&Path>) -> u8 {
    let manager = QuarantineManager::from_config(&config.quarantine);
    let outcome = manager.quarantine(files, dir);
    print_quarantine(&outcome, dir.unwrap_or(manager.default_dir()));

    if outcome.is_complete_success() {
        EXIT_CLEAN
    } else {
        EXIT_ERROR
    }
}

fn run_check(config: &Config) -> u8 {
    let coordinator = ScanCoordinator::new(config);
    let mut any_available = false;

    for (mode, availability) in coordinator.check_backends() {
        let state = if availability.available {
            any_available = true;
            "available"
        } else {
            "unavailable"
        };
        println!("{:<11} {:<12} {}", mode.to_string(), state, availability.detail);
    }

    if any_available {
        EXIT_CLEAN
    } else {
        EXIT_ERROR
    }
}
