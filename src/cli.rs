//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// DriveTally - coursework submission tracker for Google Drive
///
/// Lists every module folder under a Drive folder, works out which
/// students submitted files to each module and writes an Excel report.
///
/// Examples:
///   drivetally --folder 1jfaCkTzYh-rsvy2efmLjPjuIMEDGQ7Jv
///   drivetally --folder 1jfaCk... --roster class.txt --output entregas.xlsx
///   drivetally --fixture listing.json --format markdown --output report.md
///   drivetally --folder 1jfaCk... --dry-run
///   drivetally --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Google Drive folder ID whose sub-folders are the modules
    ///
    /// The ID is the part of the folder URL after '/folders/'.
    #[arg(short, long, value_name = "ID", env = "DRIVE_FOLDER_ID")]
    pub folder: Option<String>,

    /// Read the listing from a JSON fixture instead of Google Drive
    ///
    /// Takes precedence over --folder.
    #[arg(long, value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (xlsx, json, markdown)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .drivetally.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Class roster file (one student name per line)
    ///
    /// Without it, completion rates are judged only against students
    /// that appear somewhere in the Drive folder.
    #[arg(short, long, value_name = "FILE")]
    pub roster: Option<PathBuf>,

    /// OAuth access token for the Drive API
    #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// API key for publicly shared folders
    #[arg(long, env = "DRIVE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for each Drive request
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Dry run: list the modules found and exit without writing a report
    #[arg(long)]
    pub dry_run: bool,

    /// Save the collected listing as a JSON fixture
    #[arg(long, value_name = "FILE")]
    pub save_listing: Option<PathBuf>,

    /// Exit with code 2 when the run produced warnings
    #[arg(long)]
    pub strict: bool,

    /// Generate a default .drivetally.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Excel workbook (default)
    #[default]
    Xlsx,
    /// JSON document
    Json,
    /// Markdown tables
    Markdown,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if let Some(ref folder) = self.folder {
            let folder = folder.trim();
            if folder.is_empty() {
                return Err("Folder ID must not be empty".to_string());
            }
            if folder.contains('/') {
                return Err(
                    "Folder ID must be the ID only, not the full URL (the part after '/folders/')"
                        .to_string(),
                );
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref fixture) = self.fixture {
            if !fixture.is_file() {
                return Err(format!("Fixture file does not exist: {}", fixture.display()));
            }
        }

        if let Some(ref roster) = self.roster {
            if !roster.is_file() {
                return Err(format!("Roster file does not exist: {}", roster.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_by_default` is `general.verbose` from the config file;
    /// `--quiet` still wins over it.
    pub fn log_level(&self, verbose_by_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_by_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            folder: Some("1jfaCkTzYh".to_string()),
            fixture: None,
            output: None,
            format: None,
            config: None,
            roster: None,
            access_token: None,
            api_key: None,
            verbose: false,
            quiet: false,
            timeout: None,
            retries: None,
            dry_run: false,
            save_listing: None,
            strict: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_accepts_folder_id() {
        let args = make_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_folder_url() {
        let mut args = make_args();
        args.folder = Some("https://drive.google.com/drive/folders/1ABC".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_fixture() {
        let mut args = make_args();
        args.folder = None;
        args.fixture = Some(PathBuf::from("/definitely/not/here.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_follows_config_verbose() {
        let mut args = make_args();
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "drivetally",
            "--folder",
            "abc123",
            "--format",
            "markdown",
            "--strict",
        ])
        .unwrap();
        assert_eq!(args.folder.as_deref(), Some("abc123"));
        assert_eq!(args.format, Some(OutputFormat::Markdown));
        assert!(args.strict);
    }
}
