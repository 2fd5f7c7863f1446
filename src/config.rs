//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.drivetally.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".drivetally.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Google Drive listing settings.
    #[serde(default)]
    pub drive: DriveConfig,

    /// Student resolution settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Academy name shown on the run info sheet.
    #[serde(default = "default_academy_name")]
    pub academy_name: String,

    /// Person the report is generated for.
    #[serde(default)]
    pub generated_by: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            verbose: false,
            academy_name: default_academy_name(),
            generated_by: String::new(),
        }
    }
}

fn default_output() -> String {
    "submission_report.xlsx".to_string()
}

fn default_academy_name() -> String {
    "Academy".to_string()
}

/// Google Drive listing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Folder whose direct sub-folders are the tracked modules.
    #[serde(default)]
    pub root_folder_id: Option<String>,

    /// Base URL of the Drive v3 API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth access token, already issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// API key, for folders shared publicly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Items per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How many folder levels below the root are listed.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            root_folder_id: None,
            api_base_url: default_api_base_url(),
            access_token: None,
            api_key: None,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            page_size: default_page_size(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_max_depth() -> usize {
    3
}

/// Student resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Use owner / last-modifying-user metadata as the first source.
    #[serde(default = "default_true")]
    pub use_owner_metadata: bool,

    /// Owner names that never identify a student (e.g. the instructor uploading on their behalf).
    #[serde(default)]
    pub ignored_owners: Vec<String>,

    /// Filename words that end a student name.
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,

    /// Maximum number of leading filename tokens that form a name.
    #[serde(default = "default_max_name_tokens")]
    pub max_name_tokens: usize,

    /// Minimum number of letters in a filename-derived name.
    #[serde(default = "default_min_name_len")]
    pub min_name_len: usize,

    /// File extensions counted as submissions. Empty accepts everything.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Use per-student sub-folder names inside modules.
    #[serde(default)]
    pub student_folders: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_owner_metadata: true,
            ignored_owners: Vec::new(),
            stop_words: default_stop_words(),
            max_name_tokens: default_max_name_tokens(),
            min_name_len: default_min_name_len(),
            extensions: default_extensions(),
            student_folders: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stop_words() -> Vec<String> {
    vec![
        "tarea", "entrega", "ejercicio", "trabajo", "actividad", "modulo", "módulo", "final",
        "img", "image", "foto", "photo", "scan", "copia", "copy", "homework", "assignment",
        "submission",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_name_tokens() -> usize {
    2
}

fn default_min_name_len() -> usize {
    3
}

fn default_extensions() -> Vec<String> {
    vec![
        "jpg", "jpeg", "png", "gif", "bmp", "heic", "pdf", "doc", "docx", "txt",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Class roster, one student name per line.
    #[serde(default)]
    pub roster_file: Option<PathBuf>,

    /// Title of the per-student detail sheet.
    #[serde(default = "default_detail_title")]
    pub detail_title: String,

    /// Title of the per-module summary sheet.
    #[serde(default = "default_summary_title")]
    pub summary_title: String,

    /// Title of the student roster sheet.
    #[serde(default = "default_roster_title")]
    pub roster_title: String,

    /// Title of the run info sheet.
    #[serde(default = "default_info_title")]
    pub info_title: String,

    /// `chrono` format for timestamps in the report.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            roster_file: None,
            detail_title: default_detail_title(),
            summary_title: default_summary_title(),
            roster_title: default_roster_title(),
            info_title: default_info_title(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_detail_title() -> String {
    "Submission Detail".to_string()
}

fn default_summary_title() -> String {
    "Executive Summary".to_string()
}

fn default_roster_title() -> String {
    "Student Roster".to_string()
}

fn default_info_title() -> String {
    "Run Info".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref folder) = args.folder {
            self.drive.root_folder_id = Some(folder.clone());
        }
        if let Some(ref token) = args.access_token {
            self.drive.access_token = Some(token.clone());
        }
        if let Some(ref key) = args.api_key {
            self.drive.api_key = Some(key.clone());
        }
        if let Some(timeout) = args.timeout {
            self.drive.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.drive.retries = retries;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref roster) = args.roster {
            self.report.roster_file = Some(roster.clone());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::make_args;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.output, "submission_report.xlsx");
        assert_eq!(config.drive.retries, 3);
        assert_eq!(config.resolver.max_name_tokens, 2);
        assert!(config.resolver.extensions.contains(&"pdf".to_string()));
        assert!(config.report.roster_file.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "entregas.xlsx"
format = "json"
academy_name = "École Jean"

[drive]
root_folder_id = "1abcDEF"
retries = 5

[resolver]
ignored_owners = ["Jean Fraisse"]
extensions = []

[report]
roster_file = "class.txt"
summary_title = "Resumen Ejecutivo"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "entregas.xlsx");
        assert_eq!(config.general.format, OutputFormat::Json);
        assert_eq!(config.general.academy_name, "École Jean");
        assert_eq!(config.drive.root_folder_id.as_deref(), Some("1abcDEF"));
        assert_eq!(config.drive.retries, 5);
        assert_eq!(config.drive.page_size, 100);
        assert_eq!(config.resolver.ignored_owners, vec!["Jean Fraisse"]);
        assert!(config.resolver.extensions.is_empty());
        assert_eq!(config.report.roster_file, Some(PathBuf::from("class.txt")));
        assert_eq!(config.report.summary_title, "Resumen Ejecutivo");
        assert_eq!(config.report.detail_title, "Submission Detail");
    }

    #[test]
    fn test_merge_with_args_overrides() {
        let mut config = Config::default();
        let mut args = make_args();
        args.folder = Some("folder-from-cli".to_string());
        args.retries = Some(7);
        args.format = Some(OutputFormat::Markdown);

        config.merge_with_args(&args);

        assert_eq!(config.drive.root_folder_id.as_deref(), Some("folder-from-cli"));
        assert_eq!(config.drive.retries, 7);
        assert_eq!(config.general.format, OutputFormat::Markdown);
        // Not given on the CLI, so the config value stays
        assert_eq!(config.drive.timeout_seconds, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[drive]\nmax_depth = 1\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.drive.max_depth, 1);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[drive]"));
        assert!(toml_str.contains("[resolver]"));
        assert!(toml_str.contains("[report]"));
    }
}
