//! Report assembly and output sinks.

pub mod assembler;
pub mod generator;
pub mod xlsx;

pub use assembler::{assemble, to_sheets, RunContext, Sheet};
pub use generator::{generate_json_report, generate_markdown_report};

use crate::cli::OutputFormat;
use crate::models::Report;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Receives a finished report and writes it somewhere.
pub trait ReportSink {
    fn write(&self, report: &Report, sheets: &[Sheet], path: &Path) -> Result<()>;
}

/// Excel workbook, one worksheet per sheet.
pub struct XlsxSink;

impl ReportSink for XlsxSink {
    fn write(&self, _report: &Report, sheets: &[Sheet], path: &Path) -> Result<()> {
        let bytes = xlsx::to_xlsx(sheets)?;
        write_atomically(path, &bytes)
    }
}

/// Pretty-printed JSON of the structured report.
pub struct JsonSink;

impl ReportSink for JsonSink {
    fn write(&self, report: &Report, _sheets: &[Sheet], path: &Path) -> Result<()> {
        let content = generate_json_report(report)?;
        write_atomically(path, content.as_bytes())
    }
}

/// Markdown document with one table per sheet.
pub struct MarkdownSink;

impl ReportSink for MarkdownSink {
    fn write(&self, report: &Report, sheets: &[Sheet], path: &Path) -> Result<()> {
        let content = generate_markdown_report(report, sheets);
        write_atomically(path, content.as_bytes())
    }
}

/// Pick the sink for an output format.
pub fn sink_for(format: OutputFormat) -> Box<dyn ReportSink> {
    match format {
        OutputFormat::Xlsx => Box::new(XlsxSink),
        OutputFormat::Json => Box::new(JsonSink),
        OutputFormat::Markdown => Box::new(MarkdownSink),
    }
}

/// Write through a temp file in the target directory, then rename, so a
/// failed run never leaves a half-written report behind.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RosterBasis, RunInfo, SummaryTotals};
    use chrono::Utc;

    fn empty_report() -> Report {
        Report {
            info: RunInfo {
                academy_name: "Academy".to_string(),
                generated_by: "tester".to_string(),
                generated_at: Utc::now(),
                root_folder_id: "root".to_string(),
                warnings: 0,
                roster_basis: RosterBasis::Observed,
            },
            detail: Vec::new(),
            summary: Vec::new(),
            totals: SummaryTotals::default(),
            roster: Vec::new(),
        }
    }

    #[test]
    fn test_write_atomically_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "old").unwrap();

        write_atomically(&path, b"new").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        // Only the report remains, no temp files
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomically_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");
        assert!(write_atomically(&path, b"x").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_sinks_write_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let report = empty_report();
        let sheets = to_sheets(&report, &crate::config::ReportConfig::default());

        for (format, name) in [
            (OutputFormat::Xlsx, "out.xlsx"),
            (OutputFormat::Json, "out.json"),
            (OutputFormat::Markdown, "out.md"),
        ] {
            let path = dir.path().join(name);
            sink_for(format).write(&report, &sheets, &path).unwrap();
            assert!(std::fs::metadata(&path).unwrap().len() > 0);
        }
    }
}
