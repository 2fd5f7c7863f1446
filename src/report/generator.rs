//! Markdown and JSON report generation.
//!
//! Text renderings of the same report the workbook holds. Markdown lays
//! each sheet out as a table; JSON serializes the structured report.

use super::assembler::Sheet;
use crate::models::Report;
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, sheets: &[Sheet]) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!(
        "# Submission Report: {}\n\n",
        escape_cell(&report.info.academy_name)
    ));

    output.push_str(&generate_overview_section(report));
    output.push_str(&generate_table_of_contents(sheets));

    for sheet in sheets {
        output.push_str(&generate_sheet_section(sheet));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the short overview at the top.
fn generate_overview_section(report: &Report) -> String {
    let info = &report.info;
    let totals = &report.totals;
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {} by {}\n",
        info.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        info.generated_by
    ));
    section.push_str(&format!("- **Root folder:** `{}`\n", info.root_folder_id));
    section.push_str(&format!(
        "- **Modules:** {} ({} active)\n",
        totals.total_modules, totals.active_modules
    ));
    section.push_str(&format!("- **Files:** {}\n", totals.total_files));
    section.push_str(&format!("- **Students:** {}\n", totals.total_students));
    if totals.unattributed_files > 0 {
        section.push_str(&format!(
            "- **Files needing review:** {}\n",
            totals.unattributed_files
        ));
    }
    if info.warnings > 0 {
        section.push_str(&format!("- **Warnings:** {}\n", info.warnings));
    }
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(sheets: &[Sheet]) -> String {
    let mut toc = String::new();

    toc.push_str("## Contents\n\n");
    for sheet in sheets {
        toc.push_str(&format!("- [{}](#{})\n", sheet.title, anchor(&sheet.title)));
    }
    toc.push('\n');

    toc
}

/// Generate one table per sheet.
fn generate_sheet_section(sheet: &Sheet) -> String {
    let mut section = String::new();

    section.push_str(&format!("## {}\n\n", sheet.title));

    if sheet.rows.is_empty() {
        section.push_str("*No rows.*\n\n");
        return section;
    }

    let header: Vec<String> = sheet.columns.iter().map(|c| escape_cell(c)).collect();
    section.push_str(&format!("| {} |\n", header.join(" | ")));
    section.push_str(&format!("|{}\n", ":---|".repeat(sheet.columns.len())));

    for row in &sheet.rows {
        let cells: Vec<String> = row.iter().map(|c| escape_cell(&c.display())).collect();
        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by drivetally v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
