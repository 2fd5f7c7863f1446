//! Report assembly.
//!
//! Turns the final aggregation state into the detail, summary, roster and
//! run-info views, then lays them out as sheet-ready tables.

use crate::analysis::AggregateState;
use crate::config::ReportConfig;
use crate::error::ReportAssemblyError;
use crate::models::{
    CompletionRate, DetailRow, KeySource, ModuleStatus, Report, RosterRow, RunInfo, SummaryRow,
    SummaryTotals, UNKNOWN_STUDENT,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Run facts supplied by the caller.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub academy_name: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub root_folder_id: String,
    pub warnings: usize,
}

/// Build the report views.
///
/// Fails when a module references a student absent from the roster.
pub fn assemble(state: &AggregateState, context: RunContext) -> Result<Report, ReportAssemblyError> {
    check_roster(state)?;

    let detail = detail_rows(state);
    let summary = summary_rows(state);
    let totals = totals(state);
    let roster = roster_rows(state);

    Ok(Report {
        info: RunInfo {
            academy_name: context.academy_name,
            generated_by: context.generated_by,
            generated_at: context.generated_at,
            root_folder_id: context.root_folder_id,
            warnings: context.warnings,
            roster_basis: state.basis,
        },
        detail,
        summary,
        totals,
        roster,
    })
}

fn check_roster(state: &AggregateState) -> Result<(), ReportAssemblyError> {
    for tally in &state.modules {
        let stray = tally
            .submitted_students
            .keys()
            .chain(tally.expected_or_detected_students.iter())
            .find(|key| !state.roster.contains(key));

        if let Some(student) = stray {
            return Err(ReportAssemblyError::StudentNotInRoster {
                module: tally.module_name.clone(),
                student: student.clone(),
            });
        }
    }
    Ok(())
}

fn detail_rows(state: &AggregateState) -> Vec<DetailRow> {
    let mut rows = Vec::new();

    for tally in &state.modules {
        for (student, s) in &tally.submitted_students {
            rows.push(DetailRow {
                module_id: tally.module_id.clone(),
                module_name: tally.module_name.clone(),
                student_key: student.clone(),
                last_submitted_at: s.last_submitted_at,
                file_count: s.file_count,
                key_source: s.key_source,
                needs_review: false,
            });
        }

        if tally.unattributed_files > 0 {
            rows.push(DetailRow {
                module_id: tally.module_id.clone(),
                module_name: tally.module_name.clone(),
                student_key: UNKNOWN_STUDENT.to_string(),
                last_submitted_at: tally.unattributed_last_at,
                file_count: tally.unattributed_files,
                key_source: KeySource::Unknown,
                needs_review: true,
            });
        }
    }

    rows
}

fn summary_rows(state: &AggregateState) -> Vec<SummaryRow> {
    state
        .modules
        .iter()
        .map(|tally| {
            let status = if tally.listing_error.is_some() {
                ModuleStatus::ListingError
            } else if tally.file_count > 0 {
                ModuleStatus::WithSubmissions
            } else {
                ModuleStatus::NoSubmissions
            };

            SummaryRow {
                module_id: tally.module_id.clone(),
                module_name: tally.module_name.clone(),
                file_count: tally.file_count,
                submitted_students: tally.submitted_count(),
                roster_size: tally.expected_or_detected_students.len(),
                missing_students: tally.missing_students().len(),
                unattributed_files: tally.unattributed_files,
                completion_rate: tally.completion_rate(),
                status,
            }
        })
        .collect()
}

fn totals(state: &AggregateState) -> SummaryTotals {
    SummaryTotals {
        total_modules: state.modules.len(),
        active_modules: state.modules.iter().filter(|m| m.file_count > 0).count(),
        total_files: state.total_files(),
        total_students: state.roster.len(),
        total_submissions: state.modules.iter().map(|m| m.submitted_count()).sum(),
        unattributed_files: state.modules.iter().map(|m| m.unattributed_files).sum(),
    }
}

fn roster_rows(state: &AggregateState) -> Vec<RosterRow> {
    state
        .roster
        .keys()
        .filter_map(|key| {
            let source = state.roster.source(key)?;
            let (modules_submitted, file_count) = state.student_activity(key);
            Some(RosterRow {
                student_key: key.to_string(),
                modules_submitted,
                file_count,
                source,
            })
        })
        .collect()
}

/// A typed spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    /// Fraction in `0.0..=1.0`, shown as a percentage.
    Percent(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn count(value: usize) -> Self {
        Cell::Number(value as f64)
    }

    fn rate(rate: CompletionRate) -> Self {
        match rate {
            CompletionRate::Ratio(r) => Cell::Percent(r),
            CompletionRate::NotAvailable => Cell::text("N/A"),
        }
    }

    /// Plain-text rendering used by text sinks.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format!("{}", n),
            Cell::Percent(r) => CompletionRate::Ratio(*r).to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// One sheet: a title, column headers and rows of cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sheet {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(title: &str, columns: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// Lay the report out as sheets: detail, summary, roster, run info.
pub fn to_sheets(report: &Report, config: &ReportConfig) -> Vec<Sheet> {
    vec![
        detail_sheet(report, config),
        summary_sheet(report, config),
        roster_sheet(report, config),
        info_sheet(report, config),
    ]
}

fn timestamp(at: Option<DateTime<Utc>>, format: &str) -> Cell {
    match at {
        Some(at) => Cell::text(at.format(format).to_string()),
        None => Cell::Empty,
    }
}

fn detail_sheet(report: &Report, config: &ReportConfig) -> Sheet {
    let mut sheet = Sheet::new(
        &config.detail_title,
        &[
            "Module",
            "Student",
            "Last Submission",
            "Files",
            "Identified By",
            "Review",
        ],
    );

    for row in &report.detail {
        sheet.rows.push(vec![
            Cell::text(&row.module_name),
            Cell::text(&row.student_key),
            timestamp(row.last_submitted_at, &config.timestamp_format),
            Cell::count(row.file_count),
            Cell::text(row.key_source.to_string()),
            if row.needs_review {
                Cell::text("needs review")
            } else {
                Cell::Empty
            },
        ]);
    }

    sheet
}

fn summary_sheet(report: &Report, config: &ReportConfig) -> Sheet {
    let mut sheet = Sheet::new(
        &config.summary_title,
        &[
            "Module",
            "Files",
            "Students Submitted",
            "Roster Size",
            "Missing",
            "Unattributed Files",
            "Completion",
            "Status",
        ],
    );

    for row in &report.summary {
        sheet.rows.push(vec![
            Cell::text(&row.module_name),
            Cell::count(row.file_count),
            Cell::count(row.submitted_students),
            Cell::count(row.roster_size),
            Cell::count(row.missing_students),
            Cell::count(row.unattributed_files),
            Cell::rate(row.completion_rate),
            Cell::text(row.status.to_string()),
        ]);
    }

    let totals = &report.totals;
    let missing: usize = report.summary.iter().map(|r| r.missing_students).sum();
    let overall = CompletionRate::from_counts(
        totals.total_submissions,
        totals.total_students * totals.total_modules,
    );
    sheet.rows.push(vec![
        Cell::text("TOTAL"),
        Cell::count(totals.total_files),
        Cell::count(totals.total_submissions),
        Cell::count(totals.total_students),
        Cell::count(missing),
        Cell::count(totals.unattributed_files),
        Cell::rate(overall),
        Cell::text(format!(
            "{} of {} modules active",
            totals.active_modules, totals.total_modules
        )),
    ]);

    sheet
}

fn roster_sheet(report: &Report, config: &ReportConfig) -> Sheet {
    let mut sheet = Sheet::new(
        &config.roster_title,
        &["Student", "Modules Submitted", "Files", "Source"],
    );

    for row in &report.roster {
        sheet.rows.push(vec![
            Cell::text(&row.student_key),
            Cell::count(row.modules_submitted),
            Cell::count(row.file_count),
            Cell::text(row.source.to_string()),
        ]);
    }

    sheet
}

fn info_sheet(report: &Report, config: &ReportConfig) -> Sheet {
    let info = &report.info;
    let totals = &report.totals;
    let mut sheet = Sheet::new(&config.info_title, &["Field", "Value"]);

    let rows = [
        ("Academy", Cell::text(&info.academy_name)),
        ("Generated by", Cell::text(&info.generated_by)),
        (
            "Generated at",
            timestamp(Some(info.generated_at), &config.timestamp_format),
        ),
        ("Root folder", Cell::text(&info.root_folder_id)),
        ("Total modules", Cell::count(totals.total_modules)),
        ("Active modules", Cell::count(totals.active_modules)),
        ("Total files", Cell::count(totals.total_files)),
        ("Unique students", Cell::count(totals.total_students)),
        ("Unattributed files", Cell::count(totals.unattributed_files)),
        ("Warnings", Cell::count(info.warnings)),
        ("Roster basis", Cell::text(info.roster_basis.to_string())),
    ];

    for (field, value) in rows {
        sheet.rows.push(vec![Cell::text(field), value]);
    }

    sheet
}
