//! Data models for the submission tracker.
//!
//! This module contains the records that flow through the pipeline:
//! raw listing entries as the listing source yields them, the normalized
//! and resolved forms, and the views that make up a finished report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Student key used when no heuristic recognizes a student.
pub const UNKNOWN_STUDENT: &str = "UNKNOWN";

/// A file or folder exactly as the listing source reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Remote identifier.
    pub id: String,
    /// Display name; may be missing in malformed listings.
    #[serde(default)]
    pub name: Option<String>,
    /// Identifier of the containing folder.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Whether the entry is a folder.
    #[serde(default)]
    pub is_folder: bool,
    /// Size in bytes, when the remote side knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modification time as an RFC 3339 string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    /// Uploader or owner name, if the remote side exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_hint: Option<String>,
    /// MIME type reported by the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl RawEntry {
    /// Creates a folder entry.
    #[cfg(test)]
    pub fn folder(id: &str, name: &str, parent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            parent_id: Some(parent_id.to_string()),
            is_folder: true,
            size: None,
            modified_at: None,
            owner_hint: None,
            mime_type: None,
        }
    }

    /// Creates a file entry with no owner metadata.
    #[cfg(test)]
    pub fn file(id: &str, name: &str, parent_id: &str) -> Self {
        Self {
            is_folder: false,
            ..Self::folder(id, name, parent_id)
        }
    }
}

/// A listing entry that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEntry {
    pub id: String,
    /// Trimmed, never empty.
    pub name: String,
    pub parent_id: String,
    pub is_folder: bool,
    pub modified_at: Option<DateTime<Utc>>,
    /// Trimmed owner hint; `None` when absent or blank.
    pub owner: Option<String>,
}

/// Which heuristic produced a student key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// Owner or last-modifying-user metadata.
    Owner,
    /// Name of a per-student sub-folder inside the module.
    Folder,
    /// An e-mail address embedded in the filename.
    Email,
    /// Leading name tokens of the filename.
    FileName,
    /// Nothing recognized.
    Unknown,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Owner => write!(f, "owner"),
            KeySource::Folder => write!(f, "folder"),
            KeySource::Email => write!(f, "e-mail"),
            KeySource::FileName => write!(f, "filename"),
            KeySource::Unknown => write!(f, "unknown"),
        }
    }
}

/// A module folder directly under the tracked root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSeed {
    pub module_id: String,
    pub module_name: String,
}

/// One file attributed to a (module, student) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSubmission {
    pub module_id: String,
    pub module_name: String,
    pub student_key: String,
    pub file_name: String,
    pub submitted_at: Option<DateTime<Utc>>,
    pub key_source: KeySource,
    /// Set when the student could not be recognized.
    pub needs_review: bool,
}

/// Whether the completion denominator comes from a class list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterBasis {
    /// Only students seen in the Drive listing.
    Observed,
    /// A class roster merged with the students seen in the listing.
    ClassList,
}

impl fmt::Display for RosterBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterBasis::Observed => write!(
                f,
                "Observed students only (students with no files anywhere are not counted)"
            ),
            RosterBasis::ClassList => write!(f, "Class roster merged with observed students"),
        }
    }
}

/// Where a roster entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    Observed,
    ClassList,
    Both,
}

impl fmt::Display for RosterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterSource::Observed => write!(f, "observed"),
            RosterSource::ClassList => write!(f, "class list"),
            RosterSource::Both => write!(f, "both"),
        }
    }
}

/// Completion rate of a module.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CompletionRate {
    /// Fraction in `0.0..=1.0`.
    Ratio(f64),
    /// No denominator is known.
    NotAvailable,
}

impl CompletionRate {
    pub fn from_counts(submitted: usize, roster: usize) -> Self {
        if roster == 0 {
            CompletionRate::NotAvailable
        } else {
            CompletionRate::Ratio(submitted as f64 / roster as f64)
        }
    }
}

impl fmt::Display for CompletionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionRate::Ratio(r) => write!(f, "{:.1}%", r * 100.0),
            CompletionRate::NotAvailable => write!(f, "N/A"),
        }
    }
}

/// Status label of a module in the summary view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    WithSubmissions,
    NoSubmissions,
    ListingError,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::WithSubmissions => write!(f, "With submissions"),
            ModuleStatus::NoSubmissions => write!(f, "No submissions"),
            ModuleStatus::ListingError => write!(f, "Listing error"),
        }
    }
}

/// One (module, student) row of the detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub module_id: String,
    pub module_name: String,
    pub student_key: String,
    pub last_submitted_at: Option<DateTime<Utc>>,
    pub file_count: usize,
    pub key_source: KeySource,
    pub needs_review: bool,
}

/// One module row of the summary view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub module_id: String,
    pub module_name: String,
    pub file_count: usize,
    pub submitted_students: usize,
    pub roster_size: usize,
    pub missing_students: usize,
    pub unattributed_files: usize,
    pub completion_rate: CompletionRate,
    pub status: ModuleStatus,
}

/// Grand totals row of the summary view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryTotals {
    pub total_modules: usize,
    pub active_modules: usize,
    pub total_files: usize,
    pub total_students: usize,
    /// Sum over modules of distinct submitting students.
    pub total_submissions: usize,
    pub unattributed_files: usize,
}

/// One student row of the roster view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub student_key: String,
    pub modules_submitted: usize,
    pub file_count: usize,
    pub source: RosterSource,
}

/// Facts about the run that produced a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub academy_name: String,
    pub generated_by: String,
    pub generated_at: DateTime<Utc>,
    pub root_folder_id: String,
    pub warnings: usize,
    pub roster_basis: RosterBasis,
}

/// The finished submission report. Built once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub info: RunInfo,
    pub detail: Vec<DetailRow>,
    pub summary: Vec<SummaryRow>,
    pub totals: SummaryTotals,
    pub roster: Vec<RosterRow>,
}
