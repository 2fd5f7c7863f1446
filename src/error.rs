//! Pipeline error taxonomy.
//!
//! Per-entry problems are warnings: the entry is dropped and the run goes
//! on. A broken report invariant is fatal and aborts report generation.

use thiserror::Error;

/// A recoverable problem found while processing the listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineWarning {
    /// The entry is missing its name or parent id.
    #[error("malformed entry {id}: {reason}")]
    MalformedEntry { id: String, reason: String },

    /// The entry's folder ancestry does not reach a tracked module.
    #[error("unresolved hierarchy for '{name}' ({id}): {reason}")]
    UnresolvedHierarchy {
        id: String,
        name: String,
        reason: String,
    },

    /// Listing a folder failed after retries.
    #[error("could not list folder {folder_id}: {message}")]
    ListingFailed { folder_id: String, message: String },

    /// A folder sits below the walk's depth limit, so its files were not seen.
    #[error("folder '{name}' ({folder_id}) not listed: depth limit {max_depth} reached")]
    DepthLimitReached {
        folder_id: String,
        name: String,
        max_depth: usize,
    },
}

/// An internal invariant of the report was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportAssemblyError {
    #[error("module '{module}' references student '{student}' missing from the roster")]
    StudentNotInRoster { module: String, student: String },
}
