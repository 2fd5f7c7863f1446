//! Metadata normalizer.
//!
//! Validates the shape of raw listing entries and converts them into
//! [`NormalizedEntry`] values. Entries without a name or parent are dropped
//! with a warning.

use crate::error::PipelineWarning;
use crate::logsink::LogSink;
use crate::models::{NormalizedEntry, RawEntry};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Normalize a listing, preserving input order.
///
/// Returns the surviving entries and one warning per dropped entry.
pub fn normalize_entries(
    entries: &[RawEntry],
    log: &dyn LogSink,
) -> (Vec<NormalizedEntry>, Vec<PipelineWarning>) {
    let mut normalized = Vec::with_capacity(entries.len());
    let mut warnings = Vec::new();

    for entry in entries {
        match normalize_entry(entry) {
            Ok(n) => normalized.push(n),
            Err(warning) => {
                log.warn(&format!("Skipping entry: {}", warning));
                warnings.push(warning);
            }
        }
    }

    (normalized, warnings)
}

/// Normalize a single entry.
pub fn normalize_entry(entry: &RawEntry) -> Result<NormalizedEntry, PipelineWarning> {
    let name = non_blank(entry.name.as_deref()).ok_or_else(|| PipelineWarning::MalformedEntry {
        id: entry.id.clone(),
        reason: "missing name".to_string(),
    })?;

    let parent_id =
        non_blank(entry.parent_id.as_deref()).ok_or_else(|| PipelineWarning::MalformedEntry {
            id: entry.id.clone(),
            reason: format!("'{}' has no parent folder", name),
        })?;

    let modified_at = entry.modified_at.as_deref().and_then(|raw| {
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            debug!("Unparseable modification time on {}: {}", entry.id, raw);
        }
        parsed
    });

    Ok(NormalizedEntry {
        id: entry.id.clone(),
        name: name.to_string(),
        parent_id: parent_id.to_string(),
        is_folder: entry.is_folder,
        modified_at,
        owner: non_blank(entry.owner_hint.as_deref()).map(String::from),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logsink::MemorySink;

    #[test]
    fn test_empty_name_is_dropped_with_one_warning() {
        let log = MemorySink::new();
        let entries = vec![
            RawEntry::file("f1", "", "m1"),
            RawEntry::file("f2", "ana.pdf", "m1"),
        ];

        let (normalized, warnings) = normalize_entries(&entries, &log);

        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].id, "f2");
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            PipelineWarning::MalformedEntry { ref id, .. } if id == "f1"
        ));
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn test_missing_parent_is_malformed() {
        let mut entry = RawEntry::file("f1", "ana.pdf", "m1");
        entry.parent_id = None;
        assert!(normalize_entry(&entry).is_err());

        entry.parent_id = Some("   ".to_string());
        assert!(normalize_entry(&entry).is_err());
    }

    #[test]
    fn test_preserves_input_order() {
        let log = MemorySink::new();
        let entries = vec![
            RawEntry::file("c", "c.pdf", "m1"),
            RawEntry::file("a", "a.pdf", "m1"),
            RawEntry::file("b", "b.pdf", "m1"),
        ];

        let (normalized, _) = normalize_entries(&entries, &log);
        let ids: Vec<&str> = normalized.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_trims_name_and_owner() {
        let mut entry = RawEntry::file("f1", "  ana.pdf ", "m1");
        entry.owner_hint = Some("  ".to_string());
        entry.modified_at = Some("2024-05-02T09:15:00.000Z".to_string());

        let normalized = normalize_entry(&entry).unwrap();
        assert_eq!(normalized.name, "ana.pdf");
        assert!(normalized.owner.is_none());
        assert!(normalized.modified_at.is_some());
    }

    #[test]
    fn test_bad_timestamp_is_not_an_error() {
        let mut entry = RawEntry::file("f1", "ana.pdf", "m1");
        entry.modified_at = Some("yesterday".to_string());

        let normalized = normalize_entry(&entry).unwrap();
        assert!(normalized.modified_at.is_none());
    }
}
