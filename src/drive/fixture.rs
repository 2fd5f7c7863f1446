//! JSON listing fixtures.
//!
//! A fixture is a saved listing: the root folder id plus every entry under
//! it. It answers `list_folder` by parent id, so the whole pipeline runs
//! without network access.

use super::{Listing, ListingSource};
use crate::models::RawEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk fixture document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureDocument {
    pub root_id: String,
    #[serde(default)]
    pub entries: Vec<RawEntry>,
}

impl From<&Listing> for FixtureDocument {
    fn from(listing: &Listing) -> Self {
        Self {
            root_id: listing.root_id.clone(),
            entries: listing.entries.clone(),
        }
    }
}

/// Listing source backed by a fixture document.
#[derive(Debug, Clone)]
pub struct FixtureSource {
    document: FixtureDocument,
}

impl FixtureSource {
    pub fn new(document: FixtureDocument) -> Self {
        Self { document }
    }

    /// Load a fixture from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let document: FixtureDocument = serde_json::from_str(content)?;
        Ok(Self::new(document))
    }

    pub fn root_id(&self) -> &str {
        &self.document.root_id
    }
}

#[async_trait]
impl ListingSource for FixtureSource {
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RawEntry>> {
        // Entries without a parent are only reachable from the root listing,
        // which lets fixtures carry malformed records.
        let is_root = folder_id == self.document.root_id;
        Ok(self
            .document
            .entries
            .iter()
            .filter(|e| match e.parent_id.as_deref() {
                Some(parent) => parent == folder_id,
                None => is_root,
            })
            .cloned()
            .collect())
    }
}

/// Write a collected listing as a fixture file.
pub fn save_listing(listing: &Listing, path: &Path) -> Result<()> {
    let document = FixtureDocument::from(listing);
    let content = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write listing to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../fixtures/listing.json");

    #[test]
    fn test_load_sample_fixture() {
        let source = FixtureSource::from_json(SAMPLE).unwrap();
        assert_eq!(source.root_id(), "root");
    }

    #[test]
    fn test_list_folder_by_parent() {
        let source = FixtureSource::new(FixtureDocument {
            root_id: "root".to_string(),
            entries: vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::file("f1", "ana.pdf", "m1"),
                RawEntry::file("f2", "luis.pdf", "m1"),
            ],
        });

        let root = tokio_test::block_on(source.list_folder("root")).unwrap();
        assert_eq!(root.len(), 1);
        let module = tokio_test::block_on(source.list_folder("m1")).unwrap();
        assert_eq!(module.len(), 2);
    }

    #[test]
    fn test_parentless_entries_listed_under_root() {
        let mut orphan = RawEntry::file("x", "orphan.pdf", "root");
        orphan.parent_id = None;
        let source = FixtureSource::new(FixtureDocument {
            root_id: "root".to_string(),
            entries: vec![orphan],
        });

        let root = tokio_test::block_on(source.list_folder("root")).unwrap();
        assert_eq!(root.len(), 1);
        let other = tokio_test::block_on(source.list_folder("m1")).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.json");
        let listing = Listing {
            root_id: "root".to_string(),
            entries: vec![RawEntry::folder("m1", "Módulo 1", "root")],
            failures: Vec::new(),
            unlisted: Vec::new(),
        };

        save_listing(&listing, &path).unwrap();
        let source = FixtureSource::load(&path).unwrap();
        let modules = tokio_test::block_on(source.list_folder("root")).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name.as_deref(), Some("Módulo 1"));
    }
}
