//! Student roster.
//!
//! The roster is the set of unique student keys of a run. It always holds
//! every student seen in the listing and, when a class roster file is
//! given, every student on that list as well.

use crate::models::RosterSource;
use crate::pipeline::student_key::StudentKeyStrategy;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Unique student keys, alphabetically ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRoster {
    entries: BTreeMap<String, RosterSource>,
}

impl StudentRoster {
    /// Add a student seen in the listing.
    pub fn insert_observed(&mut self, key: &str) {
        self.insert(key, RosterSource::Observed);
    }

    /// Add a student from the class list.
    pub fn insert_class(&mut self, key: &str) {
        self.insert(key, RosterSource::ClassList);
    }

    fn insert(&mut self, key: &str, source: RosterSource) {
        self.entries
            .entry(key.to_string())
            .and_modify(|existing| {
                if *existing != source {
                    *existing = RosterSource::Both;
                }
            })
            .or_insert(source);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn source(&self, key: &str) -> Option<RosterSource> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// An authoritative class list of student names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassRoster {
    keys: Vec<String>,
}

impl ClassRoster {
    /// Parse one name per line. Blank lines and `#` comments are skipped.
    pub fn parse(content: &str, strategy: &dyn StudentKeyStrategy) -> Self {
        let mut keys: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| strategy.normalize(l))
            .filter(|k| !k.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    /// Load a class roster file.
    pub fn load(path: &Path, strategy: &dyn StudentKeyStrategy) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster file: {}", path.display()))?;
        Ok(Self::parse(&content, strategy))
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::pipeline::student_key::HeuristicKeyStrategy;

    #[test]
    fn test_roster_source_merges() {
        let mut roster = StudentRoster::default();
        roster.insert_observed("ana");
        roster.insert_observed("ana");
        roster.insert_class("ana");
        roster.insert_class("luis");

        assert_eq!(roster.len(), 2);
        assert_eq!(roster.source("ana"), Some(RosterSource::Both));
        assert_eq!(roster.source("luis"), Some(RosterSource::ClassList));
    }

    #[test]
    fn test_roster_keys_sorted() {
        let mut roster = StudentRoster::default();
        roster.insert_observed("zoe");
        roster.insert_observed("ana");
        let keys: Vec<&str> = roster.keys().collect();
        assert_eq!(keys, vec!["ana", "zoe"]);
    }

    #[test]
    fn test_class_roster_parse_normalizes_and_dedups() {
        let strategy = HeuristicKeyStrategy::from_config(&ResolverConfig::default()).unwrap();
        let content = "# class 2024\nJuan Pérez\n\n  juan   pérez \nAna López\n";

        let roster = ClassRoster::parse(content, &strategy);
        assert_eq!(roster.keys(), &["ana lópez".to_string(), "juan pérez".to_string()]);
    }

    #[test]
    fn test_class_roster_load_missing_file() {
        let strategy = HeuristicKeyStrategy::from_config(&ResolverConfig::default()).unwrap();
        assert!(ClassRoster::load(Path::new("/no/such/roster.txt"), &strategy).is_err());
    }
}
