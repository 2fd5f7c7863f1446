//! Module/student resolver.
//!
//! Maps each normalized file entry to the module folder it lives in and to
//! a student key. Module folders are the folders directly under the tracked
//! root; every one of them is seeded, files or not.

use super::student_key::StudentKeyStrategy;
use crate::config::ResolverConfig;
use crate::error::PipelineWarning;
use crate::logsink::LogSink;
use crate::models::{CanonicalSubmission, KeySource, ModuleSeed, NormalizedEntry, UNKNOWN_STUDENT};
use std::collections::{HashMap, HashSet};

/// Resolution settings.
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    pub use_owner_metadata: bool,
    /// Normalized owner names that never identify a student.
    pub ignored_owners: HashSet<String>,
    /// Lowercase extensions counted as submissions; empty accepts all.
    pub extensions: Vec<String>,
    pub student_folders: bool,
}

impl ResolverOptions {
    pub fn from_config(config: &ResolverConfig, strategy: &dyn StudentKeyStrategy) -> Self {
        Self {
            use_owner_metadata: config.use_owner_metadata,
            ignored_owners: config
                .ignored_owners
                .iter()
                .map(|o| strategy.normalize(o))
                .collect(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            student_folders: config.student_folders,
        }
    }

    fn accepts(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

/// Output of the resolver.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Module folders in listing order.
    pub modules: Vec<ModuleSeed>,
    pub submissions: Vec<CanonicalSubmission>,
    pub warnings: Vec<PipelineWarning>,
}

/// Resolves entries against the folder hierarchy under a root.
pub struct Resolver<'a> {
    root_id: &'a str,
    options: &'a ResolverOptions,
    strategy: &'a dyn StudentKeyStrategy,
}

impl<'a> Resolver<'a> {
    pub fn new(
        root_id: &'a str,
        options: &'a ResolverOptions,
        strategy: &'a dyn StudentKeyStrategy,
    ) -> Self {
        Self {
            root_id,
            options,
            strategy,
        }
    }

    /// Resolve every entry. Unresolvable files are dropped with a warning.
    pub fn resolve(&self, entries: &[NormalizedEntry], log: &dyn LogSink) -> Resolution {
        let by_id: HashMap<&str, &NormalizedEntry> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        let mut resolution = Resolution::default();
        let mut seen_modules = HashSet::new();

        for entry in entries
            .iter()
            .filter(|e| e.is_folder && e.parent_id == self.root_id)
        {
            if seen_modules.insert(entry.id.as_str()) {
                log.info(&format!("Module found: {}", entry.name));
                resolution.modules.push(ModuleSeed {
                    module_id: entry.id.clone(),
                    module_name: entry.name.clone(),
                });
            }
        }

        for entry in entries.iter().filter(|e| !e.is_folder) {
            if !self.options.accepts(&entry.name) {
                log.info(&format!("Skipping non-submission file: {}", entry.name));
                continue;
            }

            match self.resolve_file(entry, &by_id) {
                Ok(submission) => {
                    if submission.needs_review {
                        log.info(&format!(
                            "No student recognized for '{}' in {}, flagged for review",
                            submission.file_name, submission.module_name
                        ));
                    }
                    resolution.submissions.push(submission);
                }
                Err(warning) => {
                    log.warn(&format!("Skipping file: {}", warning));
                    resolution.warnings.push(warning);
                }
            }
        }

        resolution
    }

    fn resolve_file(
        &self,
        entry: &NormalizedEntry,
        by_id: &HashMap<&str, &NormalizedEntry>,
    ) -> Result<CanonicalSubmission, PipelineWarning> {
        let ancestry = self.ancestry(entry, by_id)?;
        // ancestry runs from the direct parent up to the module folder
        let module = ancestry[ancestry.len() - 1];
        let student_folder = if ancestry.len() >= 2 {
            Some(ancestry[ancestry.len() - 2])
        } else {
            None
        };

        let (student_key, key_source) = self.student_key(entry, student_folder);

        Ok(CanonicalSubmission {
            module_id: module.id.clone(),
            module_name: module.name.clone(),
            needs_review: key_source == KeySource::Unknown,
            student_key,
            file_name: entry.name.clone(),
            submitted_at: entry.modified_at,
            key_source,
        })
    }

    /// Folders from the entry's parent up to its module, nearest first.
    fn ancestry<'e>(
        &self,
        entry: &NormalizedEntry,
        by_id: &HashMap<&str, &'e NormalizedEntry>,
    ) -> Result<Vec<&'e NormalizedEntry>, PipelineWarning> {
        let unresolved = |reason: String| PipelineWarning::UnresolvedHierarchy {
            id: entry.id.clone(),
            name: entry.name.clone(),
            reason,
        };

        if entry.parent_id == self.root_id {
            return Err(unresolved(
                "file sits directly in the tracked root, outside any module".to_string(),
            ));
        }

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = entry.parent_id.as_str();

        while current != self.root_id {
            if !visited.insert(current) {
                return Err(unresolved(format!("folder cycle at {}", current)));
            }
            let folder = by_id
                .get(current)
                .copied()
                .ok_or_else(|| unresolved(format!("ancestor {} is not in the listing", current)))?;
            if !folder.is_folder {
                return Err(unresolved(format!("parent {} is not a folder", current)));
            }
            chain.push(folder);
            current = folder.parent_id.as_str();
        }

        Ok(chain)
    }

    fn student_key(
        &self,
        entry: &NormalizedEntry,
        student_folder: Option<&NormalizedEntry>,
    ) -> (String, KeySource) {
        if self.options.use_owner_metadata {
            if let Some(ref owner) = entry.owner {
                let key = self.strategy.normalize(owner);
                if !key.is_empty() && !self.options.ignored_owners.contains(&key) {
                    return (key, KeySource::Owner);
                }
            }
        }

        if self.options.student_folders {
            if let Some(folder) = student_folder {
                let key = self.strategy.normalize(&folder.name);
                if !key.is_empty() {
                    return (key, KeySource::Folder);
                }
            }
        }

        self.strategy
            .key_from_file_name(&entry.name)
            .unwrap_or_else(|| (UNKNOWN_STUDENT.to_string(), KeySource::Unknown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logsink::{LogLevel, MemorySink};
    use crate::models::RawEntry;
    use crate::pipeline::normalizer::normalize_entry;
    use crate::pipeline::student_key::HeuristicKeyStrategy;

    fn normalized(entries: Vec<RawEntry>) -> Vec<NormalizedEntry> {
        entries
            .iter()
            .map(|e| normalize_entry(e).unwrap())
            .collect()
    }

    fn run(entries: Vec<RawEntry>, config: &ResolverConfig) -> (Resolution, MemorySink) {
        let strategy = HeuristicKeyStrategy::from_config(config).unwrap();
        let options = ResolverOptions::from_config(config, &strategy);
        let log = MemorySink::new();
        let resolution = Resolver::new("root", &options, &strategy).resolve(&normalized(entries), &log);
        (resolution, log)
    }

    fn with_owner(mut entry: RawEntry, owner: &str) -> RawEntry {
        entry.owner_hint = Some(owner.to_string());
        entry
    }

    #[test]
    fn test_empty_module_is_seeded() {
        let (resolution, log) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::folder("m3", "Módulo 3", "root"),
            ],
            &ResolverConfig::default(),
        );

        assert_eq!(resolution.modules.len(), 2);
        assert_eq!(resolution.modules[1].module_name, "Módulo 3");
        assert!(resolution.submissions.is_empty());
        assert_eq!(log.lines().len(), 2);
    }

    #[test]
    fn test_owner_takes_priority_over_filename() {
        let (resolution, _) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                with_owner(RawEntry::file("f1", "juan_perez.pdf", "m1"), "Ana  López"),
            ],
            &ResolverConfig::default(),
        );

        let submission = &resolution.submissions[0];
        assert_eq!(submission.student_key, "ana lópez");
        assert_eq!(submission.key_source, KeySource::Owner);
    }

    #[test]
    fn test_ignored_owner_falls_back_to_filename() {
        let config = ResolverConfig {
            ignored_owners: vec!["Jean Fraisse".to_string()],
            ..ResolverConfig::default()
        };
        let (resolution, _) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                with_owner(RawEntry::file("f1", "juan_perez.pdf", "m1"), "jean fraisse"),
            ],
            &config,
        );

        assert_eq!(resolution.submissions[0].student_key, "juan perez");
        assert_eq!(resolution.submissions[0].key_source, KeySource::FileName);
    }

    #[test]
    fn test_unknown_student_flagged_for_review() {
        let (resolution, log) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::file("f1", "IMG_2041.jpg", "m1"),
            ],
            &ResolverConfig::default(),
        );

        let submission = &resolution.submissions[0];
        assert_eq!(submission.student_key, UNKNOWN_STUDENT);
        assert!(submission.needs_review);
        assert!(resolution.warnings.is_empty());
        assert!(log
            .lines()
            .iter()
            .any(|l| l.message.contains("flagged for review")));
    }

    #[test]
    fn test_file_in_root_is_unresolved() {
        let (resolution, log) = run(
            vec![RawEntry::file("f1", "instrucciones.pdf", "root")],
            &ResolverConfig::default(),
        );

        assert!(resolution.submissions.is_empty());
        assert_eq!(resolution.warnings.len(), 1);
        assert!(matches!(
            resolution.warnings[0],
            PipelineWarning::UnresolvedHierarchy { .. }
        ));
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn test_unknown_ancestor_is_unresolved() {
        let (resolution, _) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::file("f1", "ana.pdf", "ghost"),
            ],
            &ResolverConfig::default(),
        );
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_folder_cycle_is_unresolved() {
        let (resolution, _) = run(
            vec![
                RawEntry::folder("a", "A", "b"),
                RawEntry::folder("b", "B", "a"),
                RawEntry::file("f1", "ana.pdf", "a"),
            ],
            &ResolverConfig::default(),
        );
        assert!(resolution.submissions.is_empty());
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_nested_file_resolves_to_module() {
        let (resolution, _) = run(
            vec![
                RawEntry::folder("m2", "Módulo 2", "root"),
                RawEntry::folder("s1", "Carlos Ruiz", "m2"),
                RawEntry::file("f1", "dibujo.png", "s1"),
            ],
            &ResolverConfig::default(),
        );

        let submission = &resolution.submissions[0];
        assert_eq!(submission.module_id, "m2");
        // Sub-folder names are ignored unless enabled
        assert_eq!(submission.student_key, "dibujo");
    }

    #[test]
    fn test_student_folder_names_when_enabled() {
        let config = ResolverConfig {
            student_folders: true,
            ..ResolverConfig::default()
        };
        let (resolution, _) = run(
            vec![
                RawEntry::folder("m2", "Módulo 2", "root"),
                RawEntry::folder("s1", "Carlos Ruiz", "m2"),
                RawEntry::file("f1", "dibujo.png", "s1"),
                RawEntry::file("f2", "ana_lopez.png", "m2"),
            ],
            &config,
        );

        assert_eq!(resolution.submissions[0].student_key, "carlos ruiz");
        assert_eq!(resolution.submissions[0].key_source, KeySource::Folder);
        // Files directly in the module have no student folder
        assert_eq!(resolution.submissions[1].student_key, "ana lopez");
    }

    #[test]
    fn test_extension_filter() {
        let (resolution, log) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::file("f1", "notas.xlsx", "m1"),
                RawEntry::file("f2", "ana.PDF", "m1"),
            ],
            &ResolverConfig::default(),
        );

        assert_eq!(resolution.submissions.len(), 1);
        assert_eq!(resolution.submissions[0].file_name, "ana.PDF");
        assert!(log
            .lines()
            .iter()
            .any(|l| l.message == "Skipping non-submission file: notas.xlsx"));
    }

    #[test]
    fn test_skipped_files_are_logged() {
        let (resolution, log) = run(
            vec![
                RawEntry::folder("m1", "Módulo 1", "root"),
                RawEntry::file("f1", "ana_lopez_ensayo.odt", "m1"),
                RawEntry::file("f2", "ana_lopez_foto.webp", "m1"),
            ],
            &ResolverConfig::default(),
        );

        assert!(resolution.submissions.is_empty());
        let skipped: Vec<String> = log
            .lines()
            .into_iter()
            .filter(|l| l.level == LogLevel::Info)
            .filter_map(|l| {
                l.message
                    .strip_prefix("Skipping non-submission file: ")
                    .map(String::from)
            })
            .collect();
        assert_eq!(skipped, vec!["ana_lopez_ensayo.odt", "ana_lopez_foto.webp"]);
    }
}
