//! Submission pipeline.
//!
//! raw listing → normalizer → resolver → aggregator → report assembler.
//! Every run builds its state from scratch; nothing is shared between runs.

pub mod normalizer;
pub mod resolver;
pub mod student_key;

use crate::analysis::{Aggregator, ClassRoster};
use crate::config::Config;
use crate::drive::Listing;
use crate::error::{PipelineWarning, ReportAssemblyError};
use crate::logsink::LogSink;
use crate::models::{NormalizedEntry, Report};
use crate::report::{assemble, RunContext};
use chrono::{DateTime, Utc};
use resolver::{Resolver, ResolverOptions};
use std::collections::HashMap;
use student_key::StudentKeyStrategy;
use tracing::debug;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithWarnings(usize),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub warnings: Vec<PipelineWarning>,
    pub status: RunStatus,
}

/// One configured pipeline.
pub struct Pipeline<'a> {
    config: &'a Config,
    strategy: &'a dyn StudentKeyStrategy,
    class_roster: Option<&'a ClassRoster>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, strategy: &'a dyn StudentKeyStrategy) -> Self {
        Self {
            config,
            strategy,
            class_roster: None,
        }
    }

    /// Judge completion against a class list as well as observed students.
    pub fn with_class_roster(mut self, roster: Option<&'a ClassRoster>) -> Self {
        self.class_roster = roster;
        self
    }

    /// Process a collected listing into a report.
    ///
    /// Entry-level problems become warnings; only a broken report invariant
    /// fails the run.
    pub fn run(
        &self,
        listing: &Listing,
        generated_at: DateTime<Utc>,
        log: &dyn LogSink,
    ) -> Result<RunOutcome, ReportAssemblyError> {
        // Folder failures and unlisted folders were already reported while walking the tree
        let mut warnings: Vec<PipelineWarning> = listing
            .failures
            .iter()
            .map(PipelineWarning::from)
            .chain(listing.unlisted.iter().map(PipelineWarning::from))
            .collect();

        let (entries, normalize_warnings) = normalizer::normalize_entries(&listing.entries, log);
        warnings.extend(normalize_warnings);
        debug!("{} entries after normalization", entries.len());

        let options = ResolverOptions::from_config(&self.config.resolver, self.strategy);
        let resolution =
            Resolver::new(&listing.root_id, &options, self.strategy).resolve(&entries, log);
        warnings.extend(resolution.warnings);

        let mut aggregator = Aggregator::new();
        for seed in &resolution.modules {
            aggregator.seed_module(seed);
        }
        for submission in &resolution.submissions {
            aggregator.record(submission);
        }
        for failure in &listing.failures {
            if let Some(module_id) = module_of(&failure.folder_id, &entries, &listing.root_id) {
                aggregator.mark_listing_error(&module_id, &failure.message);
            }
        }

        let state = aggregator.finish(self.class_roster);

        for tally in &state.modules {
            log.info(&format!(
                "{}: {} of {} students, {} files",
                tally.module_name,
                tally.submitted_count(),
                tally.expected_or_detected_students.len(),
                tally.file_count
            ));
        }

        let report = assemble(
            &state,
            RunContext {
                academy_name: self.config.general.academy_name.clone(),
                generated_by: self.config.general.generated_by.clone(),
                generated_at,
                root_folder_id: listing.root_id.clone(),
                warnings: warnings.len(),
            },
        )?;

        let status = if warnings.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithWarnings(warnings.len())
        };

        Ok(RunOutcome {
            report,
            warnings,
            status,
        })
    }
}

/// Module folder that contains `folder_id`, the folder itself included.
fn module_of(folder_id: &str, entries: &[NormalizedEntry], root_id: &str) -> Option<String> {
    let parents: HashMap<&str, &str> = entries
        .iter()
        .filter(|e| e.is_folder)
        .map(|e| (e.id.as_str(), e.parent_id.as_str()))
        .collect();

    let mut current = folder_id;
    for _ in 0..parents.len() {
        let parent = *parents.get(current)?;
        if parent == root_id {
            return Some(current.to_string());
        }
        current = parent;
    }
    None
}
