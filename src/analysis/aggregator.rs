//! Submission aggregation and statistics.
//!
//! This module folds resolved submissions into per-module tallies and the
//! global student roster. Several files from one student in one module
//! count as a single submission; the file count is kept alongside.

use super::roster::{ClassRoster, StudentRoster};
use crate::models::{
    CanonicalSubmission, CompletionRate, KeySource, ModuleSeed, RosterBasis, UNKNOWN_STUDENT,
};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One student's contribution to a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentTally {
    pub file_count: usize,
    pub last_submitted_at: Option<DateTime<Utc>>,
    /// Source of the first file that identified the student here.
    pub key_source: KeySource,
}

/// Aggregate of one module folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTally {
    pub module_id: String,
    pub module_name: String,
    /// Filled from the roster when the run finishes.
    pub expected_or_detected_students: BTreeSet<String>,
    pub submitted_students: BTreeMap<String, StudentTally>,
    /// Every counted file, attributed or not.
    pub file_count: usize,
    pub unattributed_files: usize,
    pub unattributed_last_at: Option<DateTime<Utc>>,
    pub listing_error: Option<String>,
}

impl ModuleTally {
    fn new(module_id: &str, module_name: &str) -> Self {
        Self {
            module_id: module_id.to_string(),
            module_name: module_name.to_string(),
            expected_or_detected_students: BTreeSet::new(),
            submitted_students: BTreeMap::new(),
            file_count: 0,
            unattributed_files: 0,
            unattributed_last_at: None,
            listing_error: None,
        }
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted_students.len()
    }

    /// Expected students that have no submission in this module.
    pub fn missing_students(&self) -> Vec<&str> {
        self.expected_or_detected_students
            .iter()
            .filter(|s| !self.submitted_students.contains_key(*s))
            .map(String::as_str)
            .collect()
    }

    pub fn completion_rate(&self) -> CompletionRate {
        CompletionRate::from_counts(
            self.submitted_count(),
            self.expected_or_detected_students.len(),
        )
    }
}

/// Accumulates tallies during a single pass.
#[derive(Debug, Default)]
pub struct Aggregator {
    modules: Vec<ModuleTally>,
    index: HashMap<String, usize>,
    roster: StudentRoster,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module so it appears in the report even with no files.
    pub fn seed_module(&mut self, seed: &ModuleSeed) {
        self.tally_mut(&seed.module_id, &seed.module_name);
    }

    /// Mark a module whose listing failed.
    pub fn mark_listing_error(&mut self, module_id: &str, message: &str) -> bool {
        match self.index.get(module_id) {
            Some(&i) => {
                self.modules[i].listing_error = Some(message.to_string());
                true
            }
            None => false,
        }
    }

    /// Fold one resolved file into the tallies.
    pub fn record(&mut self, submission: &CanonicalSubmission) {
        let attributed = submission.student_key != UNKNOWN_STUDENT;
        let tally = self.tally_mut(&submission.module_id, &submission.module_name);
        tally.file_count += 1;

        if !attributed {
            tally.unattributed_files += 1;
            tally.unattributed_last_at =
                latest(tally.unattributed_last_at, submission.submitted_at);
            return;
        }

        tally
            .submitted_students
            .entry(submission.student_key.clone())
            .and_modify(|s| {
                s.file_count += 1;
                s.last_submitted_at = latest(s.last_submitted_at, submission.submitted_at);
            })
            .or_insert(StudentTally {
                file_count: 1,
                last_submitted_at: submission.submitted_at,
                key_source: submission.key_source,
            });

        self.roster.insert_observed(&submission.student_key);
    }

    /// Close the pass: merge the class roster, fill expected students, and
    /// order modules by name.
    pub fn finish(mut self, class_roster: Option<&ClassRoster>) -> AggregateState {
        let basis = match class_roster {
            Some(class) => {
                for key in class.keys() {
                    self.roster.insert_class(key);
                }
                RosterBasis::ClassList
            }
            None => RosterBasis::Observed,
        };

        let expected: BTreeSet<String> = self.roster.keys().map(String::from).collect();
        for tally in &mut self.modules {
            tally.expected_or_detected_students = expected.clone();
        }

        self.modules.sort_by(|a, b| {
            natural_cmp(&a.module_name, &b.module_name).then_with(|| a.module_id.cmp(&b.module_id))
        });

        AggregateState {
            modules: self.modules,
            roster: self.roster,
            basis,
        }
    }

    fn tally_mut(&mut self, module_id: &str, module_name: &str) -> &mut ModuleTally {
        let i = match self.index.get(module_id) {
            Some(&i) => i,
            None => {
                self.modules.push(ModuleTally::new(module_id, module_name));
                self.index
                    .insert(module_id.to_string(), self.modules.len() - 1);
                self.modules.len() - 1
            }
        };
        &mut self.modules[i]
    }
}

/// Final aggregation state handed to the report assembler.
#[derive(Debug, Clone)]
pub struct AggregateState {
    /// Modules in natural name order.
    pub modules: Vec<ModuleTally>,
    pub roster: StudentRoster,
    pub basis: RosterBasis,
}

impl AggregateState {
    pub fn total_files(&self) -> usize {
        self.modules.iter().map(|m| m.file_count).sum()
    }

    /// Number of modules a student submitted to, and their file total.
    pub fn student_activity(&self, key: &str) -> (usize, usize) {
        self.modules
            .iter()
            .filter_map(|m| m.submitted_students.get(key))
            .fold((0, 0), |(modules, files), s| (modules + 1, files + s.file_count))
    }
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

/// Compare names so that "Módulo 2" sorts before "Módulo 10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a_chunks = chunks(a);
    let mut b_chunks = chunks(b);

    loop {
        match (a_chunks.next(), b_chunks.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = compare_chunk(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn compare_chunk(x: &str, y: &str) -> Ordering {
    let x_digits = x.starts_with(|c: char| c.is_ascii_digit());
    let y_digits = y.starts_with(|c: char| c.is_ascii_digit());

    if x_digits && y_digits {
        let x = x.trim_start_matches('0');
        let y = y.trim_start_matches('0');
        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
    } else {
        x.to_lowercase().cmp(&y.to_lowercase())
    }
}

/// Split into alternating runs of ASCII digits and everything else.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = rest
            .char_indices()
            .find(|(_, c)| c.is_ascii_digit() != digits)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(module: &str, student: &str, file: &str) -> CanonicalSubmission {
        CanonicalSubmission {
            module_id: module.to_lowercase().replace(' ', "-"),
            module_name: module.to_string(),
            student_key: student.to_string(),
            file_name: file.to_string(),
            submitted_at: None,
            key_source: KeySource::FileName,
            needs_review: student == UNKNOWN_STUDENT,
        }
    }

    fn seed(name: &str) -> ModuleSeed {
        ModuleSeed {
            module_id: name.to_lowercase().replace(' ', "-"),
            module_name: name.to_string(),
        }
    }

    #[test]
    fn test_many_files_one_student_counts_once() {
        let mut agg = Aggregator::new();
        agg.seed_module(&seed("Módulo 1"));
        agg.record(&submission("Módulo 1", "juan perez", "juan_perez_tarea.pdf"));
        agg.record(&submission("Módulo 1", "juan perez", "juan-perez-tarea2.pdf"));

        let state = agg.finish(None);
        let tally = &state.modules[0];
        assert_eq!(tally.submitted_count(), 1);
        assert_eq!(tally.file_count, 2);
        assert_eq!(tally.submitted_students["juan perez"].file_count, 2);
    }

    #[test]
    fn test_empty_module_survives() {
        let mut agg = Aggregator::new();
        agg.seed_module(&seed("Módulo 1"));
        agg.seed_module(&seed("Módulo 3"));
        agg.record(&submission("Módulo 1", "ana", "ana.pdf"));

        let state = agg.finish(None);
        assert_eq!(state.modules.len(), 2);
        let empty = &state.modules[1];
        assert_eq!(empty.module_name, "Módulo 3");
        assert_eq!(empty.submitted_count(), 0);
        assert_eq!(empty.completion_rate(), CompletionRate::Ratio(0.0));
    }

    #[test]
    fn test_no_roster_means_not_available() {
        let mut agg = Aggregator::new();
        agg.seed_module(&seed("Módulo 3"));

        let state = agg.finish(None);
        assert_eq!(state.modules[0].completion_rate(), CompletionRate::NotAvailable);
    }

    #[test]
    fn test_unknown_student_not_in_roster() {
        let mut agg = Aggregator::new();
        agg.record(&submission("Módulo 1", UNKNOWN_STUDENT, "IMG_1.jpg"));

        let state = agg.finish(None);
        assert_eq!(state.roster.len(), 0);
        assert_eq!(state.modules[0].unattributed_files, 1);
        assert_eq!(state.modules[0].file_count, 1);
        assert_eq!(state.modules[0].submitted_count(), 0);
    }

    #[test]
    fn test_submitted_never_exceeds_roster() {
        let mut agg = Aggregator::new();
        agg.record(&submission("Módulo 1", "ana", "a.pdf"));
        agg.record(&submission("Módulo 1", "luis", "l.pdf"));
        agg.record(&submission("Módulo 2", "ana", "a2.pdf"));

        let state = agg.finish(None);
        for tally in &state.modules {
            assert!(tally.submitted_count() <= state.roster.len());
            assert!(tally
                .submitted_students
                .keys()
                .all(|k| tally.expected_or_detected_students.contains(k)));
        }
        assert_eq!(state.modules[1].missing_students(), vec!["luis"]);
    }

    #[test]
    fn test_class_roster_extends_denominator() {
        use crate::config::ResolverConfig;
        use crate::pipeline::student_key::HeuristicKeyStrategy;

        let strategy = HeuristicKeyStrategy::from_config(&ResolverConfig::default()).unwrap();
        let class = ClassRoster::parse("Ana\nLuis\nMarta\nPedro\n", &strategy);

        let mut agg = Aggregator::new();
        agg.record(&submission("Módulo 1", "ana", "a.pdf"));

        let state = agg.finish(Some(&class));
        assert_eq!(state.basis, RosterBasis::ClassList);
        assert_eq!(state.roster.len(), 4);
        assert_eq!(state.modules[0].completion_rate(), CompletionRate::Ratio(0.25));
    }

    #[test]
    fn test_last_submission_time_moves_forward() {
        let early = "2024-05-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let late = "2024-05-09T10:00:00Z".parse::<DateTime<Utc>>().unwrap();

        let mut agg = Aggregator::new();
        let mut first = submission("Módulo 1", "ana", "a.pdf");
        first.submitted_at = Some(late);
        let mut second = submission("Módulo 1", "ana", "b.pdf");
        second.submitted_at = Some(early);
        agg.record(&first);
        agg.record(&second);

        let state = agg.finish(None);
        assert_eq!(
            state.modules[0].submitted_students["ana"].last_submitted_at,
            Some(late)
        );
    }

    #[test]
    fn test_student_activity() {
        let mut agg = Aggregator::new();
        agg.record(&submission("Módulo 1", "ana", "a.pdf"));
        agg.record(&submission("Módulo 1", "ana", "b.pdf"));
        agg.record(&submission("Módulo 2", "ana", "c.pdf"));

        let state = agg.finish(None);
        assert_eq!(state.student_activity("ana"), (2, 3));
        assert_eq!(state.student_activity("nobody"), (0, 0));
    }

    #[test]
    fn test_natural_order() {
        let mut names = vec!["Módulo 10", "Módulo 2", "módulo 1", "Anexo"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["Anexo", "módulo 1", "Módulo 2", "Módulo 10"]);
    }

    #[test]
    fn test_mark_listing_error() {
        let mut agg = Aggregator::new();
        agg.seed_module(&seed("Módulo 1"));
        assert!(agg.mark_listing_error("módulo-1", "HTTP 500"));
        assert!(!agg.mark_listing_error("missing", "HTTP 500"));

        let state = agg.finish(None);
        assert_eq!(state.modules[0].listing_error.as_deref(), Some("HTTP 500"));
    }
}
