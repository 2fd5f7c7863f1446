//! Student key strategies.
//!
//! Turning names into student keys is heuristic and lossy, so the resolver
//! talks to a [`StudentKeyStrategy`] rather than hard-coding string rules.

use crate::config::ResolverConfig;
use crate::models::KeySource;
use regex::Regex;
use std::collections::HashSet;

/// Maps raw names to canonical student keys.
pub trait StudentKeyStrategy: Send + Sync {
    /// Canonical form of a name: case-folded, delimiters as single spaces.
    fn normalize(&self, raw: &str) -> String;

    /// Try to recognize a student from a filename.
    fn key_from_file_name(&self, file_name: &str) -> Option<(String, KeySource)>;
}

/// Filename heuristics: an embedded e-mail address, else the leading run
/// of alphabetic tokens up to the first stop word.
#[derive(Debug, Clone)]
pub struct HeuristicKeyStrategy {
    stop_words: HashSet<String>,
    max_name_tokens: usize,
    min_name_len: usize,
    email_pattern: Regex,
}

impl HeuristicKeyStrategy {
    pub fn new(
        stop_words: &[String],
        max_name_tokens: usize,
        min_name_len: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            stop_words: stop_words.iter().map(|w| w.to_lowercase()).collect(),
            max_name_tokens: max_name_tokens.max(1),
            min_name_len,
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
        })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, regex::Error> {
        Self::new(
            &config.stop_words,
            config.max_name_tokens,
            config.min_name_len,
        )
    }

    fn key_from_email(&self, file_name: &str) -> Option<String> {
        let email = self.email_pattern.find(file_name)?.as_str();
        let local = email.split('@').next()?;
        let key = self.normalize(local);
        (!key.is_empty()).then_some(key)
    }

    fn key_from_name_prefix(&self, file_name: &str) -> Option<String> {
        let stem = match file_name.rfind('.') {
            Some(pos) if pos > 0 => &file_name[..pos],
            _ => file_name,
        };

        let tokens: Vec<&str> = stem
            .split(|c: char| is_delimiter(c))
            .filter(|t| !t.is_empty())
            .take_while(|t| t.chars().all(char::is_alphabetic))
            .take_while(|t| !self.stop_words.contains(&t.to_lowercase()))
            .take(self.max_name_tokens)
            .collect();

        let letters: usize = tokens.iter().map(|t| t.chars().count()).sum();
        if tokens.is_empty() || letters < self.min_name_len {
            return None;
        }

        Some(self.normalize(&tokens.join(" ")))
    }
}

impl StudentKeyStrategy for HeuristicKeyStrategy {
    fn normalize(&self, raw: &str) -> String {
        normalize_key(raw)
    }

    fn key_from_file_name(&self, file_name: &str) -> Option<(String, KeySource)> {
        if let Some(key) = self.key_from_email(file_name) {
            return Some((key, KeySource::Email));
        }
        self.key_from_name_prefix(file_name)
            .map(|key| (key, KeySource::FileName))
    }
}

fn is_delimiter(c: char) -> bool {
    c == '_' || c == '-' || c == '.' || c.is_whitespace()
}

/// Case-fold, turn delimiters into spaces and collapse whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .split(is_delimiter)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
