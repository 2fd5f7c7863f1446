//! Remote listing capability.
//!
//! The pipeline depends only on [`ListingSource`]: given a folder id, return
//! the entries directly inside it. `DriveClient` implements it against the
//! Google Drive v3 API, `FixtureSource` against a JSON document.

pub mod client;
pub mod fixture;

pub use client::DriveClient;
pub use fixture::FixtureSource;

use crate::error::PipelineWarning;
use crate::logsink::LogSink;
use crate::models::RawEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Lists the entries directly inside a folder.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RawEntry>>;
}

/// A folder whose listing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderFailure {
    pub folder_id: String,
    pub message: String,
}

impl From<&FolderFailure> for PipelineWarning {
    fn from(failure: &FolderFailure) -> Self {
        PipelineWarning::ListingFailed {
            folder_id: failure.folder_id.clone(),
            message: failure.message.clone(),
        }
    }
}

/// A folder left unlisted because it sits at the depth limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlistedFolder {
    pub folder_id: String,
    pub name: String,
    pub max_depth: usize,
}

impl From<&UnlistedFolder> for PipelineWarning {
    fn from(folder: &UnlistedFolder) -> Self {
        PipelineWarning::DepthLimitReached {
            folder_id: folder.folder_id.clone(),
            name: folder.name.clone(),
            max_depth: folder.max_depth,
        }
    }
}

/// Everything collected under the tracked root.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub root_id: String,
    /// Entries in discovery order (breadth first).
    pub entries: Vec<RawEntry>,
    pub failures: Vec<FolderFailure>,
    pub unlisted: Vec<UnlistedFolder>,
}

/// Options for walking the folder tree.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Folder levels listed below the root; 1 lists only the root.
    pub max_depth: usize,
    pub progress: Option<ProgressBar>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            progress: None,
        }
    }
}

/// Walk the tree under `root_id` breadth first.
///
/// A failure on the root is returned as an error. Failures on sub-folders
/// are recorded in [`Listing::failures`], folders beyond the depth limit in
/// [`Listing::unlisted`]; both are reported to the log sink.
pub async fn collect_listing(
    source: &dyn ListingSource,
    root_id: &str,
    options: &WalkOptions,
    log: &dyn LogSink,
) -> Result<Listing> {
    let mut listing = Listing {
        root_id: root_id.to_string(),
        ..Listing::default()
    };

    let root_entries = source
        .list_folder(root_id)
        .await
        .with_context(|| format!("Failed to list root folder {}", root_id))?;

    let modules = root_entries.iter().filter(|e| e.is_folder).count();
    log.info(&format!("Found {} module folders", modules));

    let mut visited: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    let skipped = enqueue_folders(&root_entries, 1, options.max_depth, &mut visited, &mut queue);
    record_unlisted(&mut listing, skipped, log);
    listing.entries.extend(root_entries);
    tick(options, root_id);

    while let Some((folder_id, depth)) = queue.pop_front() {
        match source.list_folder(&folder_id).await {
            Ok(children) => {
                debug!("Folder {} holds {} entries", folder_id, children.len());
                let skipped = enqueue_folders(
                    &children,
                    depth + 1,
                    options.max_depth,
                    &mut visited,
                    &mut queue,
                );
                record_unlisted(&mut listing, skipped, log);
                listing.entries.extend(children);
            }
            Err(e) => {
                let failure = FolderFailure {
                    folder_id: folder_id.clone(),
                    message: format!("{:#}", e),
                };
                log.warn(&PipelineWarning::from(&failure).to_string());
                listing.failures.push(failure);
            }
        }
        tick(options, &folder_id);
    }

    if let Some(ref pb) = options.progress {
        pb.finish_with_message(format!("Listed {} entries", listing.entries.len()));
    }

    Ok(listing)
}

/// Queue unseen sub-folders. Returns those that sit at the depth limit.
fn enqueue_folders(
    entries: &[RawEntry],
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<String>,
    queue: &mut VecDeque<(String, usize)>,
) -> Vec<UnlistedFolder> {
    let mut skipped = Vec::new();
    for entry in entries.iter().filter(|e| e.is_folder) {
        if !visited.insert(entry.id.clone()) {
            continue;
        }
        if depth >= max_depth {
            skipped.push(UnlistedFolder {
                folder_id: entry.id.clone(),
                name: entry.name.clone().unwrap_or_else(|| entry.id.clone()),
                max_depth,
            });
        } else {
            queue.push_back((entry.id.clone(), depth));
        }
    }
    skipped
}

fn record_unlisted(listing: &mut Listing, skipped: Vec<UnlistedFolder>, log: &dyn LogSink) {
    for folder in skipped {
        log.warn(&PipelineWarning::from(&folder).to_string());
        listing.unlisted.push(folder);
    }
}

fn tick(options: &WalkOptions, folder_id: &str) {
    if let Some(ref pb) = options.progress {
        pb.set_message(format!("Listing {}", folder_id));
        pb.inc(1);
    }
}
