//! Core data models used throughout intake.
//!
//! [`WatchState`] is the persisted accumulator; everything else is either a
//! piece of it or a report derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Persisted record of every file ever integrated.
///
/// Append-only from the watcher's point of view: hashes are never removed and
/// `total_integrated` never decreases.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatchState {
    #[serde(default)]
    pub seen_hashes: BTreeSet<String>,
    /// Keyed by path relative to the watched root.
    #[serde(default)]
    pub entries: BTreeMap<String, FileEntry>,
    #[serde(default)]
    pub total_integrated: u64,
}

impl WatchState {
    pub fn has_seen(&self, hash: &str) -> bool {
        self.seen_hashes.contains(hash)
    }

    /// Records one integration. Returns `false` (and changes nothing) when the
    /// hash was already present.
    pub fn record(&mut self, relative_path: String, entry: FileEntry) -> bool {
        if !self.seen_hashes.insert(entry.hash.clone()) {
            return false;
        }
        self.entries.insert(relative_path, entry);
        self.total_integrated += 1;
        true
    }
}

/// One integrated file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    pub hash: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub summary: ExtractionSummary,
    pub integrated_at: DateTime<Utc>,
}

/// Per-category extraction result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionSummary {
    Text {
        length: usize,
        words_count: usize,
        emails: Vec<String>,
        phones: Vec<String>,
        urls: Vec<String>,
        sample_words: Vec<String>,
    },
    Archive {
        extracted_files: usize,
        extract_path: PathBuf,
    },
    Binary {
        size: u64,
        extension: String,
    },
    /// Extraction was attempted and failed; the file still counts as integrated.
    Failed {
        category: FileCategory,
        error: String,
    },
}

impl ExtractionSummary {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionSummary::Text { .. } => "text",
            ExtractionSummary::Archive { .. } => "archive",
            ExtractionSummary::Binary { .. } => "binary",
            ExtractionSummary::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExtractionSummary::Failed { .. })
    }
}

/// How a file is treated, decided by extension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Text,
    Archive,
    Binary,
}

/// Outcome of one scan pass.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ScanResult {
    /// Newly integrated files whose extraction succeeded.
    pub integrated: Vec<String>,
    /// Newly integrated files recorded with a failed summary.
    pub failed: Vec<String>,
    /// Files that could not be read for hashing; retried next pass.
    pub skipped: usize,
    /// Regular files currently under the root.
    pub live_files: usize,
    /// Drop in live file count since the previous pass. Informational only.
    pub removed: usize,
    pub total_integrated: u64,
}

impl ScanResult {
    /// Number of files newly added to the state in this pass.
    pub fn new_count(&self) -> usize {
        self.integrated.len() + self.failed.len()
    }

    pub fn new_files(&self) -> impl Iterator<Item = &String> {
        self.integrated.iter().chain(self.failed.iter())
    }
}

/// Read-only snapshot for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub total_integrated: u64,
    pub processed_files: usize,
    pub knowledge_size: usize,
    pub watching_folder: String,
    pub last_scan_at: Option<DateTime<Utc>>,
}
