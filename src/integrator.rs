//! Incremental integration of the watched root.
//!
//! Each pass lists the root, keeps files whose content hash has not been seen,
//! extracts a summary for each and records it in the shared [`WatchState`].
//! Identity is the content hash alone: renames and copies of integrated bytes
//! are not integrated again, and modification times are never consulted.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::WatchError;
use crate::extract;
use crate::models::{ExtractionSummary, FileEntry, ScanResult, Stats, WatchState};
use crate::scan;
use crate::state;

#[derive(Debug)]
pub struct Integrator {
    config: Config,
    state: RwLock<WatchState>,
    /// Live file count of the previous pass. Held for the whole of a pass so
    /// passes never interleave.
    pass: Mutex<Option<usize>>,
    last_scan_at: RwLock<Option<DateTime<Utc>>>,
}

impl Integrator {
    /// Loads persisted state for `config`. An unreadable state file is logged
    /// and replaced by an empty state.
    pub fn open(config: Config) -> Self {
        let loaded = match state::load(&config.watch.state_path) {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "discarding unreadable state, starting empty");
                WatchState::default()
            }
        };
        Self::with_state(config, loaded)
    }

    pub fn with_state(config: Config, state: WatchState) -> Self {
        Self {
            config,
            state: RwLock::new(state),
            pass: Mutex::new(None),
            last_scan_at: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn watched_root(&self) -> &Path {
        &self.config.watch.root
    }

    /// Runs one pass over the watched root.
    ///
    /// Fails only for pass-level problems (root missing, root unreadable).
    /// Individual files never abort the pass.
    pub fn scan_once(&self) -> Result<ScanResult, WatchError> {
        let mut last_live_count = self.pass.lock().unwrap_or_else(|p| p.into_inner());
        let listing = scan::list_files(&self.config.watch)?;

        let live_files = listing.live_count();
        let removed = match *last_live_count {
            Some(previous) if previous > live_files => previous - live_files,
            _ => 0,
        };
        if removed > 0 {
            info!(removed, "files removed from watched root since last pass");
        }
        *last_live_count = Some(live_files);

        let fresh = {
            let state = self.read_state();
            let mut claimed = HashSet::new();
            listing
                .files
                .into_iter()
                .filter(|f| !state.has_seen(&f.hash) && claimed.insert(f.hash.clone()))
                .collect::<Vec<_>>()
        };

        let mut result = ScanResult {
            skipped: listing.unreadable,
            live_files,
            removed,
            ..ScanResult::default()
        };

        if !fresh.is_empty() {
            info!(count = fresh.len(), "found new file(s)");
        }

        for file in fresh {
            let summary = extract::extract(
                &file.path,
                file.size_bytes,
                &self.config.extract,
                &self.config.watch.scratch_dir,
            );
            let failed = summary.is_failed();
            let kind = summary.kind();
            let entry = FileEntry {
                hash: file.hash,
                path: file.path,
                size_bytes: file.size_bytes,
                summary,
                integrated_at: Utc::now(),
            };

            // Entry, hash and counter change together under one write lock.
            let recorded = self.write_state().record(file.relative_path.clone(), entry);
            if !recorded {
                continue;
            }
            info!(file = %file.relative_path, kind, "integrated");
            if failed {
                result.failed.push(file.relative_path);
            } else {
                result.integrated.push(file.relative_path);
            }
        }

        result.total_integrated = self.read_state().total_integrated;
        *self.last_scan_at.write().unwrap_or_else(|p| p.into_inner()) = Some(Utc::now());

        if result.new_count() > 0 {
            if let Err(e) = self.persist() {
                warn!(error = %e, "failed to persist state; will retry after next change");
            }
            info!(total = result.total_integrated, "total files integrated");
        }

        Ok(result)
    }

    /// Writes the current state to the configured state path.
    pub fn persist(&self) -> Result<(), WatchError> {
        let snapshot = self.read_state().clone();
        state::save(&self.config.watch.state_path, &snapshot)
    }

    pub fn stats(&self) -> Stats {
        let last_scan_at = *self.last_scan_at.read().unwrap_or_else(|p| p.into_inner());
        let state = self.read_state();
        Stats {
            total_integrated: state.total_integrated,
            processed_files: state.seen_hashes.len(),
            knowledge_size: state.entries.len(),
            watching_folder: self.config.watch.root.display().to_string(),
            last_scan_at,
        }
    }

    /// Snapshot of all entries, ordered by relative path.
    pub fn entries(&self) -> Vec<(String, FileEntry)> {
        self.read_state()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> WatchState {
        self.read_state().clone()
    }

    /// Distinct email matches across all integrated text files.
    pub fn emails(&self) -> Vec<String> {
        self.collect_text(|s| match s {
            ExtractionSummary::Text { emails, .. } => emails.as_slice(),
            _ => &[],
        })
    }

    /// Distinct phone-like matches across all integrated text files.
    pub fn phones(&self) -> Vec<String> {
        self.collect_text(|s| match s {
            ExtractionSummary::Text { phones, .. } => phones.as_slice(),
            _ => &[],
        })
    }

    /// Distinct sampled words across all integrated text files.
    pub fn words(&self) -> Vec<String> {
        self.collect_text(|s| match s {
            ExtractionSummary::Text { sample_words, .. } => sample_words.as_slice(),
            _ => &[],
        })
    }

    fn collect_text<F>(&self, pick: F) -> Vec<String>
    where
        F: for<'a> Fn(&'a ExtractionSummary) -> &'a [String],
    {
        let state = self.read_state();
        let set: BTreeSet<&String> = state
            .entries
            .values()
            .flat_map(|e| pick(&e.summary).iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, WatchState> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, WatchState> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }
}
