//! Walks the watched root and hashes every regular file.

use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::{normalize_path, WatchConfig};
use crate::error::WatchError;
use crate::state;

/// A regular file found under the root, with its content hash.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub relative_path: String,
    pub hash: String,
    pub size_bytes: u64,
}

/// Everything one walk of the root produced.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<ScannedFile>,
    /// Files that were listed but could not be read.
    pub unreadable: usize,
}

impl Listing {
    pub fn live_count(&self) -> usize {
        self.files.len() + self.unreadable
    }
}

/// Fails when the root is missing or not a directory.
pub fn check_root(root: &Path) -> Result<(), WatchError> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(WatchError::RootNotDirectory(root.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(WatchError::RootMissing(root.to_path_buf()))
        }
        Err(e) => Err(WatchError::io(root, e)),
    }
}

pub fn list_files(config: &WatchConfig) -> Result<Listing, WatchError> {
    let root = &config.root;
    check_root(root)?;

    let exclude_set = build_globset(&config.exclude_globs)?;
    let mut listing = Listing::default();

    // The state file and its temp sibling change on every save.
    let own_files = [
        normalize_path(&config.state_path),
        normalize_path(&state::temp_path(&config.state_path)),
    ];
    let absolute_root = normalize_path(root);

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // The root itself failing is a pass-level error; anything deeper is skipped.
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if own_files.contains(&absolute_root.join(relative)) {
            continue;
        }

        match hash_file(path) {
            Ok((hash, size_bytes)) => listing.files.push(ScannedFile {
                path: path.to_path_buf(),
                relative_path: rel_str,
                hash,
                size_bytes,
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not hash file");
                listing.unreadable += 1;
            }
        }
    }

    // Sort for deterministic ordering
    listing
        .files
        .sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(listing)
}

/// SHA-256 of the file's bytes as lowercase hex, plus the byte count.
pub fn hash_file(path: &Path) -> std::io::Result<(String, u64)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
