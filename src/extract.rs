//! Per-category extraction of newly seen files.
//!
//! Text-like files get a pattern summary (emails, phone numbers, URLs, words),
//! archives are unpacked into a scratch directory, everything else is treated
//! as an opaque binary. Extraction never fails the caller: errors come back as
//! [`ExtractionSummary::Failed`] so one bad file cannot abort a pass.

use rand::seq::IndexedRandom;
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ExtractConfig;
use crate::models::{ExtractionSummary, FileCategory};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("archive extraction failed: {0}")]
    Archive(String),
    #[error("unsupported archive format: {0}")]
    UnsupportedArchive(String),
    #[error("archive expands beyond {0} bytes")]
    TooLarge(u64),
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}")
            .expect("valid regex")
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://(?:[-\w.]|%[0-9a-fA-F]{2})+").expect("valid regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("valid regex"))
}

/// Lowercased extension without the dot, or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

pub fn categorize(path: &Path, config: &ExtractConfig) -> FileCategory {
    let ext = extension_of(path);
    if ext.is_empty() {
        return FileCategory::Binary;
    }
    if config.text_extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
        FileCategory::Text
    } else if config
        .archive_extensions
        .iter()
        .any(|e| e.eq_ignore_ascii_case(&ext))
    {
        FileCategory::Archive
    } else {
        FileCategory::Binary
    }
}

/// Extracts a summary for `path`. Archives are unpacked under `scratch_dir`.
pub fn extract(
    path: &Path,
    size_bytes: u64,
    config: &ExtractConfig,
    scratch_dir: &Path,
) -> ExtractionSummary {
    let category = categorize(path, config);
    let result = match category {
        FileCategory::Text => extract_text_file(path, config),
        FileCategory::Archive => extract_archive(path, config, scratch_dir),
        FileCategory::Binary => Ok(ExtractionSummary::Binary {
            size: size_bytes,
            extension: extension_of(path),
        }),
    };

    result.unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "extraction failed");
        ExtractionSummary::Failed {
            category,
            error: e.to_string(),
        }
    })
}

fn extract_text_file(path: &Path, config: &ExtractConfig) -> Result<ExtractionSummary, ExtractError> {
    let file = File::open(path)?;
    let mut bytes = Vec::new();
    BufReader::new(file)
        .take(config.max_text_bytes)
        .read_to_end(&mut bytes)?;
    // Undecodable sequences become U+FFFD rather than failing the file.
    let content = String::from_utf8_lossy(&bytes);
    Ok(summarize_text(&content, config))
}

/// Pattern summary of already-decoded text.
pub fn summarize_text(content: &str, config: &ExtractConfig) -> ExtractionSummary {
    let first = |re: &Regex| -> Vec<String> {
        re.find_iter(content)
            .take(config.max_matches)
            .map(|m| m.as_str().to_string())
            .collect()
    };

    let words: Vec<&str> = word_re().find_iter(content).map(|m| m.as_str()).collect();
    let sample_words = words
        .choose_multiple(&mut rand::rng(), config.sample_words)
        .map(|w| w.to_string())
        .collect();

    ExtractionSummary::Text {
        length: content.chars().count(),
        words_count: words.len(),
        emails: first(email_re()),
        phones: first(phone_re()),
        urls: first(url_re()),
        sample_words,
    }
}

/// Archive formats that can be unpacked. Other archive extensions are
/// recognised by [`categorize`] but end in a failed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
}

impl ArchiveFormat {
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            "zip" => Some(ArchiveFormat::Zip),
            "tar" => Some(ArchiveFormat::Tar),
            "gz" | "tgz" => Some(ArchiveFormat::TarGz),
            _ => None,
        }
    }
}

/// Scratch target for an archive: `scratch_dir/<file stem>`.
pub fn scratch_target(path: &Path, scratch_dir: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    scratch_dir.join(stem)
}

fn extract_archive(
    path: &Path,
    config: &ExtractConfig,
    scratch_dir: &Path,
) -> Result<ExtractionSummary, ExtractError> {
    let ext = extension_of(path);
    let Some(format) = ArchiveFormat::for_extension(&ext) else {
        return Err(ExtractError::UnsupportedArchive(ext));
    };

    let dest = scratch_target(path, scratch_dir);
    if dest.exists() {
        std::fs::remove_dir_all(&dest)?;
    }
    std::fs::create_dir_all(&dest)?;

    match format {
        ArchiveFormat::Zip => unpack_zip(path, &dest, config.max_archive_bytes)?,
        ArchiveFormat::Tar => unpack_tar(
            BufReader::new(File::open(path)?),
            &dest,
            config.max_archive_bytes,
        )?,
        ArchiveFormat::TarGz => unpack_tar(
            flate2::read::GzDecoder::new(BufReader::new(File::open(path)?)),
            &dest,
            config.max_archive_bytes,
        )?,
    }

    let extracted_files = WalkDir::new(&dest)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count();
    debug!(path = %path.display(), extracted_files, "archive unpacked");

    Ok(ExtractionSummary::Archive {
        extracted_files,
        extract_path: dest,
    })
}

fn unpack_zip(path: &Path, dest: &Path, max_bytes: u64) -> Result<(), ExtractError> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))
        .map_err(|e| ExtractError::Archive(e.to_string()))?;
    let mut budget = max_bytes;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let target = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        let written = std::io::copy(&mut (&mut entry).take(budget.saturating_add(1)), &mut out)?;
        if written > budget {
            return Err(ExtractError::TooLarge(max_bytes));
        }
        budget -= written;
    }
    Ok(())
}

fn unpack_tar<R: Read>(reader: R, dest: &Path, max_bytes: u64) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(reader);
    let mut budget = max_bytes;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let size = entry.size();
        if size > budget {
            return Err(ExtractError::TooLarge(max_bytes));
        }
        budget -= size;
        if !entry.unpack_in(dest)? {
            warn!(dest = %dest.display(), "skipping tar entry with unsafe path");
        }
    }
    Ok(())
}
