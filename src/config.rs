use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_path: default_state_path(),
            scratch_dir: default_scratch_dir(),
            interval_secs: default_interval_secs(),
            retry_secs: default_retry_secs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

impl WatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn retry(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("training_data")
}
fn default_state_path() -> PathBuf {
    PathBuf::from("knowledge/state.json")
}
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("extracted")
}
fn default_interval_secs() -> u64 {
    60
}
fn default_retry_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    /// Extensions categorized as archives. Only `zip`, `tar`, `gz` and `tgz`
    /// can be unpacked; any other listed extension yields a failed summary.
    #[serde(default = "default_archive_extensions")]
    pub archive_extensions: Vec<String>,
    #[serde(default = "default_max_matches")]
    pub max_matches: usize,
    #[serde(default = "default_sample_words")]
    pub sample_words: usize,
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: u64,
    #[serde(default = "default_max_archive_bytes")]
    pub max_archive_bytes: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            text_extensions: default_text_extensions(),
            archive_extensions: default_archive_extensions(),
            max_matches: default_max_matches(),
            sample_words: default_sample_words(),
            max_text_bytes: default_max_text_bytes(),
            max_archive_bytes: default_max_archive_bytes(),
        }
    }
}

fn default_text_extensions() -> Vec<String> {
    ["txt", "md", "json", "xml", "html", "htm", "py", "js", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_archive_extensions() -> Vec<String> {
    ["zip", "tar", "gz", "tgz", "rar", "7z"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_max_matches() -> usize {
    10
}
fn default_sample_words() -> usize {
    20
}
fn default_max_text_bytes() -> u64 {
    16 * 1024 * 1024
}
fn default_max_archive_bytes() -> u64 {
    256 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// Configuration with every default applied.
    pub fn minimal() -> Self {
        Self {
            watch: WatchConfig::default(),
            extract: ExtractConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Defaults rooted at `root`, with state and scratch kept beside it.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let base = root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let mut config = Self::minimal();
        config.watch.state_path = base.join("knowledge").join("state.json");
        config.watch.scratch_dir = base.join("extracted");
        config.watch.root = root;
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch.interval_secs == 0 {
            anyhow::bail!("watch.interval_secs must be > 0");
        }
        if self.watch.retry_secs == 0 {
            anyhow::bail!("watch.retry_secs must be > 0");
        }
        if self.extract.max_text_bytes == 0 {
            anyhow::bail!("extract.max_text_bytes must be > 0");
        }
        if self.extract.max_archive_bytes == 0 {
            anyhow::bail!("extract.max_archive_bytes must be > 0");
        }
        if path_inside(&self.watch.scratch_dir, &self.watch.root) {
            anyhow::bail!(
                "watch.scratch_dir ({}) must not be inside watch.root ({})",
                self.watch.scratch_dir.display(),
                self.watch.root.display()
            );
        }
        if path_inside(&self.watch.state_path, &self.watch.root) {
            anyhow::bail!(
                "watch.state_path ({}) must not be inside watch.root ({})",
                self.watch.state_path.display(),
                self.watch.root.display()
            );
        }
        Ok(())
    }
}

/// Absolute form of `path` with `.` and `..` resolved, without touching the
/// filesystem. Relative paths are taken against the current directory.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let above_start =
                    matches!(out.components().next_back(), Some(Component::ParentDir));
                if above_start || (!out.pop() && !out.has_root()) {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn path_inside(candidate: &Path, root: &Path) -> bool {
    let root = normalize_path(root);
    !root.as_os_str().is_empty() && normalize_path(candidate).starts_with(&root)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Loads `path`, or falls back to defaults when `path` is the implicit
/// default location and nothing exists there.
pub fn load_or_default(path: &Path, explicit: bool) -> Result<Config> {
    if !explicit && !path.exists() {
        let config = Config::minimal();
        config.validate()?;
        return Ok(config);
    }
    load_config(path)
}
