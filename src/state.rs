//! Persistence of [`WatchState`] as a single JSON blob.
//!
//! The file is rewritten wholesale on every save: the new contents go to a
//! sibling temp file which is then renamed over the target.

use std::path::{Path, PathBuf};

use crate::error::WatchError;
use crate::models::WatchState;

/// Loads state from `path`. A missing file yields an empty state.
pub fn load(path: &Path) -> Result<WatchState, WatchError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WatchState::default()),
        Err(e) => return Err(WatchError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| WatchError::StateFormat {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save(path: &Path, state: &WatchState) -> Result<(), WatchError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WatchError::io(parent, e))?;
    }

    let json = serde_json::to_vec_pretty(state).map_err(|source| WatchError::StateFormat {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_path(path);
    std::fs::write(&tmp, json).map_err(|e| WatchError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| WatchError::io(path, e))?;
    Ok(())
}

/// Sibling file that `save` writes before renaming over `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}
