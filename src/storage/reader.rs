//! Session file reader

use std::path::{Path, PathBuf};

use tracing::info;

use super::format::RecordedData;
use super::store::RecordedStore;
use crate::{Result, TapedeckError};

/// Pick the session file to play back from
///
/// The file named after the session key wins; the file named after the bare
/// test name is the fallback for recordings made before keys were overridable.
///
/// # Errors
///
/// Returns `StoreNotFound` if neither file exists
pub fn locate_session_file(folder: &Path, session_key: &str, test_name: &str) -> Result<PathBuf> {
    let current = super::session_file(folder, session_key);
    let legacy = super::session_file(folder, test_name);

    if current.is_file() {
        info!("==> Playback file path: {}", current.display());
        return Ok(current);
    }

    if legacy.is_file() {
        info!("==> Playback file path: {}", legacy.display());
        return Ok(legacy);
    }

    Err(TapedeckError::StoreNotFound { current, legacy })
}

/// Load a store from a session file
///
/// Accepts both pretty-printed and compact JSON.
///
/// # Errors
///
/// Returns `StoreCorrupt` if the file does not match the session schema, or
/// an I/O error if it cannot be read
pub fn read_store(path: &Path) -> Result<RecordedStore> {
    let content = std::fs::read(path)?;

    let data: RecordedData =
        serde_json::from_slice(&content).map_err(|e| TapedeckError::StoreCorrupt {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;

    let store = RecordedStore::from_data(data).map_err(|e| TapedeckError::StoreCorrupt {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    info!(
        "Loaded session '{}': {} exchanges, {} variables",
        path.display(),
        store.len(),
        store.variable_count()
    );

    Ok(store)
}
