//! Session file writer

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info};

use super::store::RecordedStore;
use crate::{Result, TapedeckError};

/// Persist a store as pretty-printed JSON, replacing any existing file
///
/// The content goes to a sibling temporary file first and is renamed into
/// place, so a failed write never leaves a truncated session file behind.
///
/// # Errors
///
/// Returns `PersistenceFailure` if the folder or file cannot be written
pub fn write_store(path: &Path, store: &RecordedStore) -> Result<()> {
    let failure = |source: io::Error| TapedeckError::PersistenceFailure {
        path: path.to_path_buf(),
        source,
    };

    if let Some(folder) = path.parent() {
        if !folder.exists() {
            fs::create_dir_all(folder).map_err(failure)?;
            debug!("Created directory: {}", folder.display());
        }
    }

    let data = store.to_data();
    let content = serde_json::to_vec_pretty(&data)
        .map_err(|e| failure(io::Error::new(io::ErrorKind::InvalidData, e)))?;

    let staging = path.with_extension("json.tmp");
    fs::write(&staging, content).map_err(failure)?;
    fs::rename(&staging, path).map_err(failure)?;

    info!(
        "==> Playback file path: {} ({} exchanges)",
        path.display(),
        data.network_call_records.len()
    );

    Ok(())
}
