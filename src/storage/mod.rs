//! Recorded exchange storage and its JSON session files

mod exchange;
mod format;
mod reader;
mod store;
mod writer;

use std::path::{Path, PathBuf};

pub use exchange::{
    header_value, headers_from_map, headers_to_map, Exchange, Headers, RecordedResponse,
};
pub use format::{BodyEncoding, NetworkCallRecord, RecordedData, ResponseRecord};
pub use reader::{locate_session_file, read_store};
pub use store::RecordedStore;
pub use writer::write_store;

/// Folder below the test output root that holds session files
pub const RECORD_FOLDER: &str = "session-records";

/// Session file extension
pub const SESSION_FILE_EXTENSION: &str = "json";

/// Folder holding session files for an output root
#[must_use]
pub fn record_folder(output_dir: &Path) -> PathBuf {
    output_dir.join(RECORD_FOLDER)
}

/// Session file for a name inside `folder`
#[must_use]
pub fn session_file(folder: &Path, name: &str) -> PathBuf {
    folder.join(format!("{name}.{SESSION_FILE_EXTENSION}"))
}
