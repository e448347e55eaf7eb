//! Error types for Tapedeck

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for Tapedeck operations
pub type Result<T> = std::result::Result<T, TapedeckError>;

/// Boxed error produced by transports and body streams
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in Tapedeck
#[derive(Debug, Error)]
pub enum TapedeckError {
    /// Neither the current nor the legacy session file exists
    #[error(
        "Missing both new and old playback files: {} and {}",
        .current.display(),
        .legacy.display()
    )]
    StoreNotFound {
        /// Path derived from the session key
        current: PathBuf,
        /// Path derived from the bare test name
        legacy: PathBuf,
    },

    /// Session file exists but does not match the expected schema
    #[error("Session file {} is corrupt: {source}", .path.display())]
    StoreCorrupt {
        /// Offending file
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: BoxError,
    },

    /// No unconsumed recorded exchange matches an outgoing call
    #[error("No recorded exchange left for {method} {url}")]
    UnmatchedPlaybackRequest {
        /// Request method
        method: String,
        /// Request URL
        url: String,
    },

    /// Session file could not be written
    #[error("Unable to write session file {}: {source}", .path.display())]
    PersistenceFailure {
        /// Target file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Playback requested from a session that holds no recorded store
    #[error("Session '{0}' has no recorded store to play back from")]
    PlaybackUnavailable(String),

    /// A recorded response cannot be turned back into an HTTP response
    #[error("Invalid recorded response: {0}")]
    InvalidRecordedResponse(String),

    /// Invalid session or test name
    #[error("Invalid session name: {0}")]
    InvalidSessionName(String),

    /// Substitution pattern failed to compile
    #[error("Invalid substitution pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Failure reported by the real transport or a body stream
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
