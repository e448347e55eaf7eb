//! Session name checks
//!
//! Session keys are opaque to the harness; the only requirement is that
//! `<name>.json` names a file directly inside the record folder.

use crate::{Result, TapedeckError};

/// Characters that would place the session file outside the record folder
const FORBIDDEN: [char; 3] = ['/', '\\', '\0'];

/// Check that a session key or test name can name a session file
///
/// # Errors
///
/// Returns `InvalidSessionName` for an empty name, the name `..`, or a name
/// holding a path separator or NUL
pub fn validate_session_name(name: &str) -> Result<()> {
    let reason = match name {
        "" => "is empty".to_string(),
        ".." => "refers to the parent folder".to_string(),
        _ => match name.chars().find(|c| FORBIDDEN.contains(c)) {
            Some(c) => format!("contains {c:?}"),
            None => return Ok(()),
        },
    };

    Err(TapedeckError::InvalidSessionName(format!(
        "session name {name:?} {reason}"
    )))
}
