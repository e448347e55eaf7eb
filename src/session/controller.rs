//! Session controller: one per test, owns the recorded store
//!
//! - In playback mode the store is loaded from
//!   `<output_dir>/session-records/<session_key>.json`, falling back to
//!   `<test_name>.json`.
//! - In record mode an empty store is created and written to
//!   `<session_key>.json` when the session closes.
//! - In live mode, or when the test opted out, there is no store at all.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info};

use super::naming::validate_session_name;
use crate::config::{Mode, SessionContext};
use crate::matching::{MethodAndUrl, RequestMatcher};
use crate::recording::CapturePolicy;
use crate::replay::PlaybackResolver;
use crate::storage::{
    locate_session_file, read_store, record_folder, session_file, write_store, RecordedStore,
};
use crate::substitution::Ruleset;
use crate::Result;

/// Lifecycle owner for a single test's recording or playback
///
/// Closing persists the store in record mode. Dropping the controller closes
/// it if the test did not, so every exit path releases the session.
pub struct SessionController {
    test_name: String,
    session_key: String,
    mode: Mode,
    record_folder: PathBuf,
    allowed_to_read: bool,
    allowed_to_record: bool,
    store: Option<Arc<RecordedStore>>,
    rules: Arc<Ruleset>,
    matcher: Arc<dyn RequestMatcher>,
    closed: AtomicBool,
}

impl SessionController {
    /// Open a session in the context's declared mode
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` or `StoreCorrupt` in playback mode when the
    /// session file is missing or unreadable, `InvalidSessionName` for names
    /// that cannot be file names, and `InvalidPattern` for bad configured rules
    pub fn open(context: &SessionContext) -> Result<Self> {
        Self::build(context, context.mode(), Ruleset::new())
    }

    /// Open a playback session seeded with substitution rules
    ///
    /// The context's mode is ignored; its opt-out flag still applies.
    ///
    /// # Errors
    ///
    /// Same as [`SessionController::open`]
    pub fn playback_with_rules<I, P, R>(context: &SessionContext, rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: AsRef<str>,
    {
        let ruleset = Ruleset::new();
        for (pattern, replacement) in rules {
            ruleset.add(pattern.as_ref(), replacement.as_ref())?;
        }

        Self::build(context, Mode::Playback, ruleset)
    }

    fn build(context: &SessionContext, mode: Mode, rules: Ruleset) -> Result<Self> {
        let test_name = context.test_name();
        let session_key = context.session_key();
        validate_session_name(test_name)?;
        validate_session_name(session_key)?;

        for rule in context.substitutions() {
            rules.add(&rule.pattern, &rule.replacement)?;
        }

        let allowed_to_read = mode.is_playback() && !context.is_do_not_record();
        let allowed_to_record = mode.is_record() && !context.is_do_not_record();
        let record_folder = record_folder(context.output_dir());

        let store = if allowed_to_read {
            let path = locate_session_file(&record_folder, session_key, test_name)?;
            Some(Arc::new(read_store(&path)?))
        } else if allowed_to_record {
            Some(Arc::new(RecordedStore::new()))
        } else {
            None
        };

        info!(
            "Opened session '{}' in {} mode (store: {})",
            session_key,
            mode,
            if store.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            test_name: test_name.to_string(),
            session_key: session_key.to_string(),
            mode,
            record_folder,
            allowed_to_read,
            allowed_to_record,
            store,
            rules: Arc::new(rules),
            matcher: Arc::new(MethodAndUrl),
            closed: AtomicBool::new(false),
        })
    }

    /// Session mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the session is in playback mode
    #[must_use]
    pub fn is_playback_mode(&self) -> bool {
        self.mode.is_playback()
    }

    /// Whether the session is in live mode
    #[must_use]
    pub fn is_live_mode(&self) -> bool {
        self.mode.is_live()
    }

    /// Whether the session is in record mode
    #[must_use]
    pub fn is_record_mode(&self) -> bool {
        self.mode.is_record()
    }

    /// Bare test name
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Key the session file is stored under
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Folder holding session files
    #[must_use]
    pub fn record_folder(&self) -> &Path {
        &self.record_folder
    }

    /// File the session is persisted to in record mode
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        session_file(&self.record_folder, &self.session_key)
    }

    /// The recorded store; absent in live mode or when opted out
    #[must_use]
    pub fn store(&self) -> Option<&Arc<RecordedStore>> {
        self.store.as_ref()
    }

    /// The session's substitution rules
    #[must_use]
    pub fn rules(&self) -> &Arc<Ruleset> {
        &self.rules
    }

    /// Policy to wire into the client's pipeline
    ///
    /// Captures only in record mode; otherwise it forwards untouched.
    #[must_use]
    pub fn capture_policy(&self) -> CapturePolicy {
        let store = if self.allowed_to_record {
            self.store.clone()
        } else {
            None
        };
        CapturePolicy::new(store, Arc::clone(&self.rules))
    }

    /// Transport to use in place of the network in playback mode
    #[must_use]
    pub fn playback_transport(&self) -> PlaybackResolver {
        let store = if self.allowed_to_read {
            self.store.clone()
        } else {
            None
        };
        PlaybackResolver::new(
            &self.session_key,
            store,
            Arc::clone(&self.rules),
            Arc::clone(&self.matcher),
        )
    }

    /// Append a substitution rule for the rest of the session
    ///
    /// # Errors
    ///
    /// Returns error if `pattern` is not a valid regular expression
    pub fn add_substitution_rule(&self, pattern: &str, replacement: &str) -> Result<()> {
        self.rules.add(pattern, replacement)?;
        debug!("Added substitution rule '{}' -> '{}'", pattern, replacement);
        Ok(())
    }

    /// Replace the matcher used by resolvers created after this call
    pub fn set_matcher(&mut self, matcher: impl RequestMatcher + 'static) {
        self.matcher = Arc::new(matcher);
    }

    /// Whether the session has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release the session, persisting the store in record mode
    ///
    /// Only the first call does anything.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if the session file cannot be written
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if !self.allowed_to_record {
            return Ok(());
        }

        match self.store.as_ref() {
            Some(store) => write_store(&self.session_file(), store),
            None => Ok(()),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close session '{}': {}", self.session_key, e);
        }
    }
}
