//! Configuration types for Tapedeck

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, TapedeckError};

/// Environment variable that overrides the configured mode
pub const TEST_MODE_ENV: &str = "TAPEDECK_TEST_MODE";

/// Session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Record mode: forward calls to the network and capture them
    Record,
    /// Playback mode: serve calls from a session file
    Playback,
    /// Live mode: forward calls, capture nothing
    Live,
}

impl Mode {
    /// Check if mode is Record
    #[must_use]
    pub fn is_record(&self) -> bool {
        matches!(self, Mode::Record)
    }

    /// Check if mode is Playback
    #[must_use]
    pub fn is_playback(&self) -> bool {
        matches!(self, Mode::Playback)
    }

    /// Check if mode is Live
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Mode::Live)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Record => "record",
            Mode::Playback => "playback",
            Mode::Live => "live",
        };
        f.write_str(name)
    }
}

impl FromStr for Mode {
    type Err = TapedeckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Mode::Record),
            "playback" => Ok(Mode::Playback),
            "live" => Ok(Mode::Live),
            other => Err(TapedeckError::ConfigError(format!(
                "Unknown test mode '{other}', expected record, playback or live"
            ))),
        }
    }
}

/// Harness configuration, typically loaded from `tapedeck.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Default session mode
    pub mode: Mode,
    /// Test output root; session files live in `session-records/` below it
    pub output_dir: PathBuf,
    /// Substitution rules installed into every session, in order
    #[serde(default)]
    pub substitutions: Vec<SubstitutionConfig>,
}

/// A single substitution rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionConfig {
    /// Regular expression to search for
    pub pattern: String,
    /// Literal replacement text
    pub replacement: String,
}

impl HarnessConfig {
    /// Load configuration from TOML file
    ///
    /// A non-blank `TAPEDECK_TEST_MODE` replaces the file's `mode`.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed, or if the environment
    /// names an unknown mode
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to read config file: {e}")))?;

        content.parse::<Self>()?.with_env_override()
    }

    /// Apply the `TAPEDECK_TEST_MODE` override, if set
    ///
    /// # Errors
    ///
    /// Returns error if the variable holds an unknown mode
    pub fn with_env_override(mut self) -> Result<Self> {
        if let Some(mode) = mode_from_env()? {
            self.mode = mode;
        }
        Ok(self)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(TapedeckError::ConfigError(
                "output_dir cannot be empty".to_string(),
            ));
        }

        for (i, rule) in self.substitutions.iter().enumerate() {
            if rule.pattern.is_empty() {
                return Err(TapedeckError::ConfigError(format!(
                    "Substitution {i}: pattern cannot be empty"
                )));
            }

            regex::Regex::new(&rule.pattern).map_err(|e| {
                TapedeckError::ConfigError(format!("Substitution {i}: {e}"))
            })?;
        }

        Ok(())
    }

    /// Build a session context for a test under this configuration
    #[must_use]
    pub fn session(&self, test_name: &str) -> SessionContext {
        let mut context = SessionContext::new(test_name, self.mode, self.output_dir.clone());
        context.substitutions.clone_from(&self.substitutions);
        context
    }
}

impl FromStr for HarnessConfig {
    type Err = TapedeckError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| TapedeckError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }
}

/// Read the mode override from the environment
///
/// # Errors
///
/// Returns error if the variable is set to an unknown mode
pub fn mode_from_env() -> Result<Option<Mode>> {
    parse_mode_override(std::env::var(TEST_MODE_ENV).ok().as_deref())
}

/// Interpret a mode override value; unset and blank both mean no override
fn parse_mode_override(value: Option<&str>) -> Result<Option<Mode>> {
    match value {
        Some(value) if !value.trim().is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

/// Everything the surrounding test framework knows about one test session
#[derive(Debug, Clone)]
pub struct SessionContext {
    test_name: String,
    recording_name: Option<String>,
    mode: Mode,
    do_not_record: bool,
    output_dir: PathBuf,
    substitutions: Vec<SubstitutionConfig>,
}

impl SessionContext {
    /// Create a context for `test_name` in `mode`
    #[must_use]
    pub fn new(test_name: &str, mode: Mode, output_dir: PathBuf) -> Self {
        Self {
            test_name: test_name.to_string(),
            recording_name: None,
            mode,
            do_not_record: false,
            output_dir,
            substitutions: Vec::new(),
        }
    }

    /// Override the session key (e.g. test name plus iteration)
    #[must_use]
    pub fn with_recording_name(mut self, name: &str) -> Self {
        self.recording_name = Some(name.to_string());
        self
    }

    /// Opt the test out of recording and playback
    #[must_use]
    pub fn do_not_record(mut self, do_not_record: bool) -> Self {
        self.do_not_record = do_not_record;
        self
    }

    /// Append a substitution rule installed at session open
    #[must_use]
    pub fn with_substitution(mut self, pattern: &str, replacement: &str) -> Self {
        self.substitutions.push(SubstitutionConfig {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        });
        self
    }

    /// Bare test name
    #[must_use]
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Session key: the recording name override, or the test name
    #[must_use]
    pub fn session_key(&self) -> &str {
        match self.recording_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.test_name,
        }
    }

    /// Declared mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the test opted out
    #[must_use]
    pub fn is_do_not_record(&self) -> bool {
        self.do_not_record
    }

    /// Test output root
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Configured substitution rules
    #[must_use]
    pub fn substitutions(&self) -> &[SubstitutionConfig] {
        &self.substitutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use tempfile::NamedTempFile;

    // Tests reading or writing TAPEDECK_TEST_MODE take this lock
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config_file(toml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_config_parse() {
        let config_toml = r#"
            mode = "record"
            output_dir = "/tmp/out"

            [[substitutions]]
            pattern = "sub-[0-9a-f]{8}"
            replacement = "sub-test"
        "#;

        let config: HarnessConfig = config_toml.parse().unwrap();
        assert_eq!(config.mode, Mode::Record);
        assert_eq!(config.substitutions.len(), 1);
        assert_eq!(config.substitutions[0].replacement, "sub-test");
    }

    #[test]
    fn test_config_from_file() {
        let _env = lock_env();
        std::env::remove_var(TEST_MODE_ENV);
        let file = config_file(
            r#"
            mode = "playback"
            output_dir = "/tmp/out"
        "#,
        );

        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Playback);
        assert!(config.substitutions.is_empty());
    }

    #[test]
    fn test_mode_override_values() {
        assert_eq!(parse_mode_override(None).unwrap(), None);
        assert_eq!(parse_mode_override(Some("")).unwrap(), None);
        assert_eq!(parse_mode_override(Some("   ")).unwrap(), None);
        assert_eq!(parse_mode_override(Some("LIVE")).unwrap(), Some(Mode::Live));
        assert!(matches!(
            parse_mode_override(Some("replay")),
            Err(TapedeckError::ConfigError(_))
        ));
    }

    #[test]
    fn test_env_overrides_file_mode() {
        let _env = lock_env();
        let file = config_file(
            r#"
            mode = "playback"
            output_dir = "/tmp/out"
        "#,
        );

        std::env::set_var(TEST_MODE_ENV, "record");
        assert_eq!(mode_from_env().unwrap(), Some(Mode::Record));
        let config = HarnessConfig::from_file(file.path()).unwrap();
        assert_eq!(config.mode, Mode::Record);
        assert_eq!(config.session("t1").mode(), Mode::Record);

        std::env::set_var(TEST_MODE_ENV, " ");
        assert_eq!(mode_from_env().unwrap(), None);
        assert_eq!(HarnessConfig::from_file(file.path()).unwrap().mode, Mode::Playback);

        std::env::set_var(TEST_MODE_ENV, "replay");
        assert!(mode_from_env().is_err());
        assert!(HarnessConfig::from_file(file.path()).is_err());

        std::env::remove_var(TEST_MODE_ENV);
        assert_eq!(mode_from_env().unwrap(), None);
        let config = HarnessConfig::from_file(file.path())
            .unwrap()
            .with_env_override()
            .unwrap();
        assert_eq!(config.mode, Mode::Playback);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let config_toml = r#"
            mode = "record"
            output_dir = "/tmp/out"

            [[substitutions]]
            pattern = "sub-[0-9"
            replacement = "x"
        "#;

        assert!(config_toml.parse::<HarnessConfig>().is_err());
    }

    #[test]
    fn test_empty_output_dir_rejected() {
        let config = HarnessConfig {
            mode: Mode::Live,
            output_dir: PathBuf::new(),
            substitutions: vec![],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("RECORD".parse::<Mode>().unwrap(), Mode::Record);
        assert_eq!(" playback ".parse::<Mode>().unwrap(), Mode::Playback);
        assert_eq!("Live".parse::<Mode>().unwrap(), Mode::Live);
        assert!("replay".parse::<Mode>().is_err());
        assert_eq!(Mode::Playback.to_string(), "playback");
    }

    #[test]
    fn test_session_key_override() {
        let context = SessionContext::new("lists_widgets", Mode::Playback, PathBuf::from("/tmp"));
        assert_eq!(context.session_key(), "lists_widgets");

        let context = context.with_recording_name("lists_widgets[1]");
        assert_eq!(context.session_key(), "lists_widgets[1]");
        assert_eq!(context.test_name(), "lists_widgets");

        let context = context.with_recording_name("");
        assert_eq!(context.session_key(), "lists_widgets");
    }

    #[test]
    fn test_session_inherits_substitutions() {
        let config = HarnessConfig {
            mode: Mode::Record,
            output_dir: PathBuf::from("/tmp/out"),
            substitutions: vec![SubstitutionConfig {
                pattern: "a".to_string(),
                replacement: "b".to_string(),
            }],
        };

        let context = config.session("t1");
        assert_eq!(context.mode(), Mode::Record);
        assert_eq!(context.substitutions(), config.substitutions.as_slice());
    }
}
