//! Ordered text substitution rules
//!
//! Rules normalize environment-specific text (subscription IDs, generated
//! names, ports) so that a call issued against one environment matches a
//! recording made against another. They are applied to copies used for
//! matching and recording; the transport payload is left alone.

use std::borrow::Cow;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use regex::{NoExpand, Regex};

use crate::Result;

/// A regular expression and its literal replacement
#[derive(Debug, Clone)]
pub struct SubstitutionRule {
    pattern: Regex,
    replacement: String,
}

impl SubstitutionRule {
    /// Compile a new rule
    ///
    /// # Errors
    ///
    /// Returns error if `pattern` is not a valid regular expression
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    /// Source of the pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Replacement text
    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    /// Replace every match in `input`
    #[must_use]
    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.pattern
            .replace_all(input, NoExpand(&self.replacement))
    }
}

/// Ordered, shareable sequence of substitution rules
///
/// Rules added after a capture policy or playback resolver was built still
/// apply to every later call.
#[derive(Debug, Default)]
pub struct Ruleset {
    rules: RwLock<Vec<SubstitutionRule>>,
}

impl Ruleset {
    /// Create an empty ruleset
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and append a rule
    ///
    /// # Errors
    ///
    /// Returns error if `pattern` is not a valid regular expression
    pub fn add(&self, pattern: &str, replacement: &str) -> Result<()> {
        self.push(SubstitutionRule::new(pattern, replacement)?);
        Ok(())
    }

    /// Append an already compiled rule
    pub fn push(&self, rule: SubstitutionRule) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rule);
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no rules are installed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Apply every rule in order, each to the output of the previous one
    #[must_use]
    pub fn apply(&self, input: &str) -> String {
        let rules = self.read();
        let mut output = Cow::Borrowed(input);

        for rule in rules.iter() {
            let replaced = match rule.apply(&output) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = replaced {
                output = Cow::Owned(s);
            }
        }

        output.into_owned()
    }

    /// Apply the rules to a body if it is UTF-8 text; binary bodies pass through
    #[must_use]
    pub fn apply_body<'a>(&self, body: &'a [u8]) -> Cow<'a, [u8]> {
        if self.is_empty() {
            return Cow::Borrowed(body);
        }

        match std::str::from_utf8(body) {
            Ok(text) => {
                let replaced = self.apply(text);
                if replaced == text {
                    Cow::Borrowed(body)
                } else {
                    Cow::Owned(replaced.into_bytes())
                }
            }
            Err(_) => Cow::Borrowed(body),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<SubstitutionRule>> {
        self.rules.read().unwrap_or_else(PoisonError::into_inner)
    }
}
