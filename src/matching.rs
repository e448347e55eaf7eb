//! Playback matching rules
//!
//! A recorded exchange matches an outgoing call when the methods agree
//! (ignoring case) and both URLs are equal after the substitution rules have
//! run over them. Further dimensions plug in through [`RequestMatcher`].

use crate::pipeline::HttpRequest;
use crate::storage::{header_value, headers_from_map, Exchange, Headers};
use crate::substitution::Ruleset;

/// The outgoing call being resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Request method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    pub headers: Headers,
}

impl Candidate {
    /// Candidate with no headers
    #[must_use]
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_string(),
            url: url.to_string(),
            headers: Vec::new(),
        }
    }

    /// Candidate describing an outgoing request
    #[must_use]
    pub fn from_request(request: &HttpRequest) -> Self {
        Self {
            method: request.method().as_str().to_string(),
            url: request.uri().to_string(),
            headers: headers_from_map(request.headers()),
        }
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Copy with URL and header values run through `rules`
    #[must_use]
    pub fn normalized(&self, rules: &Ruleset) -> Self {
        Self {
            method: self.method.clone(),
            url: rules.apply(&self.url),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), rules.apply(value)))
                .collect(),
        }
    }
}

/// Decides whether a recorded exchange answers a candidate
///
/// `candidate` has already been normalized; implementations normalize the
/// recorded side with `rules` themselves.
pub trait RequestMatcher: Send + Sync {
    /// Whether `recorded` answers `candidate`
    fn matches(&self, recorded: &Exchange, candidate: &Candidate, rules: &Ruleset) -> bool;
}

/// Compare method and normalized URL
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodAndUrl;

impl RequestMatcher for MethodAndUrl {
    fn matches(&self, recorded: &Exchange, candidate: &Candidate, rules: &Ruleset) -> bool {
        recorded.method.eq_ignore_ascii_case(&candidate.method)
            && rules.apply(&recorded.url) == candidate.url
    }
}

/// Compare method, normalized URL, and a fixed set of request headers
///
/// A header absent on both sides counts as equal.
#[derive(Debug, Clone, Default)]
pub struct MethodUrlAndHeaders {
    headers: Vec<String>,
}

impl MethodUrlAndHeaders {
    /// Also compare the named headers
    #[must_use]
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }
}

impl RequestMatcher for MethodUrlAndHeaders {
    fn matches(&self, recorded: &Exchange, candidate: &Candidate, rules: &Ruleset) -> bool {
        if !MethodAndUrl.matches(recorded, candidate, rules) {
            return false;
        }

        self.headers.iter().all(|name| {
            let recorded_value = recorded.request_header(name).map(|v| rules.apply(v));
            let candidate_value = header_value(&candidate.headers, name);
            recorded_value.as_deref() == candidate_value
        })
    }
}
