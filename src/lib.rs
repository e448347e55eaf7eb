//! Tapedeck - record/playback harness for HTTP client tests
//!
//! A [`SessionController`] is opened once per test. In record mode its
//! capture policy sits in the client's pipeline and stores every exchange;
//! in playback mode its resolver replaces the network transport and answers
//! each call from the session file, consuming every recorded exchange at
//! most once.

#![deny(unsafe_code)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod matching;
pub mod network;
pub mod pipeline;
pub mod recording;
pub mod replay;
pub mod session;
pub mod storage;
pub mod substitution;

pub use config::{HarnessConfig, Mode, SessionContext};
pub use error::{Result, TapedeckError};
pub use session::SessionController;

/// Install a `tracing` subscriber honoring `RUST_LOG`
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    // Err means an earlier test already installed the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
