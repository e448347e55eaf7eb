//! Playback mode: answer outgoing calls from a session's store

mod resolver;

pub use resolver::PlaybackResolver;
