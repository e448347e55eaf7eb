//! Record mode: capture outgoing calls into a session's store

mod capture;

pub use capture::CapturePolicy;
