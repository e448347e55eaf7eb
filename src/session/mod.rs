//! Per-test session lifecycle

mod controller;
mod naming;

pub use controller::SessionController;
pub use naming::validate_session_name;
