//! Network transport for record and live modes

mod client;

pub use client::HyperTransport;

/// Idle pooled connections are dropped after this many seconds
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Maximum idle pooled connections kept per host
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;
