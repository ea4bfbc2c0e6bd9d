//! Tracing and logging (shared setup).

pub use self::tracing::{LogFormat, UnknownLogFormat, init};

/// Tracing configuration (filters, layers).
pub mod tracing;
