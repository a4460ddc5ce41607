//! Shared utilities for keyverify.

pub mod logging;
pub mod spans;

pub use logging::{init_logging, LogFormat, UnknownLogFormat};
