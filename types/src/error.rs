//! Top-level error type for parsing shared types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),

    #[error("unknown phase: {0}")]
    UnknownPhase(String),
}
