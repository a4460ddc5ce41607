//! Cancellation codes carried by a cancelled verification request.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Why a verification request was cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CancellationCode {
    Timeout,
    User,
    UnknownMethod,
    UnexpectedMessage,
    KeyMismatch,
    UserMismatch,
    MismatchedSas,
    MismatchedCommitment,
    InvalidMessage,
    Accepted,
    Other(String),
}

impl CancellationCode {
    pub fn as_str(&self) -> &str {
        match self {
            CancellationCode::Timeout => "m.timeout",
            CancellationCode::User => "m.user",
            CancellationCode::UnknownMethod => "m.unknown_method",
            CancellationCode::UnexpectedMessage => "m.unexpected_message",
            CancellationCode::KeyMismatch => "m.key_mismatch",
            CancellationCode::UserMismatch => "m.user_mismatch",
            CancellationCode::MismatchedSas => "m.mismatched_sas",
            CancellationCode::MismatchedCommitment => "m.mismatched_commitment",
            CancellationCode::InvalidMessage => "m.invalid_message",
            CancellationCode::Accepted => "m.accepted",
            CancellationCode::Other(code) => code,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CancellationCode::Timeout)
    }
}

impl From<&str> for CancellationCode {
    fn from(s: &str) -> Self {
        match s {
            "m.timeout" => CancellationCode::Timeout,
            "m.user" => CancellationCode::User,
            "m.unknown_method" => CancellationCode::UnknownMethod,
            "m.unexpected_message" => CancellationCode::UnexpectedMessage,
            "m.key_mismatch" => CancellationCode::KeyMismatch,
            "m.user_mismatch" => CancellationCode::UserMismatch,
            "m.mismatched_sas" => CancellationCode::MismatchedSas,
            "m.mismatched_commitment" => CancellationCode::MismatchedCommitment,
            "m.invalid_message" => CancellationCode::InvalidMessage,
            "m.accepted" => CancellationCode::Accepted,
            other => CancellationCode::Other(other.to_string()),
        }
    }
}

impl fmt::Display for CancellationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CancellationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CancellationCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(CancellationCode::from(code.as_str()))
    }
}
