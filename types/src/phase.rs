//! Lifecycle phase of a verification request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Coarse-grained lifecycle stage of a verification request.
///
/// Owned by the request; in practice it only moves forward, but consumers
/// must render correctly on any value at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Created locally, not yet sent to the other party.
    Unsent,
    /// Sent or received, waiting for the other party to accept.
    Requested,
    /// Both parties accepted; a method can be chosen.
    Ready,
    /// A method was chosen and its verifier is running.
    Started,
    /// Verification completed successfully.
    Done,
    /// Verification was cancelled by either party or timed out.
    Cancelled,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Unsent,
        Phase::Requested,
        Phase::Ready,
        Phase::Started,
        Phase::Done,
        Phase::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Unsent => "unsent",
            Phase::Requested => "requested",
            Phase::Ready => "ready",
            Phase::Started => "started",
            Phase::Done => "done",
            Phase::Cancelled => "cancelled",
        }
    }

    /// Whether no further phase change is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Cancelled)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| TypesError::UnknownPhase(s.to_string()))
    }
}
