use keyverify_types::{CancellationCode, Method};
use thiserror::Error;

/// Errors reported by request and verifier implementations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdapterError {
    #[error("verifier handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("verification step was already resolved")]
    AlreadyResolved,

    #[error("method {0} is not supported by both parties")]
    MethodNotSupported(Method),

    #[error("verification was cancelled ({0})")]
    Cancelled(CancellationCode),
}

/// Errors returned by orchestrator operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("orchestrator has been torn down")]
    TornDown,

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("config error: {0}")]
    Config(String),
}
