//! Pre-built [`tracing::Span`] constructors for verification operations.
//!
//! Consistent span names and field sets make it easy to correlate one
//! request's log lines across binding, handshake and user intents.

use keyverify_types::{Method, Phase, UserId};
use tracing::{debug_span, info_span, Span};

/// Span covering the lifetime of one orchestrator bound to one request.
pub fn request_span(other_user: &UserId, is_self_verification: bool) -> Span {
    info_span!(
        "verification_request",
        other_user = %other_user,
        self_verification = is_self_verification
    )
}

/// Span covering a single verifier handshake (`verify()` call).
pub fn handshake_span(generation: u64, origin: &str) -> Span {
    info_span!("handshake", generation = generation, origin = %origin)
}

/// Span covering the handling of one user intent.
pub fn intent_span(intent: &str) -> Span {
    info_span!("intent", intent = %intent)
}

/// Span covering one render-mode derivation.
pub fn render_span(phase: Phase, method: Option<&Method>) -> Span {
    debug_span!(
        "render",
        phase = %phase,
        method = %method.map(Method::as_str).unwrap_or("none")
    )
}
