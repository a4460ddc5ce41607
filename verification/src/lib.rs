//! Interactive key verification orchestration.
//!
//! A verification request moves through phases driven by the other party,
//! while its verifier (SAS or QR reciprocation) emits its own one-shot
//! events. [`VerificationOrchestrator`] reconciles both with user intents
//! into a single [`RenderMode`]:
//!
//! 1. **Bind**: subscribe to the request's `change` event.
//! 2. **Verifier appears**: subscribe to `show_sas` / `show_reciprocate_qr`
//!    exactly once and start the handshake.
//! 3. **Verifier update**: capture the event snapshot, release the subscriptions.
//! 4. **Intents**: start SAS, confirm / mismatch SAS, confirm / cancel QR
//!    reciprocation, forwarded to the captured event.
//!
//! The cryptography itself lives behind the [`adapter`] traits.

pub mod adapter;
pub mod config;
pub mod error;
pub mod listener;
pub mod method;
pub mod orchestrator;
pub mod panel;
pub mod render;
pub mod state;

pub use adapter::{
    ReciprocateCallbacks, ReciprocateQrEvent, SasCallbacks, SasEvent, VerificationRequest,
    Verifier, VerifierEventKind,
};
pub use config::{PanelConfig, PanelLayout};
pub use error::{AdapterError, OrchestratorError};
pub use listener::{Listener, ListenerRegistry, SubscriptionId};
pub use method::MethodCatalog;
pub use orchestrator::{IntentOutcome, PanelIntent, RenderUpdate, VerificationOrchestrator};
pub use panel::{
    cancellation_message, describe, ButtonKind, DeviceInfo, PanelButton, PanelContext, PanelSection,
    PanelView,
};
pub use render::{
    derive_render_mode, CancelReason, CancelledBy, MethodChoice, RenderMode, RequestFacts,
};
pub use state::{HandshakeOrigin, HandshakeOutcome, OrchestratorState, VerifierBinding};
