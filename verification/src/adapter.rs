//! Interfaces to the request and verifier objects owned by the session.
//!
//! The orchestrator never owns either side. It subscribes, reads, and calls
//! action methods through these traits; the surrounding crypto subsystem
//! provides the implementations.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use keyverify_types::{CancellationCode, DeviceId, Method, Phase, QrCodeData, Sas, UserId};

use crate::error::AdapterError;
use crate::listener::{Listener, SubscriptionId};

/// The two one-shot events a verifier emits while its handshake runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerifierEventKind {
    /// The short authentication string is ready to compare.
    ShowSas,
    /// The other party scanned our QR code and we must confirm the match.
    ShowReciprocateQr,
}

impl VerifierEventKind {
    pub const ALL: [VerifierEventKind; 2] =
        [VerifierEventKind::ShowSas, VerifierEventKind::ShowReciprocateQr];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerifierEventKind::ShowSas => "show_sas",
            VerifierEventKind::ShowReciprocateQr => "show_reciprocate_qr",
        }
    }
}

impl fmt::Display for VerifierEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions available once the SAS is on screen.
pub trait SasCallbacks: Send + Sync {
    /// The emoji match on both devices.
    fn confirm(&self) -> Result<(), AdapterError>;
    /// The emoji differ.
    fn mismatch(&self) -> Result<(), AdapterError>;
    fn cancel(&self) -> Result<(), AdapterError>;
}

/// Actions available once the peer reports having scanned our QR code.
pub trait ReciprocateCallbacks: Send + Sync {
    fn confirm(&self) -> Result<(), AdapterError>;
    fn cancel(&self) -> Result<(), AdapterError>;
}

/// Captured `show_sas` event: a copy of the SAS plus a handle to its actions.
#[derive(Clone)]
pub struct SasEvent {
    sas: Sas,
    callbacks: Arc<dyn SasCallbacks>,
}

impl SasEvent {
    pub fn new(sas: Sas, callbacks: Arc<dyn SasCallbacks>) -> Self {
        Self { sas, callbacks }
    }

    pub fn sas(&self) -> &Sas {
        &self.sas
    }

    pub fn confirm(&self) -> Result<(), AdapterError> {
        self.callbacks.confirm()
    }

    pub fn mismatch(&self) -> Result<(), AdapterError> {
        self.callbacks.mismatch()
    }

    pub fn cancel(&self) -> Result<(), AdapterError> {
        self.callbacks.cancel()
    }
}

impl fmt::Debug for SasEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasEvent").field("sas", &self.sas).finish_non_exhaustive()
    }
}

/// Captured `show_reciprocate_qr` event.
#[derive(Clone)]
pub struct ReciprocateQrEvent {
    callbacks: Arc<dyn ReciprocateCallbacks>,
}

impl ReciprocateQrEvent {
    pub fn new(callbacks: Arc<dyn ReciprocateCallbacks>) -> Self {
        Self { callbacks }
    }

    pub fn confirm(&self) -> Result<(), AdapterError> {
        self.callbacks.confirm()
    }

    pub fn cancel(&self) -> Result<(), AdapterError> {
        self.callbacks.cancel()
    }
}

impl fmt::Debug for ReciprocateQrEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReciprocateQrEvent").finish_non_exhaustive()
    }
}

/// The sub-protocol handler for one chosen method.
pub trait Verifier: Send + Sync {
    fn method(&self) -> Method;

    /// Set by the verifier at most once per run, when `show_sas` fires.
    fn sas_event(&self) -> Option<SasEvent>;

    /// Set by the verifier at most once per run, when `show_reciprocate_qr` fires.
    fn reciprocate_qr_event(&self) -> Option<ReciprocateQrEvent>;

    /// Run the handshake.
    ///
    /// Calling this more than once must not start a second handshake:
    /// every caller observes the outcome of the same run.
    fn verify(&self) -> BoxFuture<'static, Result<(), AdapterError>>;

    fn subscribe(&self, kind: VerifierEventKind, listener: Listener) -> SubscriptionId;

    /// Returns `false` if `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// The protocol-level negotiation object between two parties.
///
/// A request emits a single `change` event whenever any attribute may have
/// changed, including the appearance of its verifier.
pub trait VerificationRequest: Send + Sync {
    fn phase(&self) -> Phase;

    /// Only set once the phase reaches [`Phase::Started`].
    fn chosen_method(&self) -> Option<Method>;

    fn other_party_supports_method(&self, method: &Method) -> bool;

    fn qr_code_data(&self) -> Option<QrCodeData>;

    fn is_self_verification(&self) -> bool;

    fn other_user_id(&self) -> UserId;

    fn other_device_id(&self) -> Option<DeviceId>;

    fn cancellation_code(&self) -> Option<CancellationCode>;

    fn cancelling_user_id(&self) -> Option<UserId>;

    /// May appear at any time after construction.
    fn verifier(&self) -> Option<Arc<dyn Verifier>>;

    fn begin_key_verification(&self, method: Method) -> Result<Arc<dyn Verifier>, AdapterError>;

    fn on_change(&self, listener: Listener) -> SubscriptionId;

    fn off_change(&self, id: SubscriptionId) -> bool;
}
