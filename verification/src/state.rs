//! Orchestrator-owned state and verifier binding bookkeeping.

use std::sync::{Arc, Weak};

use keyverify_types::Method;

use crate::adapter::{ReciprocateQrEvent, SasEvent, Verifier};
use crate::error::AdapterError;
use crate::listener::SubscriptionId;

/// Transient UI-relevant state, one instance per request.
///
/// Only the orchestrator's own handlers mutate it.
#[derive(Clone, Debug, Default)]
pub struct OrchestratorState {
    sas_event: Option<SasEvent>,
    reciprocate_qr_event: Option<ReciprocateQrEvent>,
    emoji_button_clicked: bool,
    reciprocate_button_clicked: bool,
}

impl OrchestratorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sas_event(&self) -> Option<&SasEvent> {
        self.sas_event.as_ref()
    }

    pub fn reciprocate_qr_event(&self) -> Option<&ReciprocateQrEvent> {
        self.reciprocate_qr_event.as_ref()
    }

    pub fn emoji_button_clicked(&self) -> bool {
        self.emoji_button_clicked
    }

    pub fn reciprocate_button_clicked(&self) -> bool {
        self.reciprocate_button_clicked
    }

    /// Copy the events a verifier currently exposes.
    ///
    /// At most one event is kept. If the verifier exposes both, the one
    /// matching `chosen` wins, SAS otherwise. A verifier exposing neither
    /// leaves the previous capture in place. Returns whether anything changed.
    pub(crate) fn capture(
        &mut self,
        sas: Option<SasEvent>,
        reciprocate: Option<ReciprocateQrEvent>,
        chosen: Option<&Method>,
    ) -> bool {
        let (sas, reciprocate) = match (sas, reciprocate) {
            (None, None) => return false,
            (Some(sas), Some(reciprocate)) => match chosen {
                Some(Method::ReciprocateQrCode) => (None, Some(reciprocate)),
                _ => (Some(sas), None),
            },
            pair => pair,
        };
        self.sas_event = sas;
        self.reciprocate_qr_event = reciprocate;
        true
    }

    /// Forget the captured events. Button latches stay set.
    pub(crate) fn clear_events(&mut self) {
        self.sas_event = None;
        self.reciprocate_qr_event = None;
    }

    /// Latch the "start SAS" button. Returns `false` if it was already latched.
    pub(crate) fn press_emoji_button(&mut self) -> bool {
        !std::mem::replace(&mut self.emoji_button_clicked, true)
    }

    /// Latch the reciprocate yes/no buttons. Returns `false` if already latched.
    pub(crate) fn press_reciprocate_button(&mut self) -> bool {
        !std::mem::replace(&mut self.reciprocate_button_clicked, true)
    }
}

/// Subscription handles for both verifier sub-events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifierSubscriptions {
    pub show_sas: SubscriptionId,
    pub show_reciprocate_qr: SubscriptionId,
}

/// A verifier the orchestrator has bound to.
///
/// Holds only a weak reference: the request owns the verifier.
#[derive(Debug)]
pub struct BoundVerifier {
    pub(crate) verifier: Weak<dyn Verifier>,
    pub(crate) generation: u64,
    /// `None` once the first sub-event was delivered and both were released.
    pub(crate) subscriptions: Option<VerifierSubscriptions>,
}

impl BoundVerifier {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.is_some()
    }

    /// Whether `other` is the verifier this binding refers to.
    pub fn is(&self, other: &Arc<dyn Verifier>) -> bool {
        Weak::ptr_eq(&self.verifier, &Arc::downgrade(other))
    }
}

/// Whether a verifier has been seen on the request yet.
///
/// The transition `Unbound -> Bound` happens at most once per verifier, and
/// is what subscribes to its events and starts its handshake.
#[derive(Debug, Default)]
pub enum VerifierBinding {
    #[default]
    Unbound,
    Bound(BoundVerifier),
}

impl VerifierBinding {
    pub fn is_bound(&self) -> bool {
        matches!(self, VerifierBinding::Bound(_))
    }

    pub fn bound(&self) -> Option<&BoundVerifier> {
        match self {
            VerifierBinding::Bound(bound) => Some(bound),
            VerifierBinding::Unbound => None,
        }
    }
}

/// What triggered a handshake.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandshakeOrigin {
    /// A verifier appeared on the request.
    VerifierAppeared,
    /// The user pressed "start SAS".
    StartSas,
}

impl HandshakeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeOrigin::VerifierAppeared => "verifier_appeared",
            HandshakeOrigin::StartSas => "start_sas",
        }
    }
}

/// How a `verify()` call settled.
///
/// Failures never change what is rendered; the request moving to
/// `Cancelled` does. They are reported here so callers and tests can see them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeOutcome {
    pub origin: HandshakeOrigin,
    pub generation: u64,
    pub result: Result<(), AdapterError>,
}

impl HandshakeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
