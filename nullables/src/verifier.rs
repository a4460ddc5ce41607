//! Nullable verifier. Emits `show_sas` / `show_reciprocate_qr` on demand
//! and records the actions taken on its events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use keyverify_types::{Method, Sas};
use keyverify_verification::{
    AdapterError, Listener, ListenerRegistry, ReciprocateCallbacks, ReciprocateQrEvent,
    SasCallbacks, SasEvent, SubscriptionId, Verifier, VerifierEventKind,
};
use tokio::sync::oneshot;

type Handshake = Shared<BoxFuture<'static, Result<(), AdapterError>>>;

/// How the next handshake settles.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum HandshakeMode {
    /// `verify()` resolves successfully right away.
    #[default]
    Succeed,
    /// `verify()` rejects right away with this error.
    Fail(AdapterError),
    /// `verify()` stays pending until [`NullVerifier::resolve_handshake`].
    Pending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SasAction {
    Confirm,
    Mismatch,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReciprocateAction {
    Confirm,
    Cancel,
}

/// Records actions; only the first one is accepted.
struct ActionLog<A> {
    actions: Mutex<Vec<A>>,
    resolved: AtomicBool,
}

impl<A: Copy> ActionLog<A> {
    fn new() -> Self {
        Self {
            actions: Mutex::new(Vec::new()),
            resolved: AtomicBool::new(false),
        }
    }

    fn record(&self, action: A) -> Result<(), AdapterError> {
        let mut actions = self.actions.lock().unwrap_or_else(PoisonError::into_inner);
        actions.push(action);
        if self.resolved.swap(true, Ordering::AcqRel) {
            return Err(AdapterError::AlreadyResolved);
        }
        Ok(())
    }

    fn snapshot(&self) -> Vec<A> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SasCallbacks for ActionLog<SasAction> {
    fn confirm(&self) -> Result<(), AdapterError> {
        self.record(SasAction::Confirm)
    }

    fn mismatch(&self) -> Result<(), AdapterError> {
        self.record(SasAction::Mismatch)
    }

    fn cancel(&self) -> Result<(), AdapterError> {
        self.record(SasAction::Cancel)
    }
}

impl ReciprocateCallbacks for ActionLog<ReciprocateAction> {
    fn confirm(&self) -> Result<(), AdapterError> {
        self.record(ReciprocateAction::Confirm)
    }

    fn cancel(&self) -> Result<(), AdapterError> {
        self.record(ReciprocateAction::Cancel)
    }
}

struct Inner {
    mode: HandshakeMode,
    handshake: Option<Handshake>,
    resolver: Option<oneshot::Sender<Result<(), AdapterError>>>,
    verify_calls: usize,
    handshakes_started: usize,
    sas_event: Option<SasEvent>,
    reciprocate_qr_event: Option<ReciprocateQrEvent>,
    sas_log: Option<Arc<ActionLog<SasAction>>>,
    reciprocate_log: Option<Arc<ActionLog<ReciprocateAction>>>,
}

/// A test verifier driven entirely by the test.
pub struct NullVerifier {
    method: Method,
    inner: Mutex<Inner>,
    show_sas: ListenerRegistry,
    show_reciprocate_qr: ListenerRegistry,
}

impl NullVerifier {
    pub fn new(method: Method) -> Self {
        Self::with_mode(method, HandshakeMode::default())
    }

    pub fn with_mode(method: Method, mode: HandshakeMode) -> Self {
        Self {
            method,
            inner: Mutex::new(Inner {
                mode,
                handshake: None,
                resolver: None,
                verify_calls: 0,
                handshakes_started: 0,
                sas_event: None,
                reciprocate_qr_event: None,
                sas_log: None,
                reciprocate_log: None,
            }),
            show_sas: ListenerRegistry::new(),
            show_reciprocate_qr: ListenerRegistry::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry(&self, kind: VerifierEventKind) -> &ListenerRegistry {
        match kind {
            VerifierEventKind::ShowSas => &self.show_sas,
            VerifierEventKind::ShowReciprocateQr => &self.show_reciprocate_qr,
        }
    }

    /// Change how a handshake not yet started will settle.
    pub fn set_mode(&self, mode: HandshakeMode) {
        self.lock().mode = mode;
    }

    /// Make a handshake not yet started reject with `err`.
    pub fn fail_with(&self, err: AdapterError) {
        self.set_mode(HandshakeMode::Fail(err));
    }

    /// Publish a SAS and emit `show_sas`. Returns the number of listeners invoked.
    pub fn show_sas(&self, sas: Sas) -> usize {
        {
            let mut inner = self.lock();
            let log = Arc::new(ActionLog::new());
            inner.sas_event = Some(SasEvent::new(sas, log.clone()));
            inner.sas_log = Some(log);
        }
        self.show_sas.emit()
    }

    /// Publish a reciprocate event and emit `show_reciprocate_qr`.
    pub fn show_reciprocate_qr(&self) -> usize {
        {
            let mut inner = self.lock();
            let log = Arc::new(ActionLog::new());
            inner.reciprocate_qr_event = Some(ReciprocateQrEvent::new(log.clone()));
            inner.reciprocate_log = Some(log);
        }
        self.show_reciprocate_qr.emit()
    }

    /// Emit an event without changing what the verifier exposes.
    pub fn emit(&self, kind: VerifierEventKind) -> usize {
        self.registry(kind).emit()
    }

    /// Settle a [`HandshakeMode::Pending`] handshake. Returns `false` if
    /// there was nothing pending.
    pub fn resolve_handshake(&self, result: Result<(), AdapterError>) -> bool {
        match self.lock().resolver.take() {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    pub fn listener_count(&self, kind: VerifierEventKind) -> usize {
        self.registry(kind).len()
    }

    /// Total live subscriptions across both events.
    pub fn total_listeners(&self) -> usize {
        self.show_sas.len() + self.show_reciprocate_qr.len()
    }

    /// How many times `verify()` was called.
    pub fn verify_calls(&self) -> usize {
        self.lock().verify_calls
    }

    /// How many distinct handshakes were started (at most one).
    pub fn handshakes_started(&self) -> usize {
        self.lock().handshakes_started
    }

    pub fn sas_actions(&self) -> Vec<SasAction> {
        self.lock()
            .sas_log
            .as_ref()
            .map(|log| log.snapshot())
            .unwrap_or_default()
    }

    pub fn reciprocate_actions(&self) -> Vec<ReciprocateAction> {
        self.lock()
            .reciprocate_log
            .as_ref()
            .map(|log| log.snapshot())
            .unwrap_or_default()
    }
}

impl Verifier for NullVerifier {
    fn method(&self) -> Method {
        self.method.clone()
    }

    fn sas_event(&self) -> Option<SasEvent> {
        self.lock().sas_event.clone()
    }

    fn reciprocate_qr_event(&self) -> Option<ReciprocateQrEvent> {
        self.lock().reciprocate_qr_event.clone()
    }

    fn verify(&self) -> BoxFuture<'static, Result<(), AdapterError>> {
        let mut inner = self.lock();
        inner.verify_calls += 1;
        if let Some(handshake) = &inner.handshake {
            return handshake.clone().boxed();
        }

        let run: BoxFuture<'static, Result<(), AdapterError>> = match inner.mode.clone() {
            HandshakeMode::Succeed => future::ready(Ok(())).boxed(),
            HandshakeMode::Fail(err) => future::ready(Err(err)).boxed(),
            HandshakeMode::Pending => {
                let (tx, rx) = oneshot::channel();
                inner.resolver = Some(tx);
                async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(AdapterError::HandshakeFailed(
                            "verifier dropped before the handshake settled".into(),
                        ))
                    })
                }
                .boxed()
            }
        };
        let handshake = run.shared();
        inner.handshake = Some(handshake.clone());
        inner.handshakes_started += 1;
        handshake.boxed()
    }

    fn subscribe(&self, kind: VerifierEventKind, listener: Listener) -> SubscriptionId {
        self.registry(kind).add(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.show_sas.remove(id) || self.show_reciprocate_qr.remove(id)
    }
}
