//! Verification orchestrator: binds one request, follows its verifier, and
//! turns request phases, verifier events and user intents into a single
//! render mode.
//!
//! Events from the request and verifier never touch the orchestrator
//! directly. Their listeners enqueue a [`Signal`] and the owner of the
//! orchestrator processes the queue with [`VerificationOrchestrator::process_pending`]
//! or [`VerificationOrchestrator::process_next`], one signal at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyverify_types::Method;
use keyverify_utils::spans;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn, Instrument, Span};

use crate::adapter::{VerificationRequest, Verifier, VerifierEventKind};
use crate::config::PanelConfig;
use crate::error::{AdapterError, OrchestratorError};
use crate::listener::SubscriptionId;
use crate::render::{derive_render_mode, is_unrecognized, RenderMode, RequestFacts};
use crate::state::{
    BoundVerifier, HandshakeOrigin, HandshakeOutcome, OrchestratorState, VerifierBinding,
    VerifierSubscriptions,
};

/// Work queued by adapter listeners and handshake tasks.
#[derive(Debug)]
enum Signal {
    RequestChanged,
    VerifierUpdated {
        generation: u64,
        kind: VerifierEventKind,
    },
    HandshakeSettled(HandshakeOutcome),
}

/// An intent issued by the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelIntent {
    StartSas,
    ConfirmSas,
    MismatchSas,
    ConfirmReciprocate,
    CancelReciprocate,
    /// Handed back to the caller untouched.
    Close,
}

impl PanelIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelIntent::StartSas => "start_sas",
            PanelIntent::ConfirmSas => "confirm_sas",
            PanelIntent::MismatchSas => "mismatch_sas",
            PanelIntent::ConfirmReciprocate => "confirm_reciprocate",
            PanelIntent::CancelReciprocate => "cancel_reciprocate",
            PanelIntent::Close => "close",
        }
    }
}

/// What happened to an intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Forwarded to the request or verifier.
    Forwarded,
    /// Nothing to act on (stale event, latched button); nothing changed.
    Ignored,
    /// The caller should close the panel.
    Close,
}

/// Render mode plus a revision that increases whenever the mode changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderUpdate {
    pub revision: u64,
    pub mode: RenderMode,
}

/// Single source of truth for what the verification UI should show.
///
/// One orchestrator serves one request for its whole life. Must be created
/// inside a tokio runtime: handshakes are spawned on it.
pub struct VerificationOrchestrator {
    request: Arc<dyn VerificationRequest>,
    config: PanelConfig,
    state: OrchestratorState,
    binding: VerifierBinding,
    change_subscription: Option<SubscriptionId>,
    next_generation: u64,
    torn_down: bool,
    /// Cleared on teardown; checked by handshake continuations.
    live: Arc<AtomicBool>,
    signals_tx: mpsc::UnboundedSender<Signal>,
    signals_rx: mpsc::UnboundedReceiver<Signal>,
    /// Settled handshakes not yet drained by the caller.
    outcomes: Vec<HandshakeOutcome>,
    /// Spawned handshakes whose outcome has not been processed yet.
    handshakes_in_flight: usize,
    /// The current phase/method combination was already reported as unrecognised.
    unrecognized_reported: bool,
    render_tx: watch::Sender<RenderUpdate>,
    span: Span,
}

impl VerificationOrchestrator {
    /// Create an orchestrator for `request` and bind to it.
    pub fn new(request: Arc<dyn VerificationRequest>, config: PanelConfig) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let span = spans::request_span(&request.other_user_id(), request.is_self_verification());
        let initial = derive_render_mode(&RequestFacts::read(&*request), &OrchestratorState::new());
        let (render_tx, _) = watch::channel(RenderUpdate {
            revision: 0,
            mode: initial,
        });

        let mut orchestrator = Self {
            request,
            config,
            state: OrchestratorState::new(),
            binding: VerifierBinding::Unbound,
            change_subscription: None,
            next_generation: 1,
            torn_down: false,
            live: Arc::new(AtomicBool::new(true)),
            signals_tx,
            signals_rx,
            outcomes: Vec::new(),
            handshakes_in_flight: 0,
            unrecognized_reported: false,
            render_tx,
            span,
        };
        orchestrator.bind();
        orchestrator
    }

    /// Subscribe to the request's `change` event and pick up a verifier that
    /// is already present, including any event it already exposes.
    ///
    /// Returns `false` without doing anything if already bound or torn down.
    pub fn bind(&mut self) -> bool {
        if self.torn_down || self.change_subscription.is_some() {
            return false;
        }
        let span = self.span.clone();
        let _entered = span.enter();

        let tx = self.signals_tx.clone();
        let id = self.request.on_change(Box::new(move || {
            let _ = tx.send(Signal::RequestChanged);
        }));
        self.change_subscription = Some(id);
        debug!(subscription = id.as_u64(), "subscribed to request changes");

        self.on_request_change();
        true
    }

    /// Handler for the request's `change` event.
    ///
    /// Binds the verifier the first time it is seen. Later notifications for
    /// the same verifier only refresh the render mode.
    pub fn on_request_change(&mut self) {
        if self.torn_down {
            return;
        }
        let span = self.span.clone();
        let _entered = span.enter();

        if let Some(verifier) = self.request.verifier() {
            match &self.binding {
                VerifierBinding::Unbound => {
                    self.bind_verifier(verifier, HandshakeOrigin::VerifierAppeared);
                }
                VerifierBinding::Bound(bound) if bound.is(&verifier) => {}
                VerifierBinding::Bound(bound) => {
                    if self.config.rearm_on_verifier_replacement {
                        debug!(
                            previous_generation = bound.generation(),
                            "verifier replaced; rebinding"
                        );
                        self.rebind(verifier, HandshakeOrigin::VerifierAppeared);
                    } else {
                        debug!("verifier replaced; keeping current binding");
                    }
                }
            }
        }
        self.notify();
    }

    /// Release the bound verifier and bind `verifier` in its place.
    ///
    /// Events captured from the released verifier are dropped with it, so
    /// intents can only reach the verifier currently bound.
    fn rebind(&mut self, verifier: Arc<dyn Verifier>, origin: HandshakeOrigin) {
        self.release_verifier();
        self.state.clear_events();
        self.bind_verifier(verifier, origin);
    }

    /// Subscribe to both sub-events of `verifier` and start its handshake.
    ///
    /// The binding is recorded before the handshake is spawned, so change
    /// notifications arriving while `verify()` is outstanding see it bound.
    /// An event the verifier emitted before the subscriptions existed is
    /// captured here.
    fn bind_verifier(&mut self, verifier: Arc<dyn Verifier>, origin: HandshakeOrigin) {
        let generation = self.next_generation;
        self.next_generation += 1;

        let subscriptions = VerifierSubscriptions {
            show_sas: self.subscribe_verifier(&verifier, generation, VerifierEventKind::ShowSas),
            show_reciprocate_qr: self.subscribe_verifier(
                &verifier,
                generation,
                VerifierEventKind::ShowReciprocateQr,
            ),
        };
        self.binding = VerifierBinding::Bound(BoundVerifier {
            verifier: Arc::downgrade(&verifier),
            generation,
            subscriptions: Some(subscriptions),
        });
        debug!(
            generation,
            method = %verifier.method(),
            origin = origin.as_str(),
            "verifier bound"
        );

        self.launch_handshake(&verifier, generation, origin);

        let exposed = verifier.sas_event().is_some() || verifier.reciprocate_qr_event().is_some();
        if exposed && self.absorb_events(&verifier) {
            debug!(generation, "captured event emitted before binding");
        }
    }

    fn subscribe_verifier(
        &self,
        verifier: &Arc<dyn Verifier>,
        generation: u64,
        kind: VerifierEventKind,
    ) -> SubscriptionId {
        let tx = self.signals_tx.clone();
        verifier.subscribe(
            kind,
            Box::new(move || {
                let _ = tx.send(Signal::VerifierUpdated { generation, kind });
            }),
        )
    }

    /// Fire-and-forget `verify()`. The outcome comes back as a signal.
    fn launch_handshake(
        &mut self,
        verifier: &Arc<dyn Verifier>,
        generation: u64,
        origin: HandshakeOrigin,
    ) {
        let handshake = verifier.verify();
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(generation, "no async runtime; handshake not started");
                self.outcomes.push(HandshakeOutcome {
                    origin,
                    generation,
                    result: Err(AdapterError::HandshakeFailed(
                        "no async runtime available".into(),
                    )),
                });
                return;
            }
        };

        let live = Arc::clone(&self.live);
        let tx = self.signals_tx.clone();
        let span = spans::handshake_span(generation, origin.as_str());
        handle.spawn(
            async move {
                let result = handshake.await;
                if !live.load(Ordering::Acquire) {
                    debug!(ok = result.is_ok(), "handshake settled after teardown; dropped");
                    return;
                }
                if let Err(err) = &result {
                    warn!(error = %err, "verifier handshake failed");
                }
                let _ = tx.send(Signal::HandshakeSettled(HandshakeOutcome {
                    origin,
                    generation,
                    result,
                }));
            }
            .instrument(span),
        );
        self.handshakes_in_flight += 1;
    }

    /// Handler for `show_sas` / `show_reciprocate_qr`.
    ///
    /// Copies the verifier's events into state and releases both
    /// subscriptions: each sub-event is delivered once per handshake.
    fn on_verifier_update(&mut self, generation: u64, kind: VerifierEventKind) {
        let span = self.span.clone();
        let _entered = span.enter();

        let VerifierBinding::Bound(bound) = &mut self.binding else {
            debug!(%kind, "verifier event without a bound verifier; ignored");
            return;
        };
        if bound.generation != generation {
            debug!(%kind, generation, current = bound.generation, "stale verifier event; ignored");
            return;
        }
        let Some(verifier) = bound.verifier.upgrade() else {
            debug!(%kind, "verifier already dropped");
            bound.subscriptions = None;
            return;
        };

        if self.absorb_events(&verifier) {
            debug!(%kind, generation, "captured verifier event");
        }
        self.notify();
    }

    /// Copy the events `verifier` exposes into state and release both
    /// subscriptions of the binding. Returns whether anything was captured.
    fn absorb_events(&mut self, verifier: &Arc<dyn Verifier>) -> bool {
        let sas = verifier.sas_event();
        let reciprocate = verifier.reciprocate_qr_event();
        if let VerifierBinding::Bound(bound) = &mut self.binding {
            if let Some(subscriptions) = bound.subscriptions.take() {
                verifier.unsubscribe(subscriptions.show_sas);
                verifier.unsubscribe(subscriptions.show_reciprocate_qr);
            }
        }
        let chosen = self.request.chosen_method();
        self.state.capture(sas, reciprocate, chosen.as_ref())
    }

    /// Drop the subscriptions of the bound verifier, if any remain.
    fn release_verifier(&mut self) {
        if let VerifierBinding::Bound(bound) = &mut self.binding {
            if let Some(subscriptions) = bound.subscriptions.take() {
                if let Some(verifier) = bound.verifier.upgrade() {
                    verifier.unsubscribe(subscriptions.show_sas);
                    verifier.unsubscribe(subscriptions.show_reciprocate_qr);
                }
            }
        }
    }

    fn handle(&mut self, signal: Signal) {
        if self.torn_down {
            return;
        }
        match signal {
            Signal::RequestChanged => self.on_request_change(),
            Signal::VerifierUpdated { generation, kind } => {
                self.on_verifier_update(generation, kind)
            }
            Signal::HandshakeSettled(outcome) => {
                self.handshakes_in_flight = self.handshakes_in_flight.saturating_sub(1);
                self.outcomes.push(outcome);
            }
        }
    }

    /// Process every queued signal. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle(signal);
            handled += 1;
        }
        handled
    }

    /// Wait for the next signal and process it.
    ///
    /// Returns `false` once the orchestrator has been torn down.
    pub async fn process_next(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        match self.signals_rx.recv().await {
            Some(signal) => {
                self.handle(signal);
                true
            }
            None => false,
        }
    }

    /// Process signals until a handshake settles, then return its outcome.
    ///
    /// Outcomes already recorded are returned first. The outcome is removed
    /// from the pending list. Returns `None` when no handshake is outstanding
    /// or after teardown.
    pub async fn wait_for_handshake(&mut self) -> Option<HandshakeOutcome> {
        loop {
            if !self.outcomes.is_empty() {
                return Some(self.outcomes.remove(0));
            }
            if self.handshakes_in_flight == 0 {
                return None;
            }
            if !self.process_next().await {
                return None;
            }
        }
    }

    /// Take all settled handshake outcomes.
    pub fn drain_handshake_outcomes(&mut self) -> Vec<HandshakeOutcome> {
        std::mem::take(&mut self.outcomes)
    }

    // ── User intents ───────────────────────────────────────────────────

    /// Start SAS verification.
    ///
    /// Latches the start button. A second call is ignored and never starts
    /// another handshake. Handshake failures arrive as outcomes, not here.
    ///
    /// The verifier this creates is always bound, replacing a different bound
    /// verifier whatever `rearm_on_verifier_replacement` says: the user asked
    /// for this handshake.
    pub fn start_sas(&mut self) -> Result<IntentOutcome, OrchestratorError> {
        self.ensure_live()?;
        let _entered = spans::intent_span(PanelIntent::StartSas.as_str()).entered();

        if !self.state.press_emoji_button() {
            debug!("SAS already requested; ignoring");
            return Ok(IntentOutcome::Ignored);
        }
        info!("starting SAS verification");
        self.notify();

        let verifier = match self.request.begin_key_verification(Method::Sas) {
            Ok(verifier) => verifier,
            Err(err) => {
                warn!(error = %err, "could not begin SAS verification");
                return Err(err.into());
            }
        };
        let already_bound = self
            .binding
            .bound()
            .is_some_and(|bound| bound.is(&verifier));
        if !already_bound {
            self.rebind(verifier, HandshakeOrigin::StartSas);
        }
        self.notify();
        Ok(IntentOutcome::Forwarded)
    }

    /// The emoji match.
    pub fn confirm_sas(&mut self) -> Result<IntentOutcome, OrchestratorError> {
        self.forward_sas(PanelIntent::ConfirmSas)
    }

    /// The emoji do not match.
    pub fn mismatch_sas(&mut self) -> Result<IntentOutcome, OrchestratorError> {
        self.forward_sas(PanelIntent::MismatchSas)
    }

    fn forward_sas(&mut self, intent: PanelIntent) -> Result<IntentOutcome, OrchestratorError> {
        self.ensure_live()?;
        let _entered = spans::intent_span(intent.as_str()).entered();

        let Some(event) = self.state.sas_event() else {
            debug!("no SAS event captured; ignoring stale click");
            return Ok(IntentOutcome::Ignored);
        };
        info!("forwarding SAS decision");
        match intent {
            PanelIntent::MismatchSas => event.mismatch()?,
            _ => event.confirm()?,
        }
        Ok(IntentOutcome::Forwarded)
    }

    /// The other party shows the same shield.
    pub fn confirm_reciprocate(&mut self) -> Result<IntentOutcome, OrchestratorError> {
        self.forward_reciprocate(PanelIntent::ConfirmReciprocate)
    }

    /// The other party does not show the same shield.
    pub fn cancel_reciprocate(&mut self) -> Result<IntentOutcome, OrchestratorError> {
        self.forward_reciprocate(PanelIntent::CancelReciprocate)
    }

    fn forward_reciprocate(
        &mut self,
        intent: PanelIntent,
    ) -> Result<IntentOutcome, OrchestratorError> {
        self.ensure_live()?;
        let _entered = spans::intent_span(intent.as_str()).entered();

        let Some(event) = self.state.reciprocate_qr_event().cloned() else {
            debug!("no reciprocate event captured; ignoring stale click");
            return Ok(IntentOutcome::Ignored);
        };
        if !self.state.press_reciprocate_button() {
            debug!("reciprocate already answered; ignoring");
            return Ok(IntentOutcome::Ignored);
        }
        self.notify();
        info!("forwarding reciprocate decision");
        match intent {
            PanelIntent::CancelReciprocate => event.cancel()?,
            _ => event.confirm()?,
        }
        Ok(IntentOutcome::Forwarded)
    }

    /// Route a presentation intent to its handler.
    pub fn dispatch(&mut self, intent: PanelIntent) -> Result<IntentOutcome, OrchestratorError> {
        match intent {
            PanelIntent::StartSas => self.start_sas(),
            PanelIntent::ConfirmSas => self.confirm_sas(),
            PanelIntent::MismatchSas => self.mismatch_sas(),
            PanelIntent::ConfirmReciprocate => self.confirm_reciprocate(),
            PanelIntent::CancelReciprocate => self.cancel_reciprocate(),
            PanelIntent::Close => Ok(IntentOutcome::Close),
        }
    }

    // ── Rendering ──────────────────────────────────────────────────────

    /// Derive the current render mode.
    pub fn render_mode(&self) -> RenderMode {
        self.derive(&RequestFacts::read(&*self.request))
    }

    fn derive(&self, facts: &RequestFacts) -> RenderMode {
        let _entered = spans::render_span(facts.phase, facts.chosen_method.as_ref()).entered();
        derive_render_mode(facts, &self.state)
    }

    /// Receiver notified whenever the render mode changes.
    pub fn watch_render_mode(&self) -> watch::Receiver<RenderUpdate> {
        self.render_tx.subscribe()
    }

    /// Publish the current render mode and report entering an unrecognised
    /// phase/method combination, once per entry.
    fn notify(&mut self) {
        let facts = RequestFacts::read(&*self.request);
        let unrecognized = is_unrecognized(&facts);
        if unrecognized && !self.unrecognized_reported {
            warn!(
                phase = %facts.phase,
                method = %facts.chosen_method.as_ref().map(Method::as_str).unwrap_or("none"),
                "no UI for this phase/method combination"
            );
        }
        self.unrecognized_reported = unrecognized;

        let mode = self.derive(&facts);
        self.render_tx.send_if_modified(|current| {
            if current.mode == mode {
                return false;
            }
            current.revision += 1;
            current.mode = mode;
            true
        });
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn binding(&self) -> &VerifierBinding {
        &self.binding
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn request(&self) -> &Arc<dyn VerificationRequest> {
        &self.request
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn ensure_live(&self) -> Result<(), OrchestratorError> {
        if self.torn_down {
            Err(OrchestratorError::TornDown)
        } else {
            Ok(())
        }
    }

    /// Release every subscription. Idempotent; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let span = self.span.clone();
        let _entered = span.enter();

        self.torn_down = true;
        self.live.store(false, Ordering::Release);
        if let Some(id) = self.change_subscription.take() {
            self.request.off_change(id);
        }
        self.release_verifier();
        self.signals_rx.close();
        while self.signals_rx.try_recv().is_ok() {}
        debug!("orchestrator torn down");
    }
}

impl Drop for VerificationOrchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}
