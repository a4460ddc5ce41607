//! Integration tests driving the orchestrator through nullable requests and
//! verifiers: request phase changes → verifier binding → sub-event capture →
//! user intents → render mode.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keyverify_nullables::{HandshakeMode, NullRequest, ReciprocateAction, SasAction};
use keyverify_types::{CancellationCode, Method, Phase, QrCodeData, Sas, UserId};
use keyverify_verification::{
    cancellation_message, describe, AdapterError, CancelledBy, HandshakeOrigin, IntentOutcome,
    OrchestratorError, PanelConfig, PanelContext, PanelIntent, RenderMode, VerificationOrchestrator,
    Verifier, VerifierEventKind,
};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bob() -> UserId {
    UserId::parse("@bob:example.org").expect("valid user id")
}

fn orchestrate(request: &Arc<NullRequest>) -> VerificationOrchestrator {
    VerificationOrchestrator::new(request.clone(), PanelConfig::default())
}

fn emoji() -> Sas {
    Sas::from_symbols(["🐶", "🐱"])
}

/// Counts WARN events seen while installed as the default subscriber.
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Binding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bind_is_idempotent() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    assert!(!orchestrator.bind(), "new() already bound");
    assert_eq!(request.change_listener_count(), 1);
}

#[tokio::test]
async fn repeated_changes_subscribe_and_verify_once() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);

    let verifier = request.start_verifier(Method::Sas);
    request.emit_change();
    request.emit_change();
    assert_eq!(orchestrator.process_pending(), 3);

    assert_eq!(verifier.listener_count(VerifierEventKind::ShowSas), 1);
    assert_eq!(verifier.listener_count(VerifierEventKind::ShowReciprocateQr), 1);
    assert_eq!(verifier.verify_calls(), 1);
    assert_eq!(orchestrator.binding().bound().map(|b| b.generation()), Some(1));
}

#[tokio::test]
async fn existing_verifier_seeds_state() {
    let request = NullRequest::builder(bob()).build();
    let verifier = request.start_verifier(Method::Sas);
    verifier.show_sas(emoji());

    let orchestrator = orchestrate(&request);

    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));
    assert!(orchestrator.binding().is_bound());
    assert_eq!(verifier.verify_calls(), 1);
}

#[tokio::test]
async fn replaced_verifier_is_rebound() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    let first = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    let second = request.start_verifier(Method::Sas);
    orchestrator.process_pending();

    assert_eq!(first.total_listeners(), 0);
    assert_eq!(second.total_listeners(), 2);
    assert_eq!(second.verify_calls(), 1);
    assert_eq!(orchestrator.binding().bound().map(|b| b.generation()), Some(2));

    // Events from the released verifier no longer reach the orchestrator.
    assert_eq!(first.show_sas(emoji()), 0);
    second.show_sas(Sas::from_symbols(["🦊"]));
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::CompareEmoji(Sas::from_symbols(["🦊"]))
    );
}

#[tokio::test]
async fn replaced_verifier_is_ignored_when_rearm_disabled() {
    let request = NullRequest::builder(bob()).build();
    let config = PanelConfig {
        rearm_on_verifier_replacement: false,
        ..PanelConfig::default()
    };
    let mut orchestrator = VerificationOrchestrator::new(request.clone(), config);

    let first = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    let second = request.start_verifier(Method::Sas);
    orchestrator.process_pending();

    assert_eq!(first.total_listeners(), 2);
    assert_eq!(second.total_listeners(), 0);
    assert_eq!(second.verify_calls(), 0);
}

#[tokio::test]
async fn replacement_drops_events_of_released_verifier() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    let first = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    first.show_sas(Sas::from_symbols(["🐶"]));
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::CompareEmoji(Sas::from_symbols(["🐶"]))
    );

    let second = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::WaitingSpinner { method: Method::Sas }
    );
    assert!(orchestrator.state().sas_event().is_none());

    assert_eq!(orchestrator.confirm_sas(), Ok(IntentOutcome::Ignored));
    assert!(first.sas_actions().is_empty());

    second.show_sas(emoji());
    orchestrator.process_pending();
    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));
    assert_eq!(orchestrator.confirm_sas(), Ok(IntentOutcome::Forwarded));
    assert_eq!(second.sas_actions(), vec![SasAction::Confirm]);
    assert!(first.sas_actions().is_empty());
}

#[tokio::test]
async fn detached_verifier_keeps_binding() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    request.detach_verifier();
    orchestrator.process_pending();

    assert!(orchestrator.binding().is_bound());
    assert_eq!(verifier.total_listeners(), 2);
}

// ---------------------------------------------------------------------------
// 2. Sub-event capture
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spinner_then_emoji_never_reverts() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::WaitingSpinner { method: Method::Sas }
    );

    verifier.show_sas(emoji());
    orchestrator.process_pending();
    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));
    assert_eq!(verifier.total_listeners(), 0, "released after first event");

    request.emit_change();
    assert_eq!(verifier.emit(VerifierEventKind::ShowSas), 0);
    orchestrator.process_pending();
    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));
}

#[tokio::test]
async fn event_emitted_before_binding_is_captured() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    let verifier = request.start_verifier(Method::Sas);
    assert_eq!(verifier.show_sas(emoji()), 0, "no listener yet");
    orchestrator.process_pending();

    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));
    assert_eq!(verifier.total_listeners(), 0);
    assert_eq!(verifier.verify_calls(), 1);
    assert_eq!(orchestrator.confirm_sas(), Ok(IntentOutcome::Forwarded));
    assert_eq!(verifier.sas_actions(), vec![SasAction::Confirm]);
}

#[tokio::test]
async fn reciprocate_emitted_before_binding_is_captured() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);

    let verifier = request.start_verifier(Method::ReciprocateQrCode);
    verifier.show_reciprocate_qr();
    orchestrator.process_pending();

    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::ReciprocateConfirm {
            buttons_disabled: false,
            is_self_verification: false
        }
    );
    assert_eq!(verifier.total_listeners(), 0);
}

#[tokio::test]
async fn unknown_method_renders_empty() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    request.start_verifier(Method::Unknown("org.example.custom".into()));
    orchestrator.process_pending();

    assert_eq!(orchestrator.render_mode(), RenderMode::Empty);
    let ctx = PanelContext::new(orchestrator.config(), bob());
    assert!(describe(&orchestrator.render_mode(), &ctx).is_empty());
}

#[tokio::test]
async fn unrecognised_combination_is_reported_once_per_entry() {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
    let _guard = tracing::subscriber::set_default(subscriber);

    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);

    request.start_verifier(Method::Unknown("org.example.custom".into()));
    orchestrator.process_pending();
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    request.emit_change();
    request.emit_change();
    orchestrator.process_pending();
    orchestrator.render_mode();
    orchestrator.render_mode();
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    request.set_phase(Phase::Ready);
    orchestrator.process_pending();
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    request.set_phase(Phase::Started);
    orchestrator.process_pending();
    assert_eq!(warnings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn render_updates_bump_revision_only_on_change() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);
    let mut rx = orchestrator.watch_render_mode();
    assert_eq!(rx.borrow_and_update().revision, 0);

    request.set_phase(Phase::Ready);
    orchestrator.process_pending();
    assert!(rx.has_changed().expect("sender alive"));
    let update = rx.borrow_and_update().clone();
    assert_eq!(update.revision, 1);
    assert_eq!(update.mode.name(), "choose_method");

    request.emit_change();
    orchestrator.process_pending();
    assert!(!rx.has_changed().expect("sender alive"));
}

// ---------------------------------------------------------------------------
// 3. Full SAS flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sas_flow_from_request_to_verified() {
    let request = NullRequest::builder(bob())
        .peer_methods([Method::Sas])
        .build();
    let mut orchestrator = orchestrate(&request);
    assert_eq!(orchestrator.render_mode(), RenderMode::Empty);

    request.set_phase(Phase::Ready);
    orchestrator.process_pending();
    let RenderMode::ChooseMethod(choice) = orchestrator.render_mode() else {
        panic!("expected method choice");
    };
    assert!(!choice.show_qr);
    assert!(choice.show_sas);
    assert!(!choice.no_common_method);
    assert!(!choice.sas_start_disabled);

    assert_eq!(orchestrator.start_sas(), Ok(IntentOutcome::Forwarded));
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::WaitingSpinner { method: Method::Sas }
    );
    let outcome = orchestrator.wait_for_handshake().await.expect("handshake settles");
    assert_eq!(outcome.origin, HandshakeOrigin::StartSas);
    assert!(outcome.is_ok());

    let verifier = request.null_verifier().expect("verifier started");
    verifier.show_sas(emoji());
    orchestrator.process_pending();
    assert_eq!(orchestrator.render_mode(), RenderMode::CompareEmoji(emoji()));

    assert_eq!(
        orchestrator.dispatch(PanelIntent::ConfirmSas),
        Ok(IntentOutcome::Forwarded)
    );
    assert_eq!(verifier.sas_actions(), vec![SasAction::Confirm]);

    request.complete();
    orchestrator.process_pending();
    let mode = orchestrator.render_mode();
    assert_eq!(
        mode,
        RenderMode::Verified {
            is_self_verification: false
        }
    );
    let ctx = PanelContext::new(orchestrator.config(), bob()).with_display_name("Bob");
    assert!(describe(&mode, &ctx)
        .text()
        .contains(&"You've successfully verified Bob!"));
}

#[tokio::test]
async fn start_sas_twice_begins_once() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);

    assert_eq!(orchestrator.start_sas(), Ok(IntentOutcome::Forwarded));
    assert_eq!(orchestrator.start_sas(), Ok(IntentOutcome::Ignored));
    orchestrator.process_pending();

    assert_eq!(request.begin_calls(), 1);
    let verifier = request.null_verifier().expect("verifier started");
    assert_eq!(verifier.verify_calls(), 1);
    assert_eq!(verifier.total_listeners(), 2);
}

#[tokio::test]
async fn start_sas_binds_its_verifier_even_when_rearm_disabled() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let config = PanelConfig {
        rearm_on_verifier_replacement: false,
        ..PanelConfig::default()
    };
    let mut orchestrator = VerificationOrchestrator::new(request.clone(), config);
    let scanned = request.start_verifier(Method::ReciprocateQrCode);
    orchestrator.process_pending();
    assert_eq!(scanned.total_listeners(), 2);

    assert_eq!(orchestrator.start_sas(), Ok(IntentOutcome::Forwarded));
    orchestrator.process_pending();

    let sas = request.null_verifier().expect("verifier started");
    assert_eq!(sas.method(), Method::Sas);
    assert_eq!(sas.verify_calls(), 1);
    assert_eq!(sas.total_listeners(), 2);
    assert_eq!(scanned.total_listeners(), 0);
    assert_eq!(orchestrator.binding().bound().map(|b| b.generation()), Some(2));
}

#[tokio::test]
async fn start_sas_failure_is_returned() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);
    request.fail_begin_with(AdapterError::MethodNotSupported(Method::Sas));

    assert_eq!(
        orchestrator.start_sas(),
        Err(OrchestratorError::Adapter(AdapterError::MethodNotSupported(
            Method::Sas
        )))
    );
    assert!(orchestrator.state().emoji_button_clicked());
    assert!(!orchestrator.binding().is_bound());
}

#[tokio::test]
async fn confirm_without_event_is_ignored() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);
    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();

    assert_eq!(orchestrator.confirm_sas(), Ok(IntentOutcome::Ignored));
    assert_eq!(orchestrator.mismatch_sas(), Ok(IntentOutcome::Ignored));
    assert!(verifier.sas_actions().is_empty());
    assert!(orchestrator.state().sas_event().is_none());
}

#[tokio::test]
async fn second_sas_decision_surfaces_already_resolved() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);
    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    verifier.show_sas(emoji());
    orchestrator.process_pending();

    assert_eq!(orchestrator.mismatch_sas(), Ok(IntentOutcome::Forwarded));
    assert_eq!(
        orchestrator.confirm_sas(),
        Err(OrchestratorError::Adapter(AdapterError::AlreadyResolved))
    );
    assert_eq!(verifier.sas_actions(), vec![SasAction::Mismatch, SasAction::Confirm]);
}

// ---------------------------------------------------------------------------
// 4. QR reciprocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reciprocate_buttons_latch() {
    let request = NullRequest::builder(bob())
        .phase(Phase::Ready)
        .qr_code(QrCodeData::new(b"MATRIX\x02".to_vec()))
        .build();
    let mut orchestrator = orchestrate(&request);

    let RenderMode::ChooseMethod(choice) = orchestrator.render_mode() else {
        panic!("expected method choice");
    };
    assert!(choice.show_qr);
    assert_eq!(choice.qr_code, Some(QrCodeData::new(b"MATRIX\x02".to_vec())));

    let verifier = request.start_verifier(Method::ReciprocateQrCode);
    orchestrator.process_pending();
    assert_eq!(orchestrator.confirm_reciprocate(), Ok(IntentOutcome::Ignored));
    assert!(!orchestrator.state().reciprocate_button_clicked());

    verifier.show_reciprocate_qr();
    orchestrator.process_pending();
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::ReciprocateConfirm {
            buttons_disabled: false,
            is_self_verification: false
        }
    );

    assert_eq!(orchestrator.confirm_reciprocate(), Ok(IntentOutcome::Forwarded));
    assert_eq!(orchestrator.cancel_reciprocate(), Ok(IntentOutcome::Ignored));
    assert_eq!(
        orchestrator.render_mode(),
        RenderMode::ReciprocateConfirm {
            buttons_disabled: true,
            is_self_verification: false
        }
    );
    assert_eq!(verifier.reciprocate_actions(), vec![ReciprocateAction::Confirm]);
}

// ---------------------------------------------------------------------------
// 5. Handshakes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_handshake_is_reported_not_rendered() {
    let request = NullRequest::builder(bob())
        .handshake_mode(HandshakeMode::Fail(AdapterError::HandshakeFailed(
            "key mismatch".into(),
        )))
        .build();
    let mut orchestrator = orchestrate(&request);
    request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    let before = orchestrator.render_mode();

    let outcome = orchestrator.wait_for_handshake().await.expect("handshake settles");
    assert_eq!(outcome.origin, HandshakeOrigin::VerifierAppeared);
    assert_eq!(
        outcome.result,
        Err(AdapterError::HandshakeFailed("key mismatch".into()))
    );
    assert_eq!(orchestrator.render_mode(), before);
}

#[tokio::test]
async fn waiting_without_a_handshake_returns_none() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);
    assert!(!orchestrator.binding().is_bound());
    assert_eq!(orchestrator.wait_for_handshake().await, None);

    request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    assert!(orchestrator.wait_for_handshake().await.is_some());
    assert_eq!(orchestrator.wait_for_handshake().await, None);
}

#[tokio::test]
async fn handshake_settling_after_teardown_is_dropped() {
    let request = NullRequest::builder(bob())
        .handshake_mode(HandshakeMode::Pending)
        .build();
    let mut orchestrator = orchestrate(&request);
    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();

    orchestrator.teardown();
    assert!(verifier.resolve_handshake(Ok(())));
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    assert!(orchestrator.drain_handshake_outcomes().is_empty());
    assert_eq!(orchestrator.wait_for_handshake().await, None);
}

// ---------------------------------------------------------------------------
// 6. Cancellation and teardown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timeout_explains_itself() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);

    request.cancel(CancellationCode::Timeout, &bob());
    orchestrator.process_pending();

    let RenderMode::Cancelled(reason) = orchestrator.render_mode() else {
        panic!("expected cancellation");
    };
    assert_eq!(reason.by, CancelledBy::Timeout);
    let ctx = PanelContext::new(orchestrator.config(), bob());
    assert_eq!(
        cancellation_message(&reason, &ctx),
        "Verification timed out. Start verification again from their profile."
    );
}

#[tokio::test]
async fn cancel_by_other_party_names_them() {
    let request = NullRequest::builder(bob()).phase(Phase::Ready).build();
    let mut orchestrator = orchestrate(&request);

    request.cancel(CancellationCode::User, &bob());
    orchestrator.process_pending();

    let RenderMode::Cancelled(reason) = orchestrator.render_mode() else {
        panic!("expected cancellation");
    };
    assert_eq!(reason.by, CancelledBy::OtherParty);
    let ctx = PanelContext::new(orchestrator.config(), bob()).with_display_name("Bob");
    assert_eq!(
        cancellation_message(&reason, &ctx),
        "Bob cancelled verification. Start verification again from their profile."
    );
}

#[tokio::test]
async fn teardown_releases_every_subscription() {
    let request = NullRequest::builder(bob()).build();
    let mut orchestrator = orchestrate(&request);
    let verifier = request.start_verifier(Method::Sas);
    orchestrator.process_pending();
    assert_eq!(verifier.total_listeners(), 2);

    orchestrator.teardown();
    orchestrator.teardown();

    assert!(orchestrator.is_torn_down());
    assert_eq!(request.change_listener_count(), 0);
    assert_eq!(verifier.total_listeners(), 0);
    assert_eq!(verifier.show_sas(emoji()), 0);
    assert_eq!(orchestrator.process_pending(), 0);
    assert!(orchestrator.state().sas_event().is_none());
    assert_eq!(orchestrator.start_sas(), Err(OrchestratorError::TornDown));
    assert_eq!(
        orchestrator.dispatch(PanelIntent::ConfirmSas),
        Err(OrchestratorError::TornDown)
    );
}

#[tokio::test]
async fn drop_unsubscribes() {
    let request = NullRequest::builder(bob()).build();
    let verifier = request.start_verifier(Method::ReciprocateQrCode);
    {
        let _orchestrator = orchestrate(&request);
        assert_eq!(request.change_listener_count(), 1);
        assert_eq!(verifier.total_listeners(), 2);
    }
    assert_eq!(request.change_listener_count(), 0);
    assert_eq!(verifier.total_listeners(), 0);
}
