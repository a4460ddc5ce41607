use proptest::prelude::*;

use keyverify_types::{CancellationCode, Method, Phase, UserId};
use keyverify_verification::{
    derive_render_mode, CancelledBy, OrchestratorState, RenderMode, RequestFacts,
};

fn user(local: &str) -> UserId {
    UserId::parse(&format!("@{local}:example.org")).unwrap()
}

fn any_method() -> impl Strategy<Value = Option<Method>> {
    prop_oneof![
        Just(None),
        Just(Some(Method::Sas)),
        Just(Some(Method::ReciprocateQrCode)),
        Just(Some(Method::ScanQrCode)),
        "[a-z]{1,8}\\.[a-z]{1,8}".prop_map(|s| Some(Method::Unknown(s))),
    ]
}

fn facts(phase: Phase, chosen_method: Option<Method>, qr: bool, sas: bool) -> RequestFacts {
    RequestFacts {
        phase,
        chosen_method,
        peer_scans_qr: qr,
        peer_supports_sas: sas,
        qr_code_data: None,
        is_self_verification: false,
        other_user_id: user("bob"),
        cancellation_code: None,
        cancelling_user_id: None,
    }
}

proptest! {
    /// Phases before `Ready` never render anything.
    #[test]
    fn early_phases_are_empty(
        early in prop_oneof![Just(Phase::Unsent), Just(Phase::Requested)],
        method in any_method(),
        qr in any::<bool>(),
        sas in any::<bool>(),
    ) {
        let mode = derive_render_mode(&facts(early, method, qr, sas), &OrchestratorState::new());
        prop_assert_eq!(mode, RenderMode::Empty);
    }

    /// `no_common_method` is set exactly when neither option is shown.
    #[test]
    fn no_common_method_iff_nothing_offered(qr in any::<bool>(), sas in any::<bool>()) {
        let facts = facts(Phase::Ready, None, qr, sas);
        let mode = derive_render_mode(&facts, &OrchestratorState::new());
        let RenderMode::ChooseMethod(choice) = mode else {
            return Err(TestCaseError::fail("ready must offer a choice"));
        };
        prop_assert_eq!(choice.show_qr, qr);
        prop_assert_eq!(choice.show_sas, sas);
        prop_assert_eq!(choice.no_common_method, !qr && !sas);
    }

    /// A timeout code wins regardless of who reported the cancellation.
    #[test]
    fn timeout_wins_over_canceller(by_other in any::<bool>()) {
        let mut f = facts(Phase::Cancelled, None, true, true);
        f.cancellation_code = Some(CancellationCode::Timeout);
        f.cancelling_user_id = Some(if by_other { user("bob") } else { user("me") });
        let RenderMode::Cancelled(reason) = derive_render_mode(&f, &OrchestratorState::new()) else {
            return Err(TestCaseError::fail("cancelled phase must render cancellation"));
        };
        prop_assert_eq!(reason.by, CancelledBy::Timeout);
    }

    /// Started with no captured event is a spinner for known methods and
    /// empty for everything else.
    #[test]
    fn started_without_event(method in any_method()) {
        let mode = derive_render_mode(
            &facts(Phase::Started, method.clone(), true, true),
            &OrchestratorState::new(),
        );
        match method {
            Some(m @ (Method::Sas | Method::ReciprocateQrCode)) => {
                prop_assert_eq!(mode, RenderMode::WaitingSpinner { method: m });
            }
            _ => prop_assert_eq!(mode, RenderMode::Empty),
        }
    }
}
