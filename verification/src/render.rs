//! Render-mode derivation: what the verification UI should show right now.

use keyverify_types::{CancellationCode, Method, Phase, QrCodeData, Sas, UserId};
use serde::Serialize;

use crate::adapter::VerificationRequest;
use crate::state::OrchestratorState;

/// Everything render derivation reads from a request, sampled at once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFacts {
    pub phase: Phase,
    pub chosen_method: Option<Method>,
    /// Peer supports [`Method::ScanQrCode`].
    pub peer_scans_qr: bool,
    /// Peer supports [`Method::Sas`].
    pub peer_supports_sas: bool,
    pub qr_code_data: Option<QrCodeData>,
    pub is_self_verification: bool,
    pub other_user_id: UserId,
    pub cancellation_code: Option<CancellationCode>,
    pub cancelling_user_id: Option<UserId>,
}

impl RequestFacts {
    pub fn read(request: &dyn VerificationRequest) -> Self {
        Self {
            phase: request.phase(),
            chosen_method: request.chosen_method(),
            peer_scans_qr: request.other_party_supports_method(&Method::ScanQrCode),
            peer_supports_sas: request.other_party_supports_method(&Method::Sas),
            qr_code_data: request.qr_code_data(),
            is_self_verification: request.is_self_verification(),
            other_user_id: request.other_user_id(),
            cancellation_code: request.cancellation_code(),
            cancelling_user_id: request.cancelling_user_id(),
        }
    }
}

/// Options offered while the request is ready but no method was chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MethodChoice {
    pub show_qr: bool,
    pub show_sas: bool,
    /// Neither method is available; explain instead of showing empty controls.
    pub no_common_method: bool,
    /// The "start SAS" button was already pressed.
    pub sas_start_disabled: bool,
    /// Present only when `show_qr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<QrCodeData>,
}

/// Who ended the verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    /// The request timed out, whoever reported it.
    Timeout,
    OtherParty,
    Us,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CancelReason {
    pub by: CancelledBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CancellationCode>,
    pub is_self_verification: bool,
}

impl CancelReason {
    pub fn from_facts(facts: &RequestFacts) -> Self {
        let by = if facts.cancellation_code.as_ref().is_some_and(CancellationCode::is_timeout) {
            CancelledBy::Timeout
        } else if facts.cancelling_user_id.as_ref() == Some(&facts.other_user_id) {
            CancelledBy::OtherParty
        } else {
            CancelledBy::Us
        };
        Self {
            by,
            code: facts.cancellation_code.clone(),
            is_self_verification: facts.is_self_verification,
        }
    }
}

/// UI-agnostic description of what should currently be displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "detail", rename_all = "snake_case")]
pub enum RenderMode {
    /// Nothing recognised to show.
    Empty,
    ChooseMethod(MethodChoice),
    /// The chosen method's verifier has not produced its event yet.
    WaitingSpinner { method: Method },
    ReciprocateConfirm {
        buttons_disabled: bool,
        is_self_verification: bool,
    },
    CompareEmoji(Sas),
    Verified { is_self_verification: bool },
    Cancelled(CancelReason),
}

impl RenderMode {
    pub fn name(&self) -> &'static str {
        match self {
            RenderMode::Empty => "empty",
            RenderMode::ChooseMethod(_) => "choose_method",
            RenderMode::WaitingSpinner { .. } => "waiting_spinner",
            RenderMode::ReciprocateConfirm { .. } => "reciprocate_confirm",
            RenderMode::CompareEmoji(_) => "compare_emoji",
            RenderMode::Verified { .. } => "verified",
            RenderMode::Cancelled(_) => "cancelled",
        }
    }
}

/// Derive the render mode from the request and orchestrator state.
///
/// | phase | chosen method | condition | mode |
/// |---|---|---|---|
/// | Ready | any | any | ChooseMethod |
/// | Started | ReciprocateQrCode | event captured | ReciprocateConfirm |
/// | Started | ReciprocateQrCode | no event | WaitingSpinner |
/// | Started | Sas | event captured | CompareEmoji |
/// | Started | Sas | no event | WaitingSpinner |
/// | Started | anything else | any | Empty |
/// | Done | any | any | Verified |
/// | Cancelled | any | any | Cancelled |
/// | Unsent / Requested | any | any | Empty |
pub fn derive_render_mode(facts: &RequestFacts, state: &OrchestratorState) -> RenderMode {
    match facts.phase {
        Phase::Ready => {
            let show_qr = facts.peer_scans_qr;
            let show_sas = facts.peer_supports_sas;
            RenderMode::ChooseMethod(MethodChoice {
                show_qr,
                show_sas,
                no_common_method: !show_qr && !show_sas,
                sas_start_disabled: state.emoji_button_clicked(),
                qr_code: if show_qr { facts.qr_code_data.clone() } else { None },
            })
        }
        Phase::Started => match &facts.chosen_method {
            Some(Method::ReciprocateQrCode) => {
                if state.reciprocate_qr_event().is_some() {
                    RenderMode::ReciprocateConfirm {
                        buttons_disabled: state.reciprocate_button_clicked(),
                        is_self_verification: facts.is_self_verification,
                    }
                } else {
                    RenderMode::WaitingSpinner {
                        method: Method::ReciprocateQrCode,
                    }
                }
            }
            Some(Method::Sas) => match state.sas_event() {
                Some(event) => RenderMode::CompareEmoji(event.sas().clone()),
                None => RenderMode::WaitingSpinner { method: Method::Sas },
            },
            _ => RenderMode::Empty,
        },
        Phase::Done => RenderMode::Verified {
            is_self_verification: facts.is_self_verification,
        },
        Phase::Cancelled => RenderMode::Cancelled(CancelReason::from_facts(facts)),
        Phase::Unsent | Phase::Requested => RenderMode::Empty,
    }
}

/// Whether `facts` is a combination the derivation has no UI for.
///
/// Unsent/Requested are expected to produce `Empty` and are not reported.
pub fn is_unrecognized(facts: &RequestFacts) -> bool {
    facts.phase == Phase::Started
        && !matches!(
            facts.chosen_method,
            Some(Method::Sas) | Some(Method::ReciprocateQrCode)
        )
}
