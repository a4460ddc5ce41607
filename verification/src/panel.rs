//! Stateless presentation: turns a [`RenderMode`] into a display tree.
//!
//! Pixel rendering of QR codes and emoji, styling and translation belong to
//! the host UI. This module only decides which text, buttons and payloads
//! appear, and which intent each button issues.

use keyverify_types::{DeviceId, QrCodeData, Sas, UserId};
use serde::Serialize;

use crate::config::{PanelConfig, PanelLayout};
use crate::orchestrator::PanelIntent;
use crate::render::{CancelReason, CancelledBy, MethodChoice, RenderMode};

/// The other session, shown when verifying one of our own devices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub display_name: Option<String>,
    pub device_id: DeviceId,
}

/// Host-supplied context that is not part of the orchestrator's state.
#[derive(Clone, Debug)]
pub struct PanelContext {
    pub layout: PanelLayout,
    pub client_name: String,
    pub member_display_name: Option<String>,
    pub member_user_id: UserId,
    pub device: Option<DeviceInfo>,
    pub is_room_encrypted: bool,
}

impl PanelContext {
    pub fn new(config: &PanelConfig, member_user_id: UserId) -> Self {
        Self {
            layout: config.layout,
            client_name: config.client_name.clone(),
            member_display_name: None,
            member_user_id,
            device: None,
            is_room_encrypted: false,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.member_display_name = Some(name.into());
        self
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_room_encrypted(mut self, encrypted: bool) -> Self {
        self.is_room_encrypted = encrypted;
        self
    }

    /// Display name, falling back to the user id.
    pub fn display_name(&self) -> &str {
        self.member_display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.member_user_id.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonKind {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PanelButton {
    pub label: String,
    #[serde(serialize_with = "serialize_intent")]
    pub intent: PanelIntent,
    pub kind: ButtonKind,
    pub disabled: bool,
}

fn serialize_intent<S: serde::Serializer>(intent: &PanelIntent, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(intent.as_str())
}

impl PanelButton {
    fn new(label: &str, intent: PanelIntent, kind: ButtonKind) -> Self {
        Self {
            label: label.to_string(),
            intent,
            kind,
            disabled: false,
        }
    }

    fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PanelSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub paragraphs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<QrCodeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Sas>,
    pub spinner: bool,
    /// Large "verified" shield icon.
    pub shield: bool,
    pub buttons: Vec<PanelButton>,
}

impl PanelSection {
    fn headed(heading: &str) -> Self {
        Self {
            heading: Some(heading.to_string()),
            ..Self::default()
        }
    }

    fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.paragraphs.push(text.into());
        self
    }

    fn button(mut self, button: PanelButton) -> Self {
        self.buttons.push(button);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PanelView {
    pub sections: Vec<PanelSection>,
}

impl PanelView {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Every paragraph, in order.
    pub fn text(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|s| s.paragraphs.iter().map(String::as_str))
            .collect()
    }

    pub fn buttons(&self) -> impl Iterator<Item = &PanelButton> {
        self.sections.iter().flat_map(|s| s.buttons.iter())
    }
}

/// Build the display tree for `mode`.
pub fn describe(mode: &RenderMode, ctx: &PanelContext) -> PanelView {
    let sections = match mode {
        RenderMode::Empty => Vec::new(),
        RenderMode::ChooseMethod(choice) => match ctx.layout {
            PanelLayout::Dialog => choose_method_dialog(choice, ctx),
            PanelLayout::Panel => choose_method_panel(choice, ctx),
        },
        RenderMode::WaitingSpinner { method } => {
            let heading = if *method == keyverify_types::Method::Sas {
                "Compare emoji"
            } else {
                "Verify by scanning"
            };
            vec![PanelSection {
                spinner: true,
                ..PanelSection::headed(heading)
            }]
        }
        RenderMode::ReciprocateConfirm {
            buttons_disabled,
            is_self_verification,
        } => vec![reciprocate(*buttons_disabled, *is_self_verification, ctx)],
        RenderMode::CompareEmoji(sas) => vec![PanelSection {
            emoji: Some(sas.clone()),
            ..PanelSection::headed("Compare emoji")
        }
        .paragraph("Confirm the emoji below are displayed on both sessions, in the same order:")
        .button(PanelButton::new("They don't match", PanelIntent::MismatchSas, ButtonKind::Danger))
        .button(PanelButton::new("They match", PanelIntent::ConfirmSas, ButtonKind::Primary))],
        RenderMode::Verified {
            is_self_verification,
        } => vec![verified(*is_self_verification, ctx)],
        RenderMode::Cancelled(reason) => vec![cancelled(reason, ctx)],
    };
    PanelView { sections }
}

fn no_common_method_text(ctx: &PanelContext) -> String {
    format!(
        "The session you are trying to verify doesn't support scanning a QR code or emoji \
         verification, which is what {} supports. Try with a different client.",
        ctx.client_name
    )
}

fn choose_method_panel(choice: &MethodChoice, ctx: &PanelContext) -> Vec<PanelSection> {
    let mut sections = Vec::new();
    if choice.show_qr {
        sections.push(PanelSection {
            qr_code: choice.qr_code.clone(),
            ..PanelSection::headed("Verify by scanning")
                .paragraph(format!("Ask {} to scan your code:", ctx.display_name()))
        });
    }
    if choice.show_sas {
        let label = if choice.show_qr {
            "If you can't scan the code above, verify by comparing unique emoji."
        } else {
            "Verify by comparing unique emoji."
        };
        sections.push(
            PanelSection::headed("Verify by emoji").paragraph(label).button(
                PanelButton::new("Verify by emoji", PanelIntent::StartSas, ButtonKind::Primary)
                    .disabled(choice.sas_start_disabled),
            ),
        );
    }
    if choice.no_common_method {
        sections.push(PanelSection::default().paragraph(no_common_method_text(ctx)));
    }
    sections
}

fn choose_method_dialog(choice: &MethodChoice, ctx: &PanelContext) -> Vec<PanelSection> {
    let intro = "Verify this session by completing one of the following:";
    let mut sections = vec![PanelSection::default().paragraph(intro)];
    if choice.show_qr {
        sections.push(PanelSection {
            qr_code: choice.qr_code.clone(),
            ..PanelSection::default().paragraph("Scan this unique code")
        });
    }
    if choice.show_qr && choice.show_sas {
        sections.push(PanelSection::default().paragraph("or"));
    }
    if choice.show_sas {
        sections.push(
            PanelSection::default()
                .paragraph("Compare unique emoji")
                .paragraph(
                    "Compare a unique set of emoji if you don't have a camera on either device",
                )
                .button(
                    PanelButton::new("Start", PanelIntent::StartSas, ButtonKind::Primary)
                        .disabled(choice.sas_start_disabled),
                ),
        );
    }
    if choice.no_common_method {
        sections.push(PanelSection::default().paragraph(no_common_method_text(ctx)));
    }
    sections
}

fn reciprocate(buttons_disabled: bool, is_self: bool, ctx: &PanelContext) -> PanelSection {
    let description = if is_self {
        "Almost there! Is your other session showing the same shield?".to_string()
    } else {
        format!("Almost there! Is {} showing the same shield?", ctx.display_name())
    };
    PanelSection {
        shield: true,
        ..PanelSection::headed("Verify by scanning")
    }
    .paragraph(description)
    .button(
        PanelButton::new("No", PanelIntent::CancelReciprocate, ButtonKind::Danger)
            .disabled(buttons_disabled),
    )
    .button(
        PanelButton::new("Yes", PanelIntent::ConfirmReciprocate, ButtonKind::Primary)
            .disabled(buttons_disabled),
    )
}

fn verified(is_self: bool, ctx: &PanelContext) -> PanelSection {
    let description = match (is_self, &ctx.device) {
        (true, Some(device)) => format!(
            "You've successfully verified {} ({})!",
            device.display_name.as_deref().unwrap_or(device.device_id.as_str()),
            device.device_id
        ),
        (true, None) => "You've successfully verified your other session!".to_string(),
        (false, _) => format!("You've successfully verified {}!", ctx.display_name()),
    };
    let mut section = PanelSection {
        shield: true,
        ..PanelSection::headed("Verified")
    }
    .paragraph(description);
    if !is_self {
        section = section.paragraph(if ctx.is_room_encrypted {
            "Verify all users in a room to ensure it's secure."
        } else {
            "In encrypted rooms, verify all users to ensure it's secure."
        });
    }
    section.button(PanelButton::new("Got it", PanelIntent::Close, ButtonKind::Primary))
}

/// The one place cancellation text is produced.
pub fn cancellation_message(reason: &CancelReason, ctx: &PanelContext) -> String {
    let start_again = if reason.is_self_verification {
        "Start verification again from the notification."
    } else {
        "Start verification again from their profile."
    };
    let text = match reason.by {
        CancelledBy::Timeout => "Verification timed out.".to_string(),
        CancelledBy::OtherParty if reason.is_self_verification => {
            "You cancelled verification on your other session.".to_string()
        }
        CancelledBy::OtherParty => format!("{} cancelled verification.", ctx.display_name()),
        CancelledBy::Us => "You cancelled verification.".to_string(),
    };
    format!("{text} {start_again}")
}

fn cancelled(reason: &CancelReason, ctx: &PanelContext) -> PanelSection {
    PanelSection::headed("Verification cancelled")
        .paragraph(cancellation_message(reason, ctx))
        .button(PanelButton::new("Got it", PanelIntent::Close, ButtonKind::Primary))
}
