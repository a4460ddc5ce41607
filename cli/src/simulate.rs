//! Scripted verification scenarios played against the nullables.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use anyhow::Context;
use keyverify_nullables::NullRequest;
use keyverify_types::{CancellationCode, Method, Phase, QrCodeData, Sas, SasEmoji, UserId};
use keyverify_verification::{
    describe, PanelConfig, PanelContext, PanelIntent, PanelView, RenderMode,
    VerificationOrchestrator, VerificationRequest,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    /// Emoji comparison from request to verified.
    Sas,
    /// The other party scans our QR code and we confirm their shield.
    Reciprocate,
    /// The request times out while waiting for a method.
    Timeout,
    /// The other party supports no method we can offer.
    NoCommonMethod,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Sas => "sas",
            Scenario::Reciprocate => "reciprocate",
            Scenario::Timeout => "timeout",
            Scenario::NoCommonMethod => "no-common-method",
        }
    }
}

/// One printed step.
#[derive(Serialize)]
struct Step<'a> {
    step: usize,
    label: &'a str,
    mode: &'a RenderMode,
    panel: &'a PanelView,
}

struct Simulation {
    request: Arc<NullRequest>,
    orchestrator: VerificationOrchestrator,
    ctx: PanelContext,
    json: bool,
    steps: usize,
}

impl Simulation {
    fn new(request: Arc<NullRequest>, config: PanelConfig, json: bool) -> Self {
        let ctx = PanelContext::new(&config, request.other_user_id()).with_display_name("Bob");
        let orchestrator = VerificationOrchestrator::new(request.clone(), config);
        Self {
            request,
            orchestrator,
            ctx,
            json,
            steps: 0,
        }
    }

    /// Let queued signals and spawned handshakes run, then report outcomes.
    async fn settle(&mut self) {
        self.orchestrator.process_pending();
        tokio::task::yield_now().await;
        self.orchestrator.process_pending();
        for outcome in self.orchestrator.drain_handshake_outcomes() {
            match &outcome.result {
                Ok(()) => info!(origin = outcome.origin.as_str(), "handshake completed"),
                Err(err) => {
                    warn!(origin = outcome.origin.as_str(), error = %err, "handshake failed")
                }
            }
        }
    }

    async fn step(&mut self, label: &str) -> anyhow::Result<()> {
        self.settle().await;
        self.steps += 1;
        let mode = self.orchestrator.render_mode();
        let panel = describe(&mode, &self.ctx);
        if self.json {
            let line = serde_json::to_string(&Step {
                step: self.steps,
                label,
                mode: &mode,
                panel: &panel,
            })?;
            println!("{line}");
        } else {
            print!("{}", render_text(self.steps, label, &mode, &panel)?);
        }
        Ok(())
    }

    fn intent(&mut self, intent: PanelIntent) -> anyhow::Result<()> {
        let outcome = self
            .orchestrator
            .dispatch(intent)
            .with_context(|| format!("dispatching {}", intent.as_str()))?;
        info!(intent = intent.as_str(), ?outcome, "intent handled");
        Ok(())
    }
}

fn render_text(
    step: usize,
    label: &str,
    mode: &RenderMode,
    panel: &PanelView,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "[{step}] {label}: {}", mode.name())?;
    if panel.is_empty() {
        writeln!(out, "    (nothing to show)")?;
    }
    for section in &panel.sections {
        if let Some(heading) = &section.heading {
            writeln!(out, "    ## {heading}")?;
        }
        if let Some(qr) = &section.qr_code {
            writeln!(out, "    [QR code, {} bytes]", qr.len())?;
        }
        for paragraph in &section.paragraphs {
            writeln!(out, "    {paragraph}")?;
        }
        if let Some(sas) = &section.emoji {
            let emoji: Vec<String> = sas
                .emoji
                .iter()
                .map(|e| format!("{} {}", e.symbol, e.description))
                .collect();
            writeln!(out, "    {}", emoji.join(" | "))?;
        }
        if section.spinner {
            writeln!(out, "    (waiting for the other party...)")?;
        }
        if section.shield {
            writeln!(out, "    (shield)")?;
        }
        for button in &section.buttons {
            let state = if button.disabled { " (disabled)" } else { "" };
            writeln!(out, "    [{}]{state}", button.label)?;
        }
    }
    Ok(out)
}

fn bob() -> anyhow::Result<UserId> {
    Ok(UserId::parse("@bob:example.org")?)
}

fn sample_sas() -> Sas {
    let emoji = [
        ("🐶", "Dog"),
        ("🐱", "Cat"),
        ("🦁", "Lion"),
        ("🐎", "Horse"),
        ("🦄", "Unicorn"),
        ("🐷", "Pig"),
        ("🐘", "Elephant"),
    ];
    Sas {
        emoji: emoji
            .iter()
            .map(|(symbol, description)| SasEmoji {
                symbol: symbol.to_string(),
                description: description.to_string(),
            })
            .collect(),
        decimal: Some((4012, 1290, 5033)),
    }
}

pub async fn run(scenario: Scenario, config: PanelConfig, json: bool) -> anyhow::Result<()> {
    match scenario {
        Scenario::Sas => sas(config, json).await,
        Scenario::Reciprocate => reciprocate(config, json).await,
        Scenario::Timeout => timeout(config, json).await,
        Scenario::NoCommonMethod => no_common_method(config, json).await,
    }
}

async fn sas(config: PanelConfig, json: bool) -> anyhow::Result<()> {
    let request = NullRequest::builder(bob()?).peer_methods([Method::Sas]).build();
    let mut sim = Simulation::new(request, config, json);
    sim.step("request sent").await?;

    sim.request.set_phase(Phase::Ready);
    sim.step("request accepted").await?;

    sim.intent(PanelIntent::StartSas)?;
    sim.step("emoji verification started").await?;

    let verifier = sim
        .request
        .null_verifier()
        .context("starting SAS produced no verifier")?;
    verifier.show_sas(sample_sas());
    sim.step("emoji received").await?;

    sim.intent(PanelIntent::ConfirmSas)?;
    sim.request.complete();
    sim.step("both sides confirmed").await
}

async fn reciprocate(config: PanelConfig, json: bool) -> anyhow::Result<()> {
    let request = NullRequest::builder(bob()?)
        .phase(Phase::Ready)
        .qr_code(QrCodeData::new(b"MATRIX\x02\x00".to_vec()))
        .build();
    let mut sim = Simulation::new(request, config, json);
    sim.step("request accepted").await?;

    let verifier = sim.request.start_verifier(Method::ReciprocateQrCode);
    sim.step("other party scanned our code").await?;

    verifier.show_reciprocate_qr();
    sim.step("waiting for shield confirmation").await?;

    sim.intent(PanelIntent::ConfirmReciprocate)?;
    sim.step("shield confirmed").await?;

    sim.request.complete();
    sim.step("verified").await
}

async fn timeout(config: PanelConfig, json: bool) -> anyhow::Result<()> {
    let other = bob()?;
    let request = NullRequest::builder(other.clone()).phase(Phase::Ready).build();
    let mut sim = Simulation::new(request, config, json);
    sim.step("request accepted").await?;

    sim.request.cancel(CancellationCode::Timeout, &other);
    sim.step("request timed out").await
}

async fn no_common_method(config: PanelConfig, json: bool) -> anyhow::Result<()> {
    let request = NullRequest::builder(bob()?)
        .phase(Phase::Ready)
        .peer_methods([Method::Unknown("org.example.smoke_signals".into())])
        .build();
    let mut sim = Simulation::new(request, config, json);
    sim.step("request accepted").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lists_buttons_and_state() {
        let mode = RenderMode::CompareEmoji(sample_sas());
        let ctx = PanelContext::new(&PanelConfig::default(), bob().unwrap());
        let text = render_text(3, "emoji received", &mode, &describe(&mode, &ctx)).unwrap();
        assert!(text.starts_with("[3] emoji received: compare_emoji\n"));
        assert!(text.contains("🐶 Dog | 🐱 Cat"));
        assert!(text.contains("[They match]"));
    }

    #[test]
    fn empty_panel_says_so() {
        let ctx = PanelContext::new(&PanelConfig::default(), bob().unwrap());
        let panel = describe(&RenderMode::Empty, &ctx);
        let text = render_text(1, "request sent", &RenderMode::Empty, &panel).unwrap();
        assert!(text.contains("(nothing to show)"));
    }

    #[tokio::test]
    async fn every_scenario_runs() {
        for scenario in [
            Scenario::Sas,
            Scenario::Reciprocate,
            Scenario::Timeout,
            Scenario::NoCommonMethod,
        ] {
            run(scenario, PanelConfig::default(), true)
                .await
                .unwrap_or_else(|e| panic!("{} failed: {e:#}", scenario.as_str()));
        }
    }
}
