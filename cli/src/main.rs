//! keyverify: replays a scripted verification against nullable adapters and
//! prints what the verification panel shows at each step.

mod simulate;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use keyverify_utils::LogFormat;
use keyverify_verification::{PanelConfig, PanelLayout};

use crate::simulate::Scenario;

#[derive(Parser)]
#[command(name = "keyverify", about = "Interactive key verification panel simulator")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "KEYVERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Where the panel is hosted: "panel" or "dialog".
    #[arg(long, env = "KEYVERIFY_LAYOUT", value_parser = parse_layout)]
    layout: Option<PanelLayout>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "KEYVERIFY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "KEYVERIFY_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Print each step as a JSON line instead of text.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay a scripted verification.
    Simulate {
        #[arg(value_enum)]
        scenario: Scenario,
    },
}

fn parse_layout(s: &str) -> Result<PanelLayout, String> {
    match s.to_ascii_lowercase().as_str() {
        "panel" => Ok(PanelLayout::Panel),
        "dialog" => Ok(PanelLayout::Dialog),
        other => Err(format!("unknown layout {other:?}, expected \"panel\" or \"dialog\"")),
    }
}

impl Cli {
    /// File config (or defaults) with flags and env vars applied on top.
    fn panel_config(&self) -> anyhow::Result<PanelConfig> {
        let mut config = match &self.config {
            Some(path) => PanelConfig::from_toml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => PanelConfig::default(),
        };
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.panel_config()?;
    keyverify_utils::init_logging(config.log_format, &config.log_level);

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Simulate { scenario } => {
            tracing::info!(
                scenario = scenario.as_str(),
                layout = ?config.layout,
                "starting simulation"
            );
            simulate::run(scenario, config, cli.json).await
        }
    }
}
