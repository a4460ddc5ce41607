//! Panel configuration with TOML file support.

use std::path::Path;

use keyverify_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::OrchestratorError;

/// Where the verification UI is hosted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelLayout {
    /// Side panel next to the member list.
    #[default]
    Panel,
    /// Modal dialog, used for self-verification of a new session.
    Dialog,
}

/// Configuration for the verification panel and its orchestrator.
///
/// Can be loaded from a TOML file via [`PanelConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    #[serde(default)]
    pub layout: PanelLayout,

    /// Client name used when explaining that no method is shared.
    #[serde(default = "default_client_name")]
    pub client_name: String,

    /// Subscribe to and start a verifier that replaces the bound one.
    ///
    /// Only replacements made by the other party are governed by this flag.
    /// The verifier created by the user's own "start SAS" click is always
    /// bound.
    #[serde(default = "default_true")]
    pub rearm_on_verifier_replacement: bool,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_client_name() -> String {
    "this client".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl PanelConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, OrchestratorError> {
        toml::from_str(s).map_err(|e| OrchestratorError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, OrchestratorError> {
        toml::to_string_pretty(self).map_err(|e| OrchestratorError::Config(e.to_string()))
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            layout: PanelLayout::default(),
            client_name: default_client_name(),
            rearm_on_verifier_replacement: default_true(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
