//! Opaque payloads handed to external renderers.

use serde::{Deserialize, Serialize};

/// One emoji of a short authentication string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SasEmoji {
    pub symbol: String,
    /// Human-readable name, e.g. "Dog". Empty when the verifier sent none.
    #[serde(default)]
    pub description: String,
}

/// Immutable snapshot of a short authentication string.
///
/// Copied out of the verifier when captured; the verifier may keep mutating
/// its own copy without affecting what is on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sas {
    pub emoji: Vec<SasEmoji>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimal: Option<(u16, u16, u16)>,
}

impl Sas {
    /// Build a SAS from bare emoji symbols with no descriptions.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emoji: symbols
                .into_iter()
                .map(|s| SasEmoji {
                    symbol: s.into(),
                    description: String::new(),
                })
                .collect(),
            decimal: None,
        }
    }

    pub fn with_decimal(mut self, decimal: (u16, u16, u16)) -> Self {
        self.decimal = Some(decimal);
        self
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.emoji.iter().map(|e| e.symbol.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.emoji.is_empty() && self.decimal.is_none()
    }
}

/// Opaque QR code payload. Encoding it into pixels is the renderer's job.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QrCodeData(Vec<u8>);

impl QrCodeData {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
