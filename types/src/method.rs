//! Verification methods and their wire names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A key verification method.
///
/// Methods the client does not recognise are kept as [`Method::Unknown`]
/// so that a peer advertising a protocol extension is never a fault.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// Short authentication string ("compare emoji").
    Sas,
    /// Confirm that the other party scanned our QR code.
    ReciprocateQrCode,
    /// Scan the other party's QR code.
    ScanQrCode,
    /// Anything else a peer may advertise.
    Unknown(String),
}

impl Method {
    pub const SAS: &'static str = "m.sas.v1";
    pub const RECIPROCATE_QR_CODE: &'static str = "m.reciprocate.v1";
    pub const SCAN_QR_CODE: &'static str = "m.qr_code.scan.v1";

    pub fn as_str(&self) -> &str {
        match self {
            Method::Sas => Self::SAS,
            Method::ReciprocateQrCode => Self::RECIPROCATE_QR_CODE,
            Method::ScanQrCode => Self::SCAN_QR_CODE,
            Method::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Method::Unknown(_))
    }
}

impl From<&str> for Method {
    fn from(s: &str) -> Self {
        match s {
            Self::SAS => Method::Sas,
            Self::RECIPROCATE_QR_CODE => Method::ReciprocateQrCode,
            Self::SCAN_QR_CODE => Method::ScanQrCode,
            other => Method::Unknown(other.to_string()),
        }
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Method::from(s))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Method::from(name.as_str()))
    }
}
