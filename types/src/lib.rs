//! Fundamental types for interactive key verification.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! request phases, verification methods, cancellation codes, user and device
//! identities, and the opaque payloads (SAS, QR data) handed to renderers.

pub mod cancel;
pub mod error;
pub mod identity;
pub mod method;
pub mod payload;
pub mod phase;

pub use cancel::CancellationCode;
pub use error::TypesError;
pub use identity::{DeviceId, UserId};
pub use method::Method;
pub use payload::{QrCodeData, Sas, SasEmoji};
pub use phase::Phase;
