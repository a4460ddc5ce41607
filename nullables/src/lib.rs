//! Nullable infrastructure for deterministic testing.
//!
//! The orchestrator only sees a request and a verifier through traits.
//! This crate provides implementations that:
//! - Never touch the network or any crypto
//! - Can be driven programmatically (phase changes, `show_sas`, cancellation)
//! - Record what was called on them, for assertions
//!
//! Usage: build a [`NullRequest`], hand it to the orchestrator, and push the
//! request and its [`NullVerifier`] through the steps under test.

pub mod request;
pub mod verifier;

pub use request::{NullRequest, NullRequestBuilder};
pub use verifier::{HandshakeMode, NullVerifier, ReciprocateAction, SasAction};
