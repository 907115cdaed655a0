//! Voice Provider Integration - Vapi webhook events and outbound calls
//!
//! This crate is the boundary to the telephony/voice AI provider:
//! - **Events** (`events`) - the closed inbound webhook event set parsed from
//!   the `message.type` discriminator, plus the assistant-config object
//!   answered to `assistant-request`
//! - **Client** (`client`) - the outbound API for initiating phone calls
//!
//! Inbound payloads are never rejected for missing fields; a live voice
//! session cannot be retried by the caller, so parsing defaults instead of
//! failing.

pub mod client;
pub mod events;

pub use client::{OutboundCall, VapiClient, VapiError};
pub use events::{assistant_config, parse_webhook, VapiEvent};
