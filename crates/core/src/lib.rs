//! Ringflow Core - configuration and conversation state
//!
//! Shared foundation for the orchestrator and the tool services:
//! - **Configuration** (`config`) - layered `AppConfig` (defaults, toml file,
//!   `RINGFLOW_*` environment, programmatic overrides) with validation
//! - **Transcript** (`transcript`) - the append-only conversation model
//!   exchanged with the language model (text, tool invocations, tool results)
//! - **Sessions** (`session`) - in-memory, per-call transcript store with
//!   per-session locking
//!
//! # Design Notes
//!
//! Sessions are deliberately process-local: a call is short-lived and scoped
//! to a single phone conversation, so a restart dropping in-flight sessions
//! is acceptable. Nothing in this crate performs network I/O.

pub mod config;
pub mod session;
pub mod transcript;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use session::{InMemorySessionStore, SessionStore, SharedTranscript};
pub use transcript::{ContentBlock, Message, Role, Transcript};
