use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transcript::Transcript;

/// Transcript handle shared between concurrent turns for the same call.
///
/// The async mutex is the per-session write lock: a turn holds it across the
/// whole model/tool exchange, so two turns arriving concurrently for one call
/// id serialize instead of racing on the transcript.
pub type SharedTranscript = Arc<tokio::sync::Mutex<Transcript>>;

/// Store of in-flight call sessions, keyed by the provider's call identifier.
///
/// Sessions are created on first use and destroyed when the end-of-call event
/// arrives. There is no persistence; a process restart drops every session.
pub trait SessionStore: Send + Sync {
    /// Get the transcript for a call, creating an empty one on first contact.
    fn transcript(&self, call_id: &str) -> SharedTranscript;

    /// Drop the session. Returns whether one existed.
    fn end(&self, call_id: &str) -> bool;

    fn active_sessions(&self) -> usize;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SharedTranscript>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SharedTranscript>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn transcript(&self, call_id: &str) -> SharedTranscript {
        let mut sessions = self.lock();
        sessions
            .entry(call_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Transcript::new())))
            .clone()
    }

    fn end(&self, call_id: &str) -> bool {
        self.lock().remove(call_id).is_some()
    }

    fn active_sessions(&self) -> usize {
        self.lock().len()
    }
}
