//! Session collaborator interface consumed by the broker.
//!
//! The broker neither creates nor destroys sessions. It reads the session
//! identifier for the response envelope, calls [`Session::save`] once
//! before and once after processing a batch, and otherwise forwards the
//! session to listeners unexamined.

/// Opaque per-client context threaded through dispatch.
///
/// `save` must be idempotent: the broker calls it twice per request.
pub trait Session {
    /// Stable identifier for this session.
    fn id(&self) -> &str;

    /// Persists the session to its backing store.
    fn save(&mut self);
}

/// Process-local session with no backing store.
///
/// Suitable for tests and single-process hosts; `save` only counts
/// invocations.
#[derive(Debug, Clone)]
pub struct MemorySession {
    id: String,
    saves: usize,
}

impl MemorySession {
    /// Creates a session with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            saves: 0,
        }
    }

    /// Number of times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn save(&mut self) {
        self.saves += 1;
    }
}
