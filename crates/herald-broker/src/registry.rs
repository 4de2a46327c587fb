//! In-memory registration table mapping message types to ordered listener
//! lists.
//!
//! The table is built once at startup (usually through a
//! [`crate::loader::ServiceLoader`]) and treated as read-only during
//! dispatch. A lookup miss is a normal outcome, never an error.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::handler::ServiceHandler;

pub(crate) const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Prefixes reserved for transport-level routing metadata.
///
/// Handler-declared type names must not use them; registration still
/// proceeds, but a warning is emitted.
const RESERVED_PREFIXES: [&str; 4] = ["r", "l", "remote", "local"];

/// Ordered registration table keyed by message type.
#[derive(Debug, Default)]
pub struct ListenerTable {
    listeners: HashMap<String, Vec<Arc<ServiceHandler>>>,
}

impl ListenerTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener to the list for `message_type`, creating the list
    /// on first use.
    ///
    /// Reserved routing prefixes (`r:`, `l:`, `remote:`, `local:`, case
    /// insensitive) are warned about but do not block registration.
    pub fn register(&mut self, message_type: &str, handler: Arc<ServiceHandler>) {
        if has_reserved_prefix(message_type) {
            warn!(
                target: REGISTRY_TARGET,
                message_type,
                handler = handler.name(),
                "message type uses a reserved routing prefix"
            );
        }
        self.listeners
            .entry(message_type.to_string())
            .or_default()
            .push(handler);
    }

    /// Removes every occurrence of `handler` (compared by reference
    /// identity) from the list for `message_type`.
    ///
    /// Unknown types produce a warning and leave the table untouched.
    pub fn unregister(&mut self, message_type: &str, handler: &Arc<ServiceHandler>) {
        match self.listeners.get_mut(message_type) {
            Some(entries) => entries.retain(|entry| !Arc::ptr_eq(entry, handler)),
            None => warn!(
                target: REGISTRY_TARGET,
                message_type,
                "no listeners registered for message type"
            ),
        }
    }

    /// Listeners registered for `message_type`, in registration order.
    ///
    /// A miss yields the empty slice.
    pub fn lookup(&self, message_type: &str) -> &[Arc<ServiceHandler>] {
        self.listeners
            .get(message_type)
            .map_or(&[], |entries| entries.as_slice())
    }

    /// Message types with at least one registration, for diagnostics.
    pub fn message_types(&self) -> impl Iterator<Item = &str> {
        self.listeners
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(message_type, _)| message_type.as_str())
    }
}

fn has_reserved_prefix(message_type: &str) -> bool {
    message_type.split_once(':').is_some_and(|(prefix, _)| {
        RESERVED_PREFIXES
            .iter()
            .any(|reserved| prefix.eq_ignore_ascii_case(reserved))
    })
}
