//! Dispatch engine fanning one message out to its registered listeners.
//!
//! The engine is stateless across calls: all state lives in the
//! [`ListenerTable`], which dispatch only reads. Responses are produced
//! lazily, in registration order, and one listener's fault never affects
//! its siblings or the rest of the batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{error, info, warn};

use herald_types::{Message, Response};

use crate::handler::{Options, ServiceHandler};
use crate::registry::ListenerTable;
use crate::session::Session;

pub(crate) const BROKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::broker");

/// Routes messages to listeners registered by type name.
#[derive(Debug, Default)]
pub struct ServiceBroker {
    table: ListenerTable,
}

impl ServiceBroker {
    /// Creates a broker with an empty registration table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `message_type` and returns the handle used
    /// for identity-based unregistration.
    pub fn register(&mut self, message_type: &str, handler: ServiceHandler) -> Arc<ServiceHandler> {
        let handler = Arc::new(handler);
        self.table.register(message_type, Arc::clone(&handler));
        handler
    }

    /// Registers an already-shared listener, e.g. the same handler under a
    /// second message type.
    pub fn register_shared(&mut self, message_type: &str, handler: Arc<ServiceHandler>) {
        self.table.register(message_type, handler);
    }

    /// Removes every registration of `handler` under `message_type`.
    pub fn unregister(&mut self, message_type: &str, handler: &Arc<ServiceHandler>) {
        self.table.unregister(message_type, handler);
    }

    /// Read access to the registration table, for diagnostics.
    pub fn table(&self) -> &ListenerTable {
        &self.table
    }

    /// Dispatches one message to every listener registered for its type.
    ///
    /// Returns a lazy sequence of response records in registration order.
    /// A lookup miss logs a warning and yields an empty sequence. Listener
    /// faults (error returns and panics alike) are logged and swallowed;
    /// the remaining listeners still run.
    pub fn dispatch<'a>(
        &self,
        message: &'a Message,
        session: &'a mut dyn Session,
        options: &'a Options,
    ) -> impl Iterator<Item = Response> + use<'a> {
        let listeners: Vec<Arc<ServiceHandler>> = self.table.lookup(&message.message_type).to_vec();
        if listeners.is_empty() {
            warn!(
                target: BROKER_TARGET,
                message_type = %message.message_type,
                "no listeners for message"
            );
        }
        listeners
            .into_iter()
            .filter_map(move |listener| invoke_listener(&listener, message, &mut *session, options))
    }
}

/// Invokes one listener under fault isolation and packages its response.
fn invoke_listener(
    listener: &ServiceHandler,
    message: &Message,
    session: &mut dyn Session,
    options: &Options,
) -> Option<Response> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        listener.invoke(&message.data, session, &message.message_type, options)
    }));

    let result = match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(fault)) => {
            error!(
                target: BROKER_TARGET,
                listener = listener.name(),
                message_type = %message.message_type,
                error = %fault,
                "listener failed"
            );
            return None;
        }
        Err(payload) => {
            error!(
                target: BROKER_TARGET,
                listener = listener.name(),
                message_type = %message.message_type,
                panic = panic_message(payload.as_ref()),
                "listener panicked"
            );
            return None;
        }
    };

    let Some(response_type) = listener.response_type() else {
        info!(
            target: BROKER_TARGET,
            listener = listener.name(),
            message_type = %message.message_type,
            "no response declared for listener"
        );
        return None;
    };

    Some(Response {
        message_type: response_type.to_string(),
        data: normalise(result),
        scope: message.scope.clone(),
        incoming_request_id: message.request_id.clone(),
    })
}

/// Normalises absent or empty listener results to an empty object.
///
/// Zero counts as empty, matching the wire contract's falsiness rules.
fn normalise(result: Option<Value>) -> Value {
    let value = result.unwrap_or(Value::Null);
    let empty = match &value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Number(number) => number.as_f64() == Some(0.0),
    };
    if empty { Value::Object(Map::new()) } else { value }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "non-string panic payload"
    }
}
