//! Shared message and envelope types for the herald broker.
//!
//! Both clients and the broker agree on these shapes: an incoming
//! [`Message`] keyed by its type name, the [`Response`] record produced per
//! handler invocation, and the JSON envelope documents exchanged on the
//! wire. Payload data is carried as [`serde_json::Value`] throughout; the
//! broker never inspects it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One incoming message within a request envelope.
///
/// The `scope` value is opaque: it is echoed back on any response produced
/// from this message and never interpreted. `request_id` is only populated
/// by XML-sourced batches; the JSON envelope carries no per-message id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Name identifying what kind of event or request is being sent.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Structured payload handed to listeners unexamined.
    #[serde(default)]
    pub data: Value,
    /// Opaque value carried through to any response produced from this
    /// message.
    #[serde(default)]
    pub scope: Value,
    /// Correlation id assigned by the client. Present only in XML-sourced
    /// batches and never part of the JSON wire shape.
    #[serde(skip)]
    pub request_id: Option<String>,
}

/// Record produced by one successful handler invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Response type declared by the handler that produced this record.
    pub message_type: String,
    /// The handler's return value, normalised to an empty object when the
    /// handler returned nothing.
    pub data: Value,
    /// Scope copied verbatim from the originating message.
    pub scope: Value,
    /// Correlation id of the originating message, when the batch carried
    /// one.
    pub incoming_request_id: Option<String>,
}

/// Inbound JSON envelope: a single document holding a batch of messages.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RequestEnvelope {
    /// Messages in batch order. Absent means an empty batch.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Outbound JSON envelope: the session identifier plus the collected
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    /// Identifier of the session the batch was processed under.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Responses in dispatch order.
    pub messages: Vec<WireResponse>,
}

/// One response as serialized in the JSON envelope.
///
/// The JSON wire shape omits request-id correlation; only the XML envelope
/// carries it.
#[derive(Debug, Clone, Serialize)]
pub struct WireResponse {
    /// Response type declared by the producing handler.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Response payload.
    pub data: Value,
    /// Scope echoed from the originating message.
    pub scope: Value,
}

impl From<&Response> for WireResponse {
    fn from(response: &Response) -> Self {
        Self {
            message_type: response.message_type.clone(),
            data: response.data.clone(),
            scope: response.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_request_envelope() -> Result<(), serde_json::Error> {
        let envelope: RequestEnvelope =
            serde_json::from_str(r#"{"messages":[{"type":"ping","data":{},"scope":"s1"}]}"#)?;
        let first = envelope.messages.first();
        assert!(first.is_some_and(|message| message.message_type == "ping"));
        assert!(first.is_some_and(|message| message.scope == json!("s1")));
        assert!(first.is_some_and(|message| message.request_id.is_none()));
        Ok(())
    }

    #[test]
    fn missing_data_and_scope_default_to_null() -> Result<(), serde_json::Error> {
        let message: Message = serde_json::from_str(r#"{"type":"ping"}"#)?;
        assert!(message.data.is_null());
        assert!(message.scope.is_null());
        Ok(())
    }

    #[test]
    fn serializes_response_envelope_shape() -> Result<(), serde_json::Error> {
        let envelope = ResponseEnvelope {
            session_id: "abc".into(),
            messages: vec![WireResponse {
                message_type: "pongResponse".into(),
                data: json!({"pong": true}),
                scope: json!("s1"),
            }],
        };
        let value = serde_json::to_value(&envelope)?;
        assert_eq!(
            value,
            json!({
                "sessionId": "abc",
                "messages": [
                    {"type": "pongResponse", "data": {"pong": true}, "scope": "s1"}
                ]
            })
        );
        Ok(())
    }

    #[test]
    fn wire_response_drops_request_id() {
        let response = Response {
            message_type: "r".into(),
            data: json!({}),
            scope: Value::Null,
            incoming_request_id: Some("req-1".into()),
        };
        let wire = WireResponse::from(&response);
        assert_eq!(wire.message_type, "r");
        assert_eq!(wire.scope, Value::Null);
    }
}
