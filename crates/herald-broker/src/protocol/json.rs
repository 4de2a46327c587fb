//! All-JSON envelope: a single document in, a single document out.
//!
//! Unlike the XML adapter this mode carries no per-message correlation id;
//! responses are matched to requests only by batch order. The asymmetry is
//! part of the wire contract and preserved as-is.

use serde_json::Value;
use tracing::debug;

use herald_types::{RequestEnvelope, Response, ResponseEnvelope, WireResponse};

use super::PROTOCOL_TARGET;
use crate::errors::ProtocolError;

/// Decodes a JSON request envelope.
///
/// Returns both the typed envelope and the raw document; the raw value is
/// threaded into handler options under the `request` key.
///
/// # Errors
///
/// Returns `ProtocolError::MalformedJson` when the body is not a valid
/// envelope document.
pub fn decode(input: &str) -> Result<(RequestEnvelope, Value), ProtocolError> {
    let raw: Value = serde_json::from_str(input)
        .map_err(|source| ProtocolError::malformed_json("unparseable request document", source))?;
    let envelope: RequestEnvelope = serde_json::from_value(raw.clone())
        .map_err(|source| ProtocolError::malformed_json("unexpected envelope shape", source))?;

    debug!(
        target: PROTOCOL_TARGET,
        count = envelope.messages.len(),
        "decoded JSON request envelope"
    );
    Ok((envelope, raw))
}

/// Encodes the response envelope for a processed batch.
///
/// # Errors
///
/// Returns `ProtocolError::SerializePayload` when serialization fails.
pub fn encode(session_id: &str, responses: &[Response]) -> Result<String, ProtocolError> {
    let envelope = ResponseEnvelope {
        session_id: session_id.to_string(),
        messages: responses.iter().map(WireResponse::from).collect(),
    };
    Ok(serde_json::to_string(&envelope)?)
}
