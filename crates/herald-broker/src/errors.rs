//! Error types for the broker's protocol and registration boundaries.
//!
//! Only protocol-level failures (content negotiation, envelope decoding,
//! response encoding) ever reach the transport layer. Faults raised inside
//! handler invocations travel as [`BoxError`] and are swallowed by the
//! dispatch engine after logging; they never appear here.

use std::io;

use thiserror::Error;

/// Boxed error carried by a failing handler invocation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced while decoding a request envelope or encoding the
/// response envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The request carried a content type outside the supported set.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// The XML envelope could not be parsed.
    #[error("malformed XML envelope: {message}")]
    MalformedXml {
        message: String,
        #[source]
        source: Option<roxmltree::Error>,
    },

    /// The JSON envelope could not be parsed.
    #[error("malformed JSON envelope: {message}")]
    MalformedJson {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// An XML message element lacks a required attribute.
    #[error("message {index} is missing the '{attribute}' attribute")]
    MissingAttribute { index: usize, attribute: &'static str },

    /// The JSON payload embedded in an XML message body failed to decode.
    #[error("failed to decode payload for message '{message_type}': {source}")]
    PayloadDecode {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// A response payload failed to serialize.
    #[error("failed to serialize response payload: {0}")]
    SerializePayload(#[from] serde_json::Error),

    /// IO failure while writing an envelope.
    #[error("IO error while writing envelope: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Maps this error onto the transport rejection status.
    ///
    /// Unsupported content types are refused outright; malformed envelopes
    /// are client errors; encoding and IO failures are the broker's own.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::UnsupportedContentType { .. } => 406,
            Self::MalformedXml { .. }
            | Self::MalformedJson { .. }
            | Self::MissingAttribute { .. }
            | Self::PayloadDecode { .. } => 400,
            Self::SerializePayload(_) | Self::Io(_) => 500,
        }
    }

    /// Creates an unsupported content type error.
    pub fn unsupported(content_type: impl Into<String>) -> Self {
        Self::UnsupportedContentType {
            content_type: content_type.into(),
        }
    }

    /// Creates a malformed XML error from a parser error.
    pub fn malformed_xml(message: impl Into<String>, source: roxmltree::Error) -> Self {
        Self::MalformedXml {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a malformed JSON error from a serde error.
    pub fn malformed_json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Errors raised while building a handler registration.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The declared parameter count falls outside the supported 0..=3
    /// range.
    #[error("handler '{name}' declares {arity} parameters; supported arities are 0 to 3")]
    UnsupportedArity { name: String, arity: usize },
}
