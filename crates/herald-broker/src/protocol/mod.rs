//! Envelope protocol adapters and content-type negotiation.
//!
//! Two wire shapes carry the same semantics: the XML-wrapped envelope with
//! per-message correlation ids and JSON payloads embedded in CDATA, and
//! the all-JSON envelope. A third, empty-body form-encoded variant exists
//! only for the client's first handshake request. Everything else is a
//! protocol error rejected at the transport boundary.

pub mod json;
pub mod xml;

use crate::errors::ProtocolError;

pub(crate) const PROTOCOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::protocol");

/// Mimetype selecting the XML-wrapped envelope. Also the default when no
/// content type is supplied.
pub const MIME_XML: &str = "text/xml";
/// Mimetype selecting the all-JSON envelope.
pub const MIME_JSON: &str = "application/json";
/// Mimetype of the empty-body handshake probe.
pub const MIME_HANDSHAKE: &str = "application/x-www-form-urlencoded";

/// Wire encoding negotiated from the inbound content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// XML-wrapped envelope with embedded JSON payloads.
    Xml,
    /// Single JSON document envelope.
    Json,
    /// Empty-body probe sent as the very first request.
    Handshake,
}

impl WireFormat {
    /// Selects the adapter for an inbound content type header.
    ///
    /// Parameters after `;` are stripped and surrounding whitespace is
    /// ignored. An absent or empty header defaults to XML.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::UnsupportedContentType` for any other
    /// mimetype.
    pub fn negotiate(content_type: Option<&str>) -> Result<Self, ProtocolError> {
        let mimetype = content_type
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim();
        match mimetype {
            "" | MIME_XML => Ok(Self::Xml),
            MIME_JSON => Ok(Self::Json),
            MIME_HANDSHAKE => Ok(Self::Handshake),
            other => Err(ProtocolError::unsupported(other)),
        }
    }

    /// The mimetype echoed back on successful responses.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Xml => MIME_XML,
            Self::Json => MIME_JSON,
            Self::Handshake => MIME_HANDSHAKE,
        }
    }
}
