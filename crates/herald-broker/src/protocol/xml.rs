//! XML-wrapped envelope: decoding request batches and streaming response
//! documents.
//!
//! Inbound documents carry one child element per message with `type` and
//! `requestid` attributes and a JSON-encoded text body. Outbound documents
//! mirror that shape, copying each response's originating `requestid` and
//! wrapping the serialized payload in CDATA so arbitrary JSON stays opaque
//! to the markup parser.

use std::io::Write;

use serde_json::Value;
use tracing::debug;

use herald_types::{Message, Response};

use super::PROTOCOL_TARGET;
use crate::errors::ProtocolError;

const TYPE_ATTRIBUTE: &str = "type";
const REQUEST_ID_ATTRIBUTE: &str = "requestid";

/// Decodes an XML request envelope into messages in document order.
///
/// The `scope` of XML-sourced messages is absent on the wire and defaults
/// to null.
///
/// # Errors
///
/// Returns a `ProtocolError` when the document is unparseable, a message
/// element lacks its `type` attribute, or an embedded payload is not valid
/// JSON.
pub fn decode(input: &str) -> Result<Vec<Message>, ProtocolError> {
    let document = roxmltree::Document::parse(input)
        .map_err(|source| ProtocolError::malformed_xml("unparseable document", source))?;

    let mut messages = Vec::new();
    for (index, node) in document
        .root_element()
        .children()
        .filter(roxmltree::Node::is_element)
        .enumerate()
    {
        let message_type =
            node.attribute(TYPE_ATTRIBUTE)
                .ok_or(ProtocolError::MissingAttribute {
                    index,
                    attribute: TYPE_ATTRIBUTE,
                })?;
        let request_id = node.attribute(REQUEST_ID_ATTRIBUTE).map(str::to_string);
        let text = node.text().unwrap_or_default();
        let data: Value =
            serde_json::from_str(text).map_err(|source| ProtocolError::PayloadDecode {
                message_type: message_type.to_string(),
                source,
            })?;
        messages.push(Message {
            message_type: message_type.to_string(),
            data,
            scope: Value::Null,
            request_id,
        });
    }

    debug!(
        target: PROTOCOL_TARGET,
        count = messages.len(),
        "decoded XML request envelope"
    );
    Ok(messages)
}

/// Streams an XML response envelope, one `<message>` element per response.
///
/// The document is written incrementally so responses can be emitted as
/// each message in the batch is dispatched.
pub struct XmlResponseWriter<W> {
    writer: W,
}

impl<W: Write> XmlResponseWriter<W> {
    /// Writes the document prologue and opens the root element carrying
    /// the session identifier.
    ///
    /// # Errors
    ///
    /// Returns an error when writing fails.
    pub fn begin(mut writer: W, session_id: &str) -> Result<Self, ProtocolError> {
        write!(
            writer,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><messages version='1.0' sessionid='{}'>",
            escape_attribute(session_id)
        )?;
        Ok(Self { writer })
    }

    /// Writes one response element, correlating it to its originating
    /// request id.
    ///
    /// # Errors
    ///
    /// Returns an error when payload serialization or writing fails.
    pub fn write_response(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let payload = serde_json::to_string(&response.data)?;
        write!(
            self.writer,
            "<message requestid='{}' direction='OUTGOING' datatype='JSON' type='{}'><![CDATA[{}]]></message>",
            escape_attribute(response.incoming_request_id.as_deref().unwrap_or_default()),
            escape_attribute(&response.message_type),
            escape_cdata(&payload)
        )?;
        Ok(())
    }

    /// Closes the root element, flushes, and hands the writer back.
    ///
    /// # Errors
    ///
    /// Returns an error when writing or flushing fails.
    pub fn finish(mut self) -> Result<W, ProtocolError> {
        write!(self.writer, "</messages>")?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Escapes a value for use inside a single-quoted XML attribute.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\'' => escaped.push_str("&apos;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Splits any `]]>` inside the payload across two CDATA sections so the
/// data segment cannot terminate the surrounding markup.
fn escape_cdata(payload: &str) -> String {
    payload.replace("]]>", "]]]]><![CDATA[>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = concat!(
        "<?xml version=\"1.0\"?><request version='1.0'>",
        "<message type='chat.send' requestid='req-1'>{\"text\":\"hi\"}</message>",
        "<message type='presence.update' requestid='req-2'>{\"away\":false}</message>",
        "</request>"
    );

    #[test]
    fn decodes_messages_in_document_order() {
        let messages = decode(SAMPLE).expect("decode sample");
        let summary: Vec<(&str, Option<&str>)> = messages
            .iter()
            .map(|message| {
                (
                    message.message_type.as_str(),
                    message.request_id.as_deref(),
                )
            })
            .collect();
        assert_eq!(summary, vec![
            ("chat.send", Some("req-1")),
            ("presence.update", Some("req-2")),
        ]);
        assert_eq!(messages.first().map(|m| &m.data), Some(&json!({"text": "hi"})));
        assert!(messages.iter().all(|message| message.scope.is_null()));
    }

    #[test]
    fn missing_type_attribute_is_rejected() {
        let input = "<request><message requestid='r'>{}</message></request>";
        let error = decode(input).expect_err("should reject");
        assert!(matches!(
            error,
            ProtocolError::MissingAttribute {
                attribute: "type",
                ..
            }
        ));
    }

    #[test]
    fn bad_embedded_payload_is_rejected() {
        let input = "<request><message type='t' requestid='r'>not json</message></request>";
        let error = decode(input).expect_err("should reject");
        assert!(matches!(error, ProtocolError::PayloadDecode { .. }));
    }

    #[test]
    fn unparseable_document_is_rejected() {
        let error = decode("<request><unclosed>").expect_err("should reject");
        assert!(matches!(error, ProtocolError::MalformedXml { .. }));
    }

    #[test]
    fn round_trip_preserves_request_id_correlation() {
        let messages = decode(SAMPLE).expect("decode sample");
        let first = messages.first().expect("first message");

        let response = Response {
            message_type: "chat.sent".into(),
            data: json!({"ok": true}),
            scope: Value::Null,
            incoming_request_id: first.request_id.clone(),
        };
        let mut writer =
            XmlResponseWriter::begin(Vec::new(), "session-9").expect("begin envelope");
        writer.write_response(&response).expect("write response");
        let output = String::from_utf8(writer.finish().expect("finish")).expect("utf8");

        assert!(output.contains("sessionid='session-9'"));
        assert!(output.contains("requestid='req-1'"));
        assert!(output.contains("direction='OUTGOING'"));
        assert!(output.contains("datatype='JSON'"));
        assert!(output.contains("type='chat.sent'"));
        assert!(output.contains("<![CDATA[{\"ok\":true}]]>"));
        assert!(output.ends_with("</messages>"));
    }

    #[test]
    fn cdata_terminator_in_payload_is_split() {
        let response = Response {
            message_type: "echo".into(),
            data: json!({"text": "a]]>b"}),
            scope: Value::Null,
            incoming_request_id: None,
        };
        let mut writer = XmlResponseWriter::begin(Vec::new(), "s").expect("begin");
        writer.write_response(&response).expect("write");
        let output = String::from_utf8(writer.finish().expect("finish")).expect("utf8");

        assert!(output.contains("]]]]><![CDATA[>"));
        // The payload must decode back to the original once the CDATA
        // sections are joined.
        let rejoined = output.replace("]]]]><![CDATA[>", "]]>");
        assert!(rejoined.contains(r#"{"text":"a]]>b"}"#));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let response = Response {
            message_type: "a<b&'c".into(),
            data: json!({}),
            scope: Value::Null,
            incoming_request_id: None,
        };
        let mut writer = XmlResponseWriter::begin(Vec::new(), "s").expect("begin");
        writer.write_response(&response).expect("write");
        let output = String::from_utf8(writer.finish().expect("finish")).expect("utf8");
        assert!(output.contains("type='a&lt;b&amp;&apos;c'"));
    }

    #[test]
    fn empty_envelope_has_no_message_elements() {
        let writer = XmlResponseWriter::begin(Vec::new(), "s").expect("begin");
        let output = String::from_utf8(writer.finish().expect("finish")).expect("utf8");
        assert!(!output.contains("<message"));
        assert!(output.contains("<messages version='1.0' sessionid='s'>"));
    }
}
