//! Transport-boundary request handling for the broker.
//!
//! The endpoint is the single entry point the host's transport layer calls
//! per inbound request: it negotiates the wire format, decodes the batch,
//! drives the dispatch engine, and re-encodes the responses. HTTP plumbing
//! stays with the host; the endpoint only produces the status, headers,
//! and body the host should write.
//!
//! Processing is synchronous and sequential: a batch is fully decoded,
//! dispatched, and re-encoded before `handle` returns. `handle` takes
//! `&mut self`; concurrent hosts wrap the endpoint in their own
//! synchronisation.

use tracing::{debug, error, warn};

use herald_types::Message;

use crate::broker::ServiceBroker;
use crate::errors::ProtocolError;
use crate::handler::Options;
use crate::loader::{NullLoader, ServiceLoader};
use crate::protocol::{self, WireFormat};
use crate::session::Session;

pub(crate) const ENDPOINT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::endpoint");

/// Option key under which JSON-mode handlers receive the whole decoded
/// request document.
pub const REQUEST_OPTION: &str = "request";

/// Sentinel date guaranteeing intermediaries treat responses as expired.
const EXPIRES_SENTINEL: &str = "Mon, 26 Jul 1997 05:00:00 GMT";

/// Inbound request as seen at the transport boundary.
#[derive(Debug, Clone)]
pub struct EndpointRequest {
    /// Raw `Content-Type` header value, when present.
    pub content_type: Option<String>,
    /// Request body text.
    pub body: String,
}

impl EndpointRequest {
    /// Creates a request from a content type header and body.
    pub fn new(content_type: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }
}

/// Outbound response for the host's transport layer to write.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers in write order.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
}

impl EndpointResponse {
    fn rejection(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

/// Broker endpoint handling one decoded transport request at a time.
pub struct ServiceEndpoint {
    broker: ServiceBroker,
    loader: Box<dyn ServiceLoader>,
    services_loaded: bool,
}

impl ServiceEndpoint {
    /// Creates an endpoint over a broker whose listeners are registered up
    /// front.
    pub fn new(broker: ServiceBroker) -> Self {
        Self::with_loader(broker, Box::new(NullLoader))
    }

    /// Creates an endpoint that runs `loader` once before the first batch.
    pub fn with_loader(broker: ServiceBroker, loader: Box<dyn ServiceLoader>) -> Self {
        Self {
            broker,
            loader,
            services_loaded: false,
        }
    }

    /// Read access to the underlying broker.
    pub fn broker(&self) -> &ServiceBroker {
        &self.broker
    }

    /// Mutable access to the underlying broker, for direct registration.
    pub fn broker_mut(&mut self) -> &mut ServiceBroker {
        &mut self.broker
    }

    /// Processes one inbound request to completion.
    ///
    /// Unsupported content types are rejected with `406` and no dispatch
    /// occurs. Malformed envelopes are rejected with `400`. Accepted
    /// requests always yield a well-formed envelope, even when empty.
    pub fn handle(
        &mut self,
        request: &EndpointRequest,
        session: &mut dyn Session,
    ) -> EndpointResponse {
        if !self.services_loaded {
            self.loader.load(&mut self.broker);
            self.services_loaded = true;
        }

        session.save();

        let format = match WireFormat::negotiate(request.content_type.as_deref()) {
            Ok(format) => format,
            Err(error) => {
                error!(target: ENDPOINT_TARGET, %error, "rejecting request");
                return EndpointResponse::rejection(error.http_status());
            }
        };

        debug!(
            target: ENDPOINT_TARGET,
            format = ?format,
            session = session.id(),
            "processing batch"
        );

        let body = match self.render(format, &request.body, session) {
            Ok(body) => body,
            Err(error) => {
                warn!(target: ENDPOINT_TARGET, %error, "rejecting envelope");
                return EndpointResponse::rejection(error.http_status());
            }
        };

        session.save();

        EndpointResponse {
            status: 200,
            headers: success_headers(format),
            body,
        }
    }

    fn render(
        &self,
        format: WireFormat,
        body: &str,
        session: &mut dyn Session,
    ) -> Result<String, ProtocolError> {
        match format {
            WireFormat::Handshake => Ok(String::new()),
            WireFormat::Xml => self.render_xml(body, session),
            WireFormat::Json => self.render_json(body, session),
        }
    }

    fn render_xml(&self, body: &str, session: &mut dyn Session) -> Result<String, ProtocolError> {
        let session_id = session.id().to_string();
        let mut writer = protocol::xml::XmlResponseWriter::begin(Vec::new(), &session_id)?;

        if !body.trim().is_empty() {
            let messages = protocol::xml::decode(body)?;
            let options = Options::new();
            for message in &messages {
                for response in self.broker.dispatch(message, &mut *session, &options) {
                    writer.write_response(&response)?;
                }
            }
        }

        let bytes = writer.finish()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn render_json(&self, body: &str, session: &mut dyn Session) -> Result<String, ProtocolError> {
        let session_id = session.id().to_string();
        if body.trim().is_empty() {
            return protocol::json::encode(&session_id, &[]);
        }

        let (envelope, raw) = protocol::json::decode(body)?;
        let mut options = Options::new();
        options.insert(REQUEST_OPTION.to_string(), raw);

        let mut responses = Vec::new();
        for message in &envelope.messages {
            responses.extend(self.dispatch_message(message, &mut *session, &options));
        }
        protocol::json::encode(&session_id, &responses)
    }

    fn dispatch_message(
        &self,
        message: &Message,
        session: &mut dyn Session,
        options: &Options,
    ) -> Vec<herald_types::Response> {
        self.broker.dispatch(message, session, options).collect()
    }
}

fn success_headers(format: WireFormat) -> Vec<(String, String)> {
    vec![
        (
            "Content-Type".to_string(),
            format!("{}; charset=utf-8", format.mime_type()),
        ),
        ("Pragma".to_string(), "no-cache".to_string()),
        (
            "Cache-Control".to_string(),
            "no-cache, no-store, private, must-revalidate".to_string(),
        ),
        ("Expires".to_string(), EXPIRES_SENTINEL.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerSpec;
    use crate::session::MemorySession;
    use serde_json::{Value, json};

    fn ping_broker() -> ServiceBroker {
        let mut broker = ServiceBroker::new();
        broker.register(
            "ping",
            HandlerSpec::new("ping")
                .response("pongResponse")
                .payload(|_| Ok(Some(json!({"pong": true})))),
        );
        broker
    }

    #[test]
    fn unsupported_content_type_is_rejected_without_dispatch() {
        let mut broker = ServiceBroker::new();
        broker.register(
            "ping",
            HandlerSpec::new("tripwire")
                .response("r")
                .payload(|_| panic!("dispatch must not run")),
        );
        let mut endpoint = ServiceEndpoint::new(broker);
        let mut session = MemorySession::new("s");

        let request = EndpointRequest::new(
            Some("text/plain"),
            r#"{"messages":[{"type":"ping","data":{}}]}"#,
        );
        let response = endpoint.handle(&request, &mut session);

        assert_eq!(response.status, 406);
        assert!(response.body.is_empty());
        assert!(response.headers.is_empty());
    }

    #[test]
    fn handshake_probe_yields_empty_ok() {
        let mut endpoint = ServiceEndpoint::new(ServiceBroker::new());
        let mut session = MemorySession::new("s");

        let request = EndpointRequest::new(Some("application/x-www-form-urlencoded"), "");
        let response = endpoint.handle(&request, &mut session);

        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        let content_type = response
            .headers
            .iter()
            .find(|(name, _)| name == "Content-Type")
            .map(|(_, value)| value.as_str());
        assert_eq!(
            content_type,
            Some("application/x-www-form-urlencoded; charset=utf-8")
        );
    }

    #[test]
    fn session_is_saved_before_and_after_processing() {
        let mut endpoint = ServiceEndpoint::new(ping_broker());
        let mut session = MemorySession::new("s");

        let request = EndpointRequest::new(Some("application/json"), "{}");
        endpoint.handle(&request, &mut session);

        assert_eq!(session.save_count(), 2);
    }

    #[test]
    fn json_batch_round_trip() {
        let mut endpoint = ServiceEndpoint::new(ping_broker());
        let mut session = MemorySession::new("sess-1");

        let request = EndpointRequest::new(
            Some("application/json"),
            r#"{"messages":[{"type":"ping","data":{},"scope":"s1"}]}"#,
        );
        let response = endpoint.handle(&request, &mut session);

        assert_eq!(response.status, 200);
        let value: Value = serde_json::from_str(&response.body).expect("valid json");
        assert_eq!(
            value,
            json!({
                "sessionId": "sess-1",
                "messages": [
                    {"type": "pongResponse", "data": {"pong": true}, "scope": "s1"}
                ]
            })
        );
    }

    #[test]
    fn empty_body_defaults_to_empty_xml_envelope() {
        let mut endpoint = ServiceEndpoint::new(ServiceBroker::new());
        let mut session = MemorySession::new("sess-2");

        let request = EndpointRequest::new(None, "");
        let response = endpoint.handle(&request, &mut session);

        assert_eq!(response.status, 200);
        assert!(response.body.contains("sessionid='sess-2'"));
        assert!(!response.body.contains("<message "));
    }

    #[test]
    fn malformed_json_envelope_is_rejected() {
        let mut endpoint = ServiceEndpoint::new(ping_broker());
        let mut session = MemorySession::new("s");

        let request = EndpointRequest::new(Some("application/json"), "{not json");
        let response = endpoint.handle(&request, &mut session);

        assert_eq!(response.status, 400);
        assert!(response.body.is_empty());
    }

    #[test]
    fn loader_runs_once_across_requests() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static LOADS: AtomicUsize = AtomicUsize::new(0);

        let loader = |broker: &mut ServiceBroker| {
            LOADS.fetch_add(1, Ordering::SeqCst);
            broker.register(
                "ping",
                HandlerSpec::new("ping")
                    .response("pongResponse")
                    .payload(|_| Ok(Some(json!({"pong": true})))),
            );
        };
        let mut endpoint =
            ServiceEndpoint::with_loader(ServiceBroker::new(), Box::new(loader));
        let mut session = MemorySession::new("s");

        let request = EndpointRequest::new(
            Some("application/json"),
            r#"{"messages":[{"type":"ping","data":{}}]}"#,
        );
        let first = endpoint.handle(&request, &mut session);
        let second = endpoint.handle(&request, &mut session);

        assert_eq!(LOADS.load(Ordering::SeqCst), 1);
        assert!(first.body.contains("pongResponse"));
        assert!(second.body.contains("pongResponse"));
    }

    #[test]
    fn json_handlers_can_opt_into_the_request_option() {
        let mut broker = ServiceBroker::new();
        broker.register(
            "introspect",
            HandlerSpec::new("introspect")
                .response("introspectResponse")
                .payload_with_options(|_data, options| {
                    Ok(options.get(REQUEST_OPTION).cloned())
                }),
        );
        let mut endpoint = ServiceEndpoint::new(broker);
        let mut session = MemorySession::new("s");

        let body = r#"{"messages":[{"type":"introspect","data":{}}]}"#;
        let request = EndpointRequest::new(Some("application/json"), body);
        let response = endpoint.handle(&request, &mut session);

        let value: Value = serde_json::from_str(&response.body).expect("valid json");
        let expected: Value = serde_json::from_str(body).expect("valid body");
        let echoed = value
            .get("messages")
            .and_then(|messages| messages.get(0))
            .and_then(|message| message.get("data"));
        assert_eq!(echoed, Some(&expected));
    }

    #[test]
    fn cache_busting_headers_are_present() {
        let mut endpoint = ServiceEndpoint::new(ServiceBroker::new());
        let mut session = MemorySession::new("s");

        let response = endpoint.handle(&EndpointRequest::new(None, ""), &mut session);

        let names: Vec<&str> = response
            .headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec![
            "Content-Type",
            "Pragma",
            "Cache-Control",
            "Expires"
        ]);
        assert!(
            response
                .headers
                .iter()
                .any(|(name, value)| name == "Cache-Control" && value.contains("must-revalidate"))
        );
    }
}
