//! Message-dispatch broker embedded inside a host web application.
//!
//! Client code posts batches of named messages (XML or JSON envelopes) to
//! a single endpoint; the broker routes each message, by type name, to
//! zero or more registered listeners and collects their results into a
//! response envelope returned on the same round trip.
//!
//! ## Pipeline
//!
//! 1. The host's transport layer hands the raw request to
//!    [`ServiceEndpoint::handle`].
//! 2. The [`protocol`] adapters negotiate the wire format and decode the
//!    batch into [`herald_types::Message`] values.
//! 3. [`ServiceBroker::dispatch`] consults the [`ListenerTable`] and
//!    invokes each matched listener through its [`ServiceHandler`]
//!    adapter, isolating per-listener faults.
//! 4. Responses are re-encoded in the inbound wire format and returned.
//!
//! Dispatch is strictly local, in-process, and synchronous per request:
//! there is no durability, no delivery guarantee beyond the round trip,
//! and no coordination across processes.
//!
//! ## Registration
//!
//! Listeners are registered explicitly at startup, either directly on the
//! broker or through a one-shot [`ServiceLoader`]:
//!
//! ```rust,ignore
//! let mut broker = ServiceBroker::new();
//! broker.register(
//!     "chat.send",
//!     HandlerSpec::new("chat-send")
//!         .response("chat.sent")
//!         .payload_session(|data, session| { /* ... */ Ok(None) }),
//! );
//! let endpoint = ServiceEndpoint::new(broker);
//! ```

mod broker;
mod config;
mod endpoint;
mod errors;
mod handler;
mod loader;
pub mod protocol;
mod proxy;
mod registry;
mod session;
mod telemetry;

pub use broker::ServiceBroker;
pub use config::{BrokerConfig, DEFAULT_LOG_FILTER, LogFormat};
pub use endpoint::{
    EndpointRequest, EndpointResponse, REQUEST_OPTION, ServiceEndpoint,
};
pub use errors::{BoxError, ProtocolError, RegistrationError};
pub use handler::{HandlerResult, HandlerSpec, Options, ServiceHandler, Signature};
pub use loader::{NullLoader, ServiceLoader};
pub use protocol::WireFormat;
pub use proxy::{CrossDomainProxy, FetchedResponse, ProxyResponse, UrlFetcher};
pub use registry::ListenerTable;
pub use session::{MemorySession, Session};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise};
