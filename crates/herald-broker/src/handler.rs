//! Handler adapter normalising declared signatures into one invocation
//! shape.
//!
//! Listeners declare interest in a prefix of `(payload, session,
//! message_type)` plus an optional set of named extra options. The adapter
//! wraps whichever shape the listener declared into the uniform
//! `(payload, session, message_type, options)` call used by the dispatch
//! engine, and attaches the listener's metadata: the declared response type
//! (absent means fire-and-forget) and a diagnostic name for logging.

use std::fmt;

use serde_json::{Map, Value};
use tracing::error;

use crate::errors::{BoxError, RegistrationError};
use crate::session::Session;

pub(crate) const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handler");

/// Named extra options forwarded to listeners that opt in.
pub type Options = Map<String, Value>;

/// Result of one listener invocation.
///
/// `Ok(None)` means the listener ran for its side effect and produced no
/// payload; the engine normalises it before packaging.
pub type HandlerResult = Result<Option<Value>, BoxError>;

type UniformFn =
    Box<dyn Fn(&Value, &mut dyn Session, &str, &Options) -> HandlerResult + Send + Sync>;

/// Declared parameter shape of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signature {
    /// The listener wants nothing.
    Nullary,
    /// Payload only.
    Payload,
    /// Payload and session.
    PayloadSession,
    /// Payload, session, and message type.
    Full,
}

impl Signature {
    /// Maps a declared parameter count onto a signature variant.
    ///
    /// # Errors
    ///
    /// Returns `RegistrationError::UnsupportedArity` for counts outside
    /// 0..=3. The `name` is only used for the error message.
    pub fn from_arity(arity: usize, name: &str) -> Result<Self, RegistrationError> {
        match arity {
            0 => Ok(Self::Nullary),
            1 => Ok(Self::Payload),
            2 => Ok(Self::PayloadSession),
            3 => Ok(Self::Full),
            _ => Err(RegistrationError::UnsupportedArity {
                name: name.to_string(),
                arity,
            }),
        }
    }

    /// The declared parameter count for this shape.
    pub fn arity(self) -> usize {
        match self {
            Self::Nullary => 0,
            Self::Payload => 1,
            Self::PayloadSession => 2,
            Self::Full => 3,
        }
    }
}

/// A listener adapted to the uniform invocation shape, plus metadata.
pub struct ServiceHandler {
    invoke: UniformFn,
    signature: Signature,
    wants_options: bool,
    response_type: Option<String>,
    name: String,
}

impl ServiceHandler {
    pub(crate) fn invoke(
        &self,
        data: &Value,
        session: &mut dyn Session,
        message_type: &str,
        options: &Options,
    ) -> HandlerResult {
        (self.invoke)(data, session, message_type, options)
    }

    /// Response type declared at registration; `None` means fire-and-forget.
    pub fn response_type(&self) -> Option<&str> {
        self.response_type.as_deref()
    }

    /// Diagnostic name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter shape.
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Whether the listener opted into receiving extra options.
    pub fn wants_options(&self) -> bool {
        self.wants_options
    }
}

impl fmt::Debug for ServiceHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandler")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("wants_options", &self.wants_options)
            .field("response_type", &self.response_type)
            .finish_non_exhaustive()
    }
}

/// Builder collecting listener metadata before adaptation.
///
/// Terminal methods accept the listener in its declared shape and produce a
/// [`ServiceHandler`] wrapping it in the uniform invocation shape.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    name: String,
    response_type: Option<String>,
}

impl HandlerSpec {
    /// Starts a spec with the given diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            response_type: None,
        }
    }

    /// Declares the response type emitted for successful invocations.
    ///
    /// Without this the listener is fire-and-forget: it still runs, but no
    /// response record is produced.
    #[must_use]
    pub fn response(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = Some(response_type.into());
        self
    }

    fn build(self, signature: Signature, wants_options: bool, invoke: UniformFn) -> ServiceHandler {
        ServiceHandler {
            invoke,
            signature,
            wants_options,
            response_type: self.response_type,
            name: self.name,
        }
    }

    /// Adapts a listener that wants nothing.
    pub fn nullary(
        self,
        handler: impl Fn() -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Nullary,
            false,
            Box::new(
                move |_data: &Value, _session: &mut dyn Session, _message_type: &str, _options: &Options| {
                    handler()
                },
            ),
        )
    }

    /// Adapts a listener that wants only the extra options.
    pub fn nullary_with_options(
        self,
        handler: impl Fn(&Options) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Nullary,
            true,
            Box::new(
                move |_data: &Value, _session: &mut dyn Session, _message_type: &str, options: &Options| {
                    handler(options)
                },
            ),
        )
    }

    /// Adapts a listener that wants the payload.
    pub fn payload(
        self,
        handler: impl Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Payload,
            false,
            Box::new(
                move |data: &Value, _session: &mut dyn Session, _message_type: &str, _options: &Options| {
                    handler(data)
                },
            ),
        )
    }

    /// Adapts a listener that wants the payload and the extra options.
    pub fn payload_with_options(
        self,
        handler: impl Fn(&Value, &Options) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Payload,
            true,
            Box::new(
                move |data: &Value, _session: &mut dyn Session, _message_type: &str, options: &Options| {
                    handler(data, options)
                },
            ),
        )
    }

    /// Adapts a listener that wants the payload and the session.
    pub fn payload_session(
        self,
        handler: impl Fn(&Value, &mut dyn Session) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::PayloadSession,
            false,
            Box::new(
                move |data: &Value, session: &mut dyn Session, _message_type: &str, _options: &Options| {
                    handler(data, session)
                },
            ),
        )
    }

    /// Adapts a listener that wants payload, session, and options.
    pub fn payload_session_with_options(
        self,
        handler: impl Fn(&Value, &mut dyn Session, &Options) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::PayloadSession,
            true,
            Box::new(
                move |data: &Value, session: &mut dyn Session, _message_type: &str, options: &Options| {
                    handler(data, session, options)
                },
            ),
        )
    }

    /// Adapts a listener that wants payload, session, and message type.
    pub fn full(
        self,
        handler: impl Fn(&Value, &mut dyn Session, &str) -> HandlerResult + Send + Sync + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Full,
            false,
            Box::new(
                move |data: &Value, session: &mut dyn Session, message_type: &str, _options: &Options| {
                    handler(data, session, message_type)
                },
            ),
        )
    }

    /// Adapts a listener that wants every parameter plus options.
    pub fn full_with_options(
        self,
        handler: impl Fn(&Value, &mut dyn Session, &str, &Options) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> ServiceHandler {
        self.build(
            Signature::Full,
            true,
            Box::new(
                move |data: &Value, session: &mut dyn Session, message_type: &str, options: &Options| {
                    handler(data, session, message_type, options)
                },
            ),
        )
    }

    /// Adapts a uniform-shape callable declared with an explicit arity.
    ///
    /// This is the registration path for hosts that bind listeners
    /// dynamically and only know the declared parameter count as data. The
    /// callable receives the uniform shape and is trusted to consult only
    /// its declared parameters.
    ///
    /// # Errors
    ///
    /// Counts outside 0..=3 are refused: the error is logged and no handler
    /// is produced, so the registration becomes a no-op.
    pub fn with_arity(
        self,
        arity: usize,
        wants_options: bool,
        handler: impl Fn(&Value, &mut dyn Session, &str, &Options) -> HandlerResult
        + Send
        + Sync
        + 'static,
    ) -> Result<ServiceHandler, RegistrationError> {
        match Signature::from_arity(arity, &self.name) {
            Ok(signature) => Ok(self.build(signature, wants_options, Box::new(handler))),
            Err(error) => {
                error!(target: HANDLER_TARGET, %error, "refusing listener registration");
                Err(error)
            }
        }
    }
}
