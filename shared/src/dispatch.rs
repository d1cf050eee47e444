//! Bidirectional procedure-call dispatch
//!
//! Either peer sends named calls framed as [`Call`] and routes received
//! calls through a [`Dispatcher`]. Each direction owns its own dispatcher:
//! the server registers handlers for client-initiated calls, the client
//! registers handlers for server-pushed calls.
//!
//! Every handler is wrapped at registration time in a decode-validate
//! decorator, so a handler body only ever sees a [`Valid`] payload and is
//! invoked at most once per received call.

use crate::error::{ProtocolError, SchemaViolation};
use crate::schema::{Valid, Validate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Procedure names used on the wire.
pub mod procedures {
    // Client-initiated
    pub const REGISTER_DEVICE: &str = "register_device";
    pub const CREATE_SESSION: &str = "create_session";
    pub const SUBMIT_RUBRIC: &str = "submit_rubric";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const DISCONNECT: &str = "disconnect";

    // Server-initiated
    pub const DEVICE_REGISTERED: &str = "device_registered";
    pub const SESSION_CREATED: &str = "session_created";
    pub const RUBRIC_ACCEPTED: &str = "rubric_accepted";
    pub const ON_UPDATE_AGE: &str = "on_update_age";
    pub const CALL_REJECTED: &str = "call_rejected";
}

/// One named procedure call with its encoded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub procedure: String,
    pub payload: Vec<u8>,
}

impl Call {
    /// Frames a typed payload under the given procedure name.
    pub fn new<T: Serialize>(procedure: &str, payload: &T) -> Result<Self, bincode::Error> {
        Ok(Self {
            procedure: procedure.to_string(),
            payload: bincode::serialize(payload)?,
        })
    }
}

type Handler<Ctx> = Box<dyn FnMut(&mut Ctx, &[u8]) -> Result<(), ProtocolError>>;

/// Routes received calls to registered handlers for one direction of the
/// channel.
///
/// `Ctx` carries whatever state the handlers mutate: the server's
/// registries for client-initiated calls, the client's reactive store for
/// server-pushed calls.
pub struct Dispatcher<Ctx> {
    handlers: HashMap<&'static str, Handler<Ctx>>,
}

impl<Ctx> Dispatcher<Ctx> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for a procedure with a declared payload schema.
    ///
    /// The handler is wrapped so the raw payload is decoded and validated
    /// before the body runs; a malformed or out-of-range payload is
    /// rejected as [`SchemaViolation`] without invoking the handler.
    pub fn register<T, F>(&mut self, procedure: &'static str, mut handler: F)
    where
        T: DeserializeOwned + Validate,
        F: FnMut(&mut Ctx, Valid<T>) -> Result<(), ProtocolError> + 'static,
    {
        let wrapped: Handler<Ctx> = Box::new(move |ctx, raw| {
            let payload: T = bincode::deserialize(raw).map_err(|_| {
                SchemaViolation::new("payload", format!("a decodable `{}` payload", procedure))
            })?;
            let payload = Valid::new(payload)?;
            handler(ctx, payload)
        });
        self.handlers.insert(procedure, wrapped);
    }

    /// Dispatches a received call to its handler.
    ///
    /// An unknown procedure name fails with [`ProtocolError::UnknownProcedure`]
    /// and must not tear down the channel; handler errors propagate typed to
    /// the caller, which reports them to the remote peer.
    pub fn dispatch(&mut self, ctx: &mut Ctx, call: &Call) -> Result<(), ProtocolError> {
        let handler = self
            .handlers
            .get_mut(call.procedure.as_str())
            .ok_or_else(|| ProtocolError::UnknownProcedure(call.procedure.clone()))?;
        handler(ctx, &call.payload)
    }

    pub fn knows(&self, procedure: &str) -> bool {
        self.handlers.contains_key(procedure)
    }
}

impl<Ctx> Default for Dispatcher<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}
