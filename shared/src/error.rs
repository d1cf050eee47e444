//! Protocol error taxonomy shared by both peers
//!
//! Nothing here is fatal to the process. Every failure is returned as a
//! typed value to the caller of the violated operation, and a rejected
//! call is answered over the channel instead of tearing it down.

use thiserror::Error;
use uuid::Uuid;

/// A payload that does not conform to its declared schema.
///
/// Carries the path of the offending field (e.g. `rubric[3]`) and the
/// constraint that was expected to hold there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema violation at `{field}`: expected {constraint}")]
pub struct SchemaViolation {
    pub field: String,
    pub constraint: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}

/// Every way a protocol operation can fail.
///
/// All variants are recoverable: schema violations drop the offending
/// message, lookup failures surface to the caller, unknown procedures and
/// handler failures are reported while the channel stays open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("device `{0}` is not registered or not online")]
    DeviceNotFound(String),

    #[error("session `{0}` not found")]
    SessionNotFound(Uuid),

    #[error("unknown procedure `{0}`")]
    UnknownProcedure(String),

    #[error("handler failed: {0}")]
    HandlerFailure(String),
}
