pub mod dispatch;
pub mod error;
pub mod records;
pub mod schema;

pub use dispatch::{procedures, Call, Dispatcher};
pub use error::{ProtocolError, SchemaViolation};
pub use records::{
    CallRejected, CreateSession, DeviceInfo, Disconnect, EngineeringNotebookRubric, Heartbeat,
    RegisterDevice, RubricAccepted, RubricRecord, SessionInfo, TeamInterviewNote,
    TeamInterviewRubric,
};
pub use schema::{Valid, Validate};

use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
