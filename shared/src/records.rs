//! Canonical shapes of every record exchanged over the channel
//!
//! This is a pure data-contract layer: each type declares its fields and
//! the constraints a conforming payload must satisfy. Behavior lives in
//! the registries and stores that consume these records.

use crate::error::SchemaViolation;
use crate::schema::{
    require_length, require_non_empty, require_positive, require_team_number, Validate,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bounds on the denormalized device name copied into a session.
pub const SESSION_DEVICE_NAME_MIN: usize = 1;
pub const SESSION_DEVICE_NAME_MAX: usize = 100;

/// Inclusive score range for engineering notebook rubrics.
pub const NOTEBOOK_SCORE_MIN: f32 = 0.0;
pub const NOTEBOOK_SCORE_MAX: f32 = 5.0;

/// A physical client identified by a stable opaque id.
///
/// The record is created when a device first connects and is retained
/// after disconnect; only `is_online` flips on disconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Opaque identifier, unique per physical client
    pub device_id: String,
    /// Human-readable label, unconstrained
    pub device_name: String,
    /// Millisecond timestamp stamped at connection time
    pub connected_at: u64,
    /// True while the device holds a live channel
    pub is_online: bool,
}

impl Validate for DeviceInfo {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_non_empty("device_id", &self.device_id)?;
        require_positive("connected_at", self.connected_at)?;
        Ok(())
    }
}

/// A bounded judging interaction owned by exactly one device.
///
/// `device_name` is a copy of the device's display name at creation time;
/// it does not track later renames. The `device_id` link is write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    /// Millisecond timestamp, set once at creation
    pub created_at: u64,
    /// Owning device; foreign key into the presence tracker
    pub device_id: String,
    /// Denormalized display name, 1-100 characters
    pub device_name: String,
}

impl Validate for SessionInfo {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_positive("created_at", self.created_at)?;
        require_non_empty("device_id", &self.device_id)?;
        require_length(
            "device_name",
            &self.device_name,
            SESSION_DEVICE_NAME_MIN,
            SESSION_DEVICE_NAME_MAX,
        )?;
        Ok(())
    }
}

/// Scored engineering notebook review for one team by one judge.
///
/// The positional order of `rubric` is semantically meaningful
/// (position = criterion index) and is preserved end-to-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeringNotebookRubric {
    pub id: Uuid,
    pub team_number: String,
    pub judge_id: Uuid,
    /// Ordered criterion scores, each within [0, 5]
    pub rubric: Vec<f32>,
    pub notes: String,
    pub innovate_award_notes: String,
}

impl Validate for EngineeringNotebookRubric {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_team_number("team_number", &self.team_number)?;
        for (index, score) in self.rubric.iter().enumerate() {
            if !(NOTEBOOK_SCORE_MIN..=NOTEBOOK_SCORE_MAX).contains(score) {
                return Err(SchemaViolation::new(
                    format!("rubric[{}]", index),
                    format!(
                        "a score in [{}, {}]",
                        NOTEBOOK_SCORE_MIN, NOTEBOOK_SCORE_MAX
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Scored team interview for one team by one judge.
///
/// Interview scores carry no declared bound; the asymmetry with the
/// notebook rubric is intentional and preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInterviewRubric {
    pub id: Uuid,
    pub team_number: String,
    pub judge_id: Uuid,
    /// Ordered criterion scores, unbounded
    pub rubric: Vec<f32>,
}

impl Validate for TeamInterviewRubric {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_team_number("team_number", &self.team_number)?;
        Ok(())
    }
}

/// Free-form interview notes for one team by one judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInterviewNote {
    pub id: Uuid,
    pub team_number: String,
    pub judge_id: Uuid,
    /// Ordered free-form note rows
    pub rows: Vec<String>,
}

impl Validate for TeamInterviewNote {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_team_number("team_number", &self.team_number)?;
        Ok(())
    }
}

/// Wire representation of a rubric submission.
///
/// Rubric records are values: updates are full-record replacements keyed
/// by `id`, never in-place mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RubricRecord {
    EngineeringNotebook(EngineeringNotebookRubric),
    TeamInterview(TeamInterviewRubric),
    TeamInterviewNote(TeamInterviewNote),
}

impl RubricRecord {
    pub fn id(&self) -> Uuid {
        match self {
            RubricRecord::EngineeringNotebook(rubric) => rubric.id,
            RubricRecord::TeamInterview(rubric) => rubric.id,
            RubricRecord::TeamInterviewNote(note) => note.id,
        }
    }

    pub fn team_number(&self) -> &str {
        match self {
            RubricRecord::EngineeringNotebook(rubric) => &rubric.team_number,
            RubricRecord::TeamInterview(rubric) => &rubric.team_number,
            RubricRecord::TeamInterviewNote(note) => &note.team_number,
        }
    }

    pub fn judge_id(&self) -> Uuid {
        match self {
            RubricRecord::EngineeringNotebook(rubric) => rubric.judge_id,
            RubricRecord::TeamInterview(rubric) => rubric.judge_id,
            RubricRecord::TeamInterviewNote(note) => note.judge_id,
        }
    }
}

impl Validate for RubricRecord {
    fn validate(&self) -> Result<(), SchemaViolation> {
        match self {
            RubricRecord::EngineeringNotebook(rubric) => rubric.validate(),
            RubricRecord::TeamInterview(rubric) => rubric.validate(),
            RubricRecord::TeamInterviewNote(note) => note.validate(),
        }
    }
}

/// Device registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDevice {
    pub device_id: String,
    pub device_name: String,
}

impl Validate for RegisterDevice {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_non_empty("device_id", &self.device_id)?;
        Ok(())
    }
}

/// Session creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSession {
    pub device_id: String,
    pub device_name: String,
}

impl Validate for CreateSession {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_non_empty("device_id", &self.device_id)?;
        require_length(
            "device_name",
            &self.device_name,
            SESSION_DEVICE_NAME_MIN,
            SESSION_DEVICE_NAME_MAX,
        )?;
        Ok(())
    }
}

/// Liveness refresh from a connected device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub device_id: String,
}

impl Validate for Heartbeat {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_non_empty("device_id", &self.device_id)?;
        Ok(())
    }
}

/// Orderly disconnect notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disconnect {
    pub device_id: String,
}

impl Validate for Disconnect {
    fn validate(&self) -> Result<(), SchemaViolation> {
        require_non_empty("device_id", &self.device_id)?;
        Ok(())
    }
}

/// Server acknowledgment of a rubric submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricAccepted {
    pub id: Uuid,
    /// True when an existing record with the same id was replaced
    pub replaced: bool,
}

impl Validate for RubricAccepted {
    fn validate(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

/// Reported reason for a call the receiver refused to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRejected {
    pub procedure: String,
    pub reason: String,
}

impl Validate for CallRejected {
    fn validate(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}
