//! Authoritative session registry
//!
//! Maps session identity to the owning device and creation time. Two
//! invariants are load-bearing for the rest of the system and are enforced
//! here rather than trusted from callers:
//! - a session id is never reused for the registry's entire lifetime,
//!   even after a session is logically closed
//! - `created_at` never decreases across the registry

use log::info;
use shared::{now_millis, DeviceInfo, ProtocolError, SessionInfo, Validate};
use std::collections::HashMap;
use uuid::Uuid;

/// Registry of every session issued by this server process
///
/// Sessions are never removed, which is what makes the id-uniqueness
/// invariant hold by construction. The owning-device link is write-once
/// because no mutator for it exists.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, SessionInfo>,
    /// High-water mark for creation stamps
    last_created_at: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            last_created_at: 0,
        }
    }

    /// Creates a session owned by the given device.
    ///
    /// Fails with [`ProtocolError::DeviceNotFound`] unless the device is
    /// currently online. The resulting record is validated before insertion,
    /// so an empty or overlong display name is rejected as a schema
    /// violation and nothing is stored.
    pub fn create_session(
        &mut self,
        device: &DeviceInfo,
        device_name: &str,
    ) -> Result<SessionInfo, ProtocolError> {
        if !device.is_online {
            return Err(ProtocolError::DeviceNotFound(device.device_id.clone()));
        }

        // Clamp against the high-water mark so creation stamps are
        // monotonic even if the wall clock steps backwards
        let created_at = now_millis().max(1).max(self.last_created_at);

        let session = SessionInfo {
            session_id: self.fresh_session_id(),
            created_at,
            device_id: device.device_id.clone(),
            device_name: device_name.to_string(),
        };
        session.validate()?;

        self.last_created_at = created_at;
        info!(
            "Session {} created for device {}",
            session.session_id, session.device_id
        );
        self.sessions.insert(session.session_id, session.clone());
        Ok(session)
    }

    /// Looks up a session by id.
    pub fn get_session(&self, session_id: &Uuid) -> Result<&SessionInfo, ProtocolError> {
        self.sessions
            .get(session_id)
            .ok_or(ProtocolError::SessionNotFound(*session_id))
    }

    /// All sessions owned by a device, ordered by `created_at` ascending.
    ///
    /// Ties on `created_at` are broken by session id so the order is
    /// deterministic across calls.
    pub fn sessions_for_device(&self, device_id: &str) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .values()
            .filter(|session| session.device_id == device_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn fresh_session_id(&self) -> Uuid {
        // v4 collisions are astronomically unlikely; the loop makes the
        // no-reuse invariant unconditional anyway
        loop {
            let id = Uuid::new_v4();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}
