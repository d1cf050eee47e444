//! Device presence tracking for the judging server
//!
//! This module handles the server-side view of which judge devices are
//! connected, including:
//! - Idempotent device registration across reconnects
//! - Online/offline transitions that never destroy the underlying record
//! - Liveness tracking and automatic offline marking on timeout
//! - Address bookkeeping for routing server-pushed calls
//!
//! A device record persists for the tracker's process lifetime; retention
//! of presence history is an external policy and is not implemented here.

use log::info;
use shared::{now_millis, DeviceInfo};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A known device and its connection bookkeeping
///
/// Wraps the schema-level [`DeviceInfo`] record with transport state the
/// protocol core needs but never puts on the wire.
#[derive(Debug)]
pub struct ConnectedDevice {
    /// Validated presence record exchanged over the protocol
    pub info: DeviceInfo,
    /// Network address for routing pushes; absent for in-process peers
    pub addr: Option<SocketAddr>,
    /// Last time we received any call from this device
    pub last_seen: Instant,
}

impl ConnectedDevice {
    fn new(info: DeviceInfo, addr: Option<SocketAddr>) -> Self {
        Self {
            info,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// True if no calls have arrived from this device within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks which devices are currently online, independent of sessions
///
/// State machine per device: `Unknown -> Online -> Offline -> Online -> ...`
/// with no terminal state. Every mutating operation runs under the main
/// loop's single-threaded ownership, which serializes them.
#[derive(Default)]
pub struct DevicePresence {
    devices: HashMap<String, ConnectedDevice>,
}

impl DevicePresence {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    /// Registers a device, or refreshes it if the id is already known.
    ///
    /// Idempotent: a repeated registration overwrites the display name,
    /// refreshes `connected_at`, updates the address, and flips the device
    /// online. Returns a snapshot of the resulting record.
    pub fn register_device(
        &mut self,
        device_id: &str,
        device_name: &str,
        addr: Option<SocketAddr>,
    ) -> DeviceInfo {
        // now_millis is epoch-based and nonzero in practice; the clamp
        // keeps the strictly-positive invariant unconditional
        let connected_at = now_millis().max(1);

        match self.devices.get_mut(device_id) {
            Some(entry) => {
                entry.info.device_name = device_name.to_string();
                entry.info.connected_at = connected_at;
                entry.info.is_online = true;
                if addr.is_some() {
                    entry.addr = addr;
                }
                entry.last_seen = Instant::now();
                info!("Device {} reconnected as \"{}\"", device_id, device_name);
                entry.info.clone()
            }
            None => {
                let info = DeviceInfo {
                    device_id: device_id.to_string(),
                    device_name: device_name.to_string(),
                    connected_at,
                    is_online: true,
                };
                info!("Device {} connected as \"{}\"", device_id, device_name);
                self.devices
                    .insert(device_id.to_string(), ConnectedDevice::new(info.clone(), addr));
                info
            }
        }
    }

    /// Marks a device offline, keeping its record.
    ///
    /// Unknown ids are a no-op: disconnect races must not crash the tracker.
    pub fn mark_offline(&mut self, device_id: &str) {
        if let Some(entry) = self.devices.get_mut(device_id) {
            if entry.info.is_online {
                info!("Device {} went offline", device_id);
            }
            entry.info.is_online = false;
        }
    }

    pub fn is_online(&self, device_id: &str) -> bool {
        self.devices
            .get(device_id)
            .map(|entry| entry.info.is_online)
            .unwrap_or(false)
    }

    pub fn get(&self, device_id: &str) -> Option<&DeviceInfo> {
        self.devices.get(device_id).map(|entry| &entry.info)
    }

    /// Refreshes a device's liveness clock without changing its record.
    pub fn touch(&mut self, device_id: &str) {
        if let Some(entry) = self.devices.get_mut(device_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Finds the device id registered from the given address.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<String> {
        self.devices
            .iter()
            .find(|(_, entry)| entry.addr == Some(addr))
            .map(|(id, _)| id.clone())
    }

    /// Marks silent online devices offline and returns their ids.
    ///
    /// Unlike a connection-slot model, timed-out records are kept; only the
    /// online flag changes, matching the disconnect semantics elsewhere.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<String> {
        let timed_out: Vec<String> = self
            .devices
            .iter()
            .filter(|(_, entry)| entry.info.is_online && entry.is_timed_out(timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for device_id in &timed_out {
            self.mark_offline(device_id);
        }

        timed_out
    }

    /// Addresses of all online devices, for broadcasting pushes.
    pub fn online_addrs(&self) -> Vec<(String, SocketAddr)> {
        self.devices
            .iter()
            .filter(|(_, entry)| entry.info.is_online)
            .filter_map(|(id, entry)| entry.addr.map(|addr| (id.clone(), addr)))
            .collect()
    }

    /// Number of known device records, online or not.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.devices
            .values()
            .filter(|entry| entry.info.is_online)
            .count()
    }
}
