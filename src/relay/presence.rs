//! Presence registry mapping device ids to live connections
//!
//! A device "exists" only while it is registered here (or while its pending
//! queue holds events); there is no persistent device table. Re-registering
//! replaces the stored connection handle wholesale, and a disconnect only
//! removes the mapping when the disconnecting connection is still the
//! current one.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::types::{ConnectionId, DeviceId};
use crate::relay::protocol::{OnlineDevice, ServerEvent};

/// Sending half of one device connection
///
/// Events pushed here are serialized and written to the socket by the
/// connection's writer task. Sending never blocks; a send to a connection
/// whose writer has exited reports failure so the caller can queue instead.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    /// Create a handle from a connection id and its outbound channel
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { id, tx }
    }

    /// Connection id of this handle
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Push an event to the connection's writer task
    ///
    /// Returns the event back when the connection is gone, so the caller
    /// can fall back to the pending queue without cloning.
    pub fn send(&self, event: ServerEvent) -> Result<(), ServerEvent> {
        self.tx.send(event).map_err(|e| e.0)
    }
}

/// One registered device
pub struct DeviceEntry {
    /// Live connection handle; replaced wholesale on re-registration
    pub handle: ConnectionHandle,
    /// Declared device kind, opaque metadata
    pub device_type: String,
    /// Human-readable name, opaque metadata
    pub display_name: String,
}

/// Registry of currently online devices
#[derive(Default)]
pub struct PresenceRegistry {
    devices: DashMap<DeviceId, DeviceEntry>,
}

impl PresenceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Store or overwrite the mapping for a device
    ///
    /// Any previous connection for this id is superseded; the old physical
    /// socket is closed by the transport layer on its own.
    pub fn register(&self, device_id: DeviceId, entry: DeviceEntry) {
        self.devices.insert(device_id, entry);
    }

    /// Remove the device bound to the disconnecting connection
    ///
    /// A connection that was already superseded by a newer registration
    /// must not remove the newer mapping, so removal re-checks the stored
    /// connection id under the entry lock.
    pub fn unregister(&self, conn: ConnectionId) -> Option<DeviceId> {
        let device_id = self
            .devices
            .iter()
            .find(|entry| entry.value().handle.id() == conn)
            .map(|entry| entry.key().clone())?;

        self.devices
            .remove_if(&device_id, |_, entry| entry.handle.id() == conn)
            .map(|(id, _)| id)
    }

    /// Whether a device currently has a live connection
    pub fn is_online(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Connection handle of an online device
    pub fn handle_of(&self, device_id: &str) -> Option<ConnectionHandle> {
        self.devices.get(device_id).map(|entry| entry.handle.clone())
    }

    /// Sorted snapshot of all online device ids
    pub fn snapshot(&self) -> Vec<OnlineDevice> {
        let mut devices: Vec<OnlineDevice> = self
            .devices
            .iter()
            .map(|entry| OnlineDevice {
                device_id: entry.key().clone(),
            })
            .collect();
        devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        devices
    }

    /// Send an event to every online device
    pub fn broadcast(&self, event: &ServerEvent) {
        for entry in self.devices.iter() {
            if entry.value().handle.send(event.clone()).is_err() {
                debug!(device_id = %entry.key(), "broadcast skipped dead connection");
            }
        }
    }

    /// Number of online devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device is online
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
