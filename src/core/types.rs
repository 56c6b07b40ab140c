//! Identifier types shared across the Signal Hub relay
//!
//! Device and call identifiers travel on the wire and are chosen by (or
//! echoed back to) clients, so they stay plain strings. Connection ids are
//! internal and never leave the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Device identifier, chosen by the client at registration
pub type DeviceId = String;

/// Call identifier, generated server-side when a call is created
pub type CallId = String;

/// Process-unique identifier for one physical connection
///
/// A device that reconnects gets a fresh `ConnectionId`; the registry uses
/// it to tell a superseded connection apart from the live one.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in log lines and anonymous device ids
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_form_is_eight_chars() {
        let id = ConnectionId::new();
        assert_eq!(id.short().len(), 8);
    }
}
