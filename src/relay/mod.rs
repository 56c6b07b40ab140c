//! Presence and call-signaling relay core
//!
//! This module contains the relay's shared state and the operations every
//! transport surface drives:
//! - [`presence`]: device id -> live connection registry
//! - [`pending`]: per-device buffers for offline delivery
//! - [`calls`]: live call session table with its ring timers
//! - [`protocol`]: JSON wire events in both directions
//! - [`hub`]: the coordinating component tying the above together

pub mod protocol;
pub mod presence;
pub mod pending;
pub mod calls;
pub mod hub;

// Re-export commonly used items
pub use hub::SignalHub;
pub use presence::ConnectionHandle;
pub use protocol::{ClientEvent, ServerEvent};
