//! Application State Management
//!
//! This module defines the central AppState shared by all HTTP and
//! WebSocket handlers. It is constructed once at process start and torn
//! down at shutdown; none of it survives a restart.

use std::sync::Arc;
use std::time::Instant;

use crate::core::config::Config;
use crate::relay::SignalHub;

/// Central application state holding the relay and its configuration
#[derive(Clone)]
pub struct AppState {
    /// The signaling relay core
    pub hub: Arc<SignalHub>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Process start time, reported by the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Self {
        let hub = SignalHub::new(&config.signaling);
        Self {
            hub,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
