//! Signal Hub - Presence and Call-Signaling Relay
//!
//! Signal Hub is a real-time signaling relay that lets mobile controller
//! devices and robot devices discover each other, place calls, negotiate
//! their WebRTC handshake, and exchange control commands over a persistent
//! bidirectional channel, with queued delivery for briefly offline devices.
#![warn(missing_docs)]

// Configure global allocator for maximum performance
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

// Core foundational modules
pub mod core;

// Main functional modules
pub mod relay;
pub mod api;
pub mod system;

// Re-export commonly used items for convenience
pub use crate::core::{Error, Result, Config};
pub use crate::relay::SignalHub;

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the relay system with tracing and metrics
pub fn init() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Initializing {} v{}", NAME, VERSION);

    // Initialize metrics registry
    system::metrics::init_registry();

    Ok(())
}
