//! Metrics collection and monitoring for the Signal Hub relay
//!
//! This module provides metrics collection using Prometheus, optimized for
//! minimal overhead on the delivery hot path.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

use crate::core::error::Result;

/// Presence metrics for tracking registrations and disconnects
pub struct PresenceMetrics {
    /// Total number of device registrations
    pub registrations: IntCounter,
    /// Total number of device disconnects
    pub disconnects: IntCounter,
    /// Number of currently online devices
    pub online_devices: IntGauge,
}

/// Delivery metrics for the addressed-delivery write path
pub struct DeliveryMetrics {
    /// Total events written straight to a live connection
    pub events_delivered: IntCounter,
    /// Total events buffered for an offline target
    pub events_queued: IntCounter,
    /// Total buffered events flushed on registration
    pub events_flushed: IntCounter,
    /// Events currently waiting in pending queues
    pub queued_events: IntGauge,
}

/// Call lifecycle metrics
pub struct CallMetrics {
    /// Total call sessions created
    pub calls_created: IntCounter,
    /// Total calls accepted
    pub calls_accepted: IntCounter,
    /// Total calls rejected
    pub calls_rejected: IntCounter,
    /// Total calls hung up
    pub calls_ended: IntCounter,
    /// Total calls that rang out
    pub calls_missed: IntCounter,
    /// Total handshake relays dropped (role mismatch or unknown call)
    pub relays_dropped: IntCounter,
    /// Number of live call sessions
    pub live_calls: IntGauge,
}

/// Centralized metrics collection for all relay components
pub struct Metrics {
    /// Registration and presence metrics
    pub presence: PresenceMetrics,
    /// Addressed delivery metrics
    pub delivery: DeliveryMetrics,
    /// Call lifecycle metrics
    pub calls: CallMetrics,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> Result<Self> {
        Ok(Self {
            presence: PresenceMetrics::new()?,
            delivery: DeliveryMetrics::new()?,
            calls: CallMetrics::new()?,
        })
    }

    /// Get the global metrics instance
    pub fn global() -> &'static Metrics {
        static INSTANCE: Lazy<Metrics> =
            Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
        &INSTANCE
    }
}

impl PresenceMetrics {
    /// Create a new PresenceMetrics instance with registered Prometheus counters
    fn new() -> Result<Self> {
        Ok(Self {
            registrations: register_int_counter!(
                "sh_registrations_total",
                "Total number of device registrations"
            )?,
            disconnects: register_int_counter!(
                "sh_disconnects_total",
                "Total number of device disconnects"
            )?,
            online_devices: register_int_gauge!(
                "sh_online_devices",
                "Number of currently online devices"
            )?,
        })
    }
}

impl DeliveryMetrics {
    /// Create a new DeliveryMetrics instance with registered Prometheus counters
    fn new() -> Result<Self> {
        Ok(Self {
            events_delivered: register_int_counter!(
                "sh_events_delivered_total",
                "Total events delivered to live connections"
            )?,
            events_queued: register_int_counter!(
                "sh_events_queued_total",
                "Total events buffered for offline targets"
            )?,
            events_flushed: register_int_counter!(
                "sh_events_flushed_total",
                "Total buffered events flushed on registration"
            )?,
            queued_events: register_int_gauge!(
                "sh_queued_events",
                "Events currently waiting in pending queues"
            )?,
        })
    }
}

impl CallMetrics {
    /// Create a new CallMetrics instance with registered Prometheus counters
    fn new() -> Result<Self> {
        Ok(Self {
            calls_created: register_int_counter!(
                "sh_calls_created_total",
                "Total call sessions created"
            )?,
            calls_accepted: register_int_counter!(
                "sh_calls_accepted_total",
                "Total calls accepted"
            )?,
            calls_rejected: register_int_counter!(
                "sh_calls_rejected_total",
                "Total calls rejected"
            )?,
            calls_ended: register_int_counter!(
                "sh_calls_ended_total",
                "Total calls hung up"
            )?,
            calls_missed: register_int_counter!(
                "sh_calls_missed_total",
                "Total calls that rang out"
            )?,
            relays_dropped: register_int_counter!(
                "sh_relays_dropped_total",
                "Total handshake relays dropped"
            )?,
            live_calls: register_int_gauge!(
                "sh_live_calls",
                "Number of live call sessions"
            )?,
        })
    }
}

/// Initialize the metrics registry by creating the global metrics instance
///
/// This function should be called once during application startup to ensure
/// all metrics are properly registered with Prometheus.
pub fn init_registry() {
    // Initialize global metrics to register them
    let _ = Metrics::global();
}

/// Collect and return all metrics as a Prometheus-formatted string
///
/// This function gathers all registered metrics and formats them according
/// to the Prometheus exposition format for HTTP endpoints.
pub fn collect_metrics() -> String {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_metrics_register_once() {
        let metrics = Metrics::global();
        metrics.presence.registrations.inc();
        assert!(metrics.presence.registrations.get() >= 1);
        // A second access returns the same instance
        let again = Metrics::global();
        assert!(std::ptr::eq(metrics, again));
    }

    #[test]
    fn test_collect_metrics_exports_relay_families() {
        Metrics::global().calls.calls_created.inc();
        let exported = collect_metrics();
        assert!(exported.contains("sh_calls_created_total"));
    }
}
