//! The signaling relay core
//!
//! `SignalHub` owns the three shared tables (presence, pending queues, live
//! calls) and implements every operation the channel and HTTP surfaces
//! expose: registration and presence broadcast, addressed delivery with
//! offline queueing, the call lifecycle with its ring timer, and the
//! role-checked WebRTC/command relay.
//!
//! All operations are synchronous and hold only brief per-table locks; the
//! ring timer is the one piece of deferred work, and its fire path
//! re-validates the session state instead of trusting cancellation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::SignalingConfig;
use crate::core::types::{CallId, ConnectionId};
use crate::relay::calls::CallTable;
use crate::relay::pending::{Delivery, PendingQueues};
use crate::relay::presence::{ConnectionHandle, DeviceEntry, PresenceRegistry};
use crate::relay::protocol::{RegisterPayload, RemoteControlPayload, ServerEvent};
use crate::system::metrics::Metrics;

/// Presence, delivery, and call signaling in one coordinating component
///
/// Constructed once at process start and shared behind an `Arc`; all state
/// lives in memory and is rebuilt from scratch on restart.
pub struct SignalHub {
    presence: PresenceRegistry,
    pending: PendingQueues,
    calls: CallTable,
    ring_timeout: Duration,
}

impl SignalHub {
    /// Create a hub with the given signaling configuration
    pub fn new(config: &SignalingConfig) -> Arc<Self> {
        Arc::new(Self {
            presence: PresenceRegistry::new(),
            pending: PendingQueues::new(),
            calls: CallTable::new(),
            ring_timeout: config.ring_timeout(),
        })
    }

    // ── Presence ────────────────────────────────────────────

    /// Register a device on a connection and flush its buffered events
    ///
    /// A blank device id registers anonymously under an id derived from the
    /// connection. Returns the effective device id.
    pub fn register(&self, conn: ConnectionHandle, payload: RegisterPayload) -> String {
        let device_id = {
            let trimmed = payload.device_id.trim();
            if trimmed.is_empty() {
                format!("anon_{}", conn.id().short())
            } else {
                trimmed.to_string()
            }
        };
        let display_name = payload.display_name.unwrap_or_else(|| device_id.clone());

        info!(
            device_id = %device_id,
            device_type = %payload.device_type,
            conn = %conn.id(),
            "device registered"
        );

        self.presence.register(
            device_id.clone(),
            DeviceEntry {
                handle: conn.clone(),
                device_type: payload.device_type,
                display_name,
            },
        );

        // Ack goes straight to the registering connection, not through
        // addressed delivery: it must never end up in a pending queue.
        let _ = conn.send(ServerEvent::Registered {
            ok: true,
            device_id: device_id.clone(),
        });

        self.broadcast_online_list();

        let flushed = self.pending.flush_into(&device_id, &conn);
        if flushed > 0 {
            info!(device_id = %device_id, count = flushed, "flushed pending events");
            Metrics::global()
                .delivery
                .events_flushed
                .inc_by(flushed as u64);
        }

        Metrics::global().presence.registrations.inc();
        self.refresh_gauges();
        device_id
    }

    /// Handle a connection closing
    ///
    /// Removes the presence mapping only when the closing connection is
    /// still the device's current one; a superseded connection going away
    /// must not knock the device offline.
    pub fn disconnect(&self, conn: ConnectionId) {
        match self.presence.unregister(conn) {
            Some(device_id) => {
                info!(device_id = %device_id, conn = %conn, "device disconnected");
                self.broadcast_online_list();
                Metrics::global().presence.disconnects.inc();
                self.refresh_gauges();
            }
            None => {
                debug!(conn = %conn, "connection closed without active registration");
            }
        }
    }

    /// Broadcast the current presence snapshot to every online device
    pub fn broadcast_online_list(&self) {
        let event = ServerEvent::OnlineList {
            devices: self.presence.snapshot(),
        };
        self.presence.broadcast(&event);
    }

    // ── Addressed delivery ──────────────────────────────────

    /// Send an event to a device, buffering it when the device is offline
    ///
    /// This is the only write path to a device; bypassing it would break
    /// the offline-queue ordering guarantee.
    pub fn deliver(&self, target: &str, event: ServerEvent) {
        let name = event.name();
        let metrics = Metrics::global();
        match self
            .pending
            .route(target, self.presence.handle_of(target), event)
        {
            Delivery::Sent => {
                debug!(event = name, target = %target, "event delivered");
                metrics.delivery.events_delivered.inc();
            }
            Delivery::Queued => {
                debug!(event = name, target = %target, "event queued for offline target");
                metrics.delivery.events_queued.inc();
            }
        }
        metrics
            .delivery
            .queued_events
            .set(self.pending.total_pending() as i64);
    }

    // ── Call lifecycle ──────────────────────────────────────

    /// Create a ringing call session and notify the callee
    ///
    /// Returns the generated call id; the transport layer hands it back to
    /// the caller as an immediate acknowledgment.
    pub fn create_call(self: &Arc<Self>, caller: &str, callee: &str) -> CallId {
        let call_id = Uuid::new_v4().to_string();
        info!(call_id = %call_id, caller = %caller, callee = %callee, "call requested");

        self.calls.insert_ringing(&call_id, caller, callee);
        self.deliver(
            callee,
            ServerEvent::IncomingCall {
                call_id: call_id.clone(),
                from: caller.to_string(),
            },
        );
        self.start_ring_timer(&call_id);

        Metrics::global().calls.calls_created.inc();
        self.refresh_gauges();
        call_id
    }

    /// Accept a ringing call, cancel its timer, and notify both parties
    ///
    /// Unknown call ids and sessions that already left Ringing are silent
    /// no-ops; late or duplicate accepts are routine.
    pub fn accept_call(&self, call_id: &str, by: &str) {
        let Some((caller, callee)) = self.calls.accept(call_id) else {
            debug!(call_id = %call_id, by = %by, "accept ignored, call not ringing");
            return;
        };
        info!(call_id = %call_id, by = %by, "call accepted");

        for party in [&caller, &callee] {
            self.deliver(
                party,
                ServerEvent::StopRinging {
                    call_id: call_id.to_string(),
                },
            );
        }
        for party in [&caller, &callee] {
            self.deliver(
                party,
                ServerEvent::CallAccepted {
                    call_id: call_id.to_string(),
                    by: by.to_string(),
                },
            );
        }

        Metrics::global().calls.calls_accepted.inc();
    }

    /// Reject a call, discard the session, and notify both parties
    pub fn reject_call(&self, call_id: &str, by: &str) {
        let Some((caller, callee)) = self.calls.remove(call_id) else {
            debug!(call_id = %call_id, by = %by, "reject ignored, unknown call");
            return;
        };
        info!(call_id = %call_id, by = %by, "call rejected");

        for party in [&caller, &callee] {
            self.deliver(
                party,
                ServerEvent::CallRejected {
                    call_id: call_id.to_string(),
                    by: by.to_string(),
                },
            );
        }

        Metrics::global().calls.calls_rejected.inc();
        self.refresh_gauges();
    }

    /// End a call, discard the session, and notify the other party
    ///
    /// The terminal notification is echoed back to the hanging-up device as
    /// well, so both sides tear down their call UI from the same event.
    pub fn hangup(&self, call_id: &str, by: &str) {
        let Some((caller, callee)) = self.calls.remove(call_id) else {
            debug!(call_id = %call_id, by = %by, "hangup ignored, unknown call");
            return;
        };
        info!(call_id = %call_id, by = %by, "call ended");

        let other = if by == callee { caller } else { callee };
        self.deliver(
            &other,
            ServerEvent::CallEnded {
                call_id: call_id.to_string(),
                by: by.to_string(),
            },
        );
        self.deliver(
            by,
            ServerEvent::CallEnded {
                call_id: call_id.to_string(),
                by: by.to_string(),
            },
        );

        Metrics::global().calls.calls_ended.inc();
        self.refresh_gauges();
    }

    /// Arm the one-shot ring timer for a freshly created call
    fn start_ring_timer(self: &Arc<Self>, call_id: &str) {
        let hub = Arc::clone(self);
        let id = call_id.to_string();
        let timeout = self.ring_timeout;
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            hub.ring_timeout_fired(&id);
        });
        if !self.calls.arm_timer(call_id, task.abort_handle()) {
            // The session resolved before the timer could attach; nothing
            // will ever cancel this task, so kill it here.
            task.abort();
        }
    }

    /// Ring timer fire path
    ///
    /// Cancellation is best-effort, so this re-checks that the call is
    /// still ringing; a timer that lost the race to accept/reject/hangup
    /// finds the session gone or accepted and does nothing.
    fn ring_timeout_fired(&self, call_id: &str) {
        let Some((caller, callee)) = self.calls.expire(call_id) else {
            debug!(call_id = %call_id, "stale ring timer ignored");
            return;
        };
        warn!(call_id = %call_id, caller = %caller, callee = %callee, "call missed");

        self.deliver(
            &caller,
            ServerEvent::MissedCall {
                call_id: call_id.to_string(),
                peer: callee.clone(),
            },
        );
        self.deliver(
            &callee,
            ServerEvent::MissedCall {
                call_id: call_id.to_string(),
                peer: caller,
            },
        );

        Metrics::global().calls.calls_missed.inc();
        self.refresh_gauges();
    }

    // ── WebRTC / command relay ──────────────────────────────

    /// Forward an SDP offer to the callee, if it really came from the caller
    pub fn relay_offer(&self, call_id: &str, from: &str, sdp: String) {
        match self.calls.roles(call_id) {
            Some((caller, callee)) if caller == from => {
                debug!(call_id = %call_id, from = %from, to = %callee, "relaying offer");
                self.deliver(
                    &callee,
                    ServerEvent::WebrtcOffer {
                        call_id: call_id.to_string(),
                        from: from.to_string(),
                        sdp,
                    },
                );
            }
            Some(_) => {
                warn!(call_id = %call_id, from = %from, "offer from non-caller dropped");
                Metrics::global().calls.relays_dropped.inc();
            }
            None => {
                debug!(call_id = %call_id, from = %from, "offer for unknown call dropped");
                Metrics::global().calls.relays_dropped.inc();
            }
        }
    }

    /// Forward an SDP answer to the caller, if it really came from the callee
    pub fn relay_answer(&self, call_id: &str, from: &str, sdp: String) {
        match self.calls.roles(call_id) {
            Some((caller, callee)) if callee == from => {
                debug!(call_id = %call_id, from = %from, to = %caller, "relaying answer");
                self.deliver(
                    &caller,
                    ServerEvent::WebrtcAnswer {
                        call_id: call_id.to_string(),
                        from: from.to_string(),
                        sdp,
                    },
                );
            }
            Some(_) => {
                warn!(call_id = %call_id, from = %from, "answer from non-callee dropped");
                Metrics::global().calls.relays_dropped.inc();
            }
            None => {
                debug!(call_id = %call_id, from = %from, "answer for unknown call dropped");
                Metrics::global().calls.relays_dropped.inc();
            }
        }
    }

    /// Forward an ICE candidate to the opposite party of the call
    pub fn relay_ice(&self, call_id: &str, from: &str, candidate: serde_json::Value) {
        let Some((caller, callee)) = self.calls.roles(call_id) else {
            debug!(call_id = %call_id, from = %from, "candidate for unknown call dropped");
            Metrics::global().calls.relays_dropped.inc();
            return;
        };
        let to = if from == caller { callee } else { caller };
        debug!(call_id = %call_id, from = %from, to = %to, "relaying candidate");
        self.deliver(
            &to,
            ServerEvent::WebrtcIce {
                call_id: call_id.to_string(),
                from: from.to_string(),
                candidate,
            },
        );
    }

    /// Relay a control command to its target device, outside any call
    ///
    /// Addressed purely by device id; goes through addressed delivery, so
    /// it queues for offline targets like any other event.
    pub fn relay_command(&self, payload: RemoteControlPayload) {
        info!(
            from = %payload.from,
            to = %payload.to,
            ctrl_type = %payload.ctrl_type,
            value = payload.value,
            duration_ms = payload.duration_ms,
            "relaying control command"
        );
        let target = payload.to.clone();
        self.deliver(
            &target,
            ServerEvent::RemoteControl {
                from: payload.from,
                to: payload.to,
                ctrl_type: payload.ctrl_type,
                value: payload.value,
                duration_ms: payload.duration_ms,
            },
        );
    }

    // ── Introspection ───────────────────────────────────────

    /// Whether a device currently has a live connection
    pub fn is_online(&self, device_id: &str) -> bool {
        self.presence.is_online(device_id)
    }

    /// Number of online devices
    pub fn online_devices(&self) -> usize {
        self.presence.len()
    }

    /// Number of live call sessions
    pub fn live_calls(&self) -> usize {
        self.calls.live_count()
    }

    /// Total events waiting in pending queues
    pub fn queued_events(&self) -> usize {
        self.pending.total_pending()
    }

    fn refresh_gauges(&self) {
        let metrics = Metrics::global();
        metrics
            .presence
            .online_devices
            .set(self.presence.len() as i64);
        metrics.calls.live_calls.set(self.calls.live_count() as i64);
        metrics
            .delivery
            .queued_events
            .set(self.pending.total_pending() as i64);
    }
}

// ── Tests ───────────────────────────────────────────────────
