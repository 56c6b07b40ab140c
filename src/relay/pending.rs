//! Per-device buffers for events that could not be delivered
//!
//! Every outbound event addressed to a device goes through [`PendingQueues::route`],
//! which either writes to the live connection or appends to the device's
//! buffer. The buffer is drained, in enqueue order, when the device next
//! registers. Routing and flushing for one device serialize on the same
//! queue entry lock, which is what keeps delivery FIFO across the
//! register-then-flush window.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::core::types::DeviceId;
use crate::relay::presence::ConnectionHandle;
use crate::relay::protocol::ServerEvent;

/// How an event left the routing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the live connection
    Sent,
    /// Appended to the target's pending buffer
    Queued,
}

/// Pending event buffers keyed by device id
#[derive(Default)]
pub struct PendingQueues {
    queues: DashMap<DeviceId, VecDeque<ServerEvent>>,
}

impl PendingQueues {
    /// Create an empty queue table
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }

    /// Route an event to a device: direct send when possible, buffer otherwise
    ///
    /// The direct path is taken only when the device is online *and* its
    /// buffer is empty; a non-empty buffer means a flush has not run yet,
    /// and jumping ahead of it would reorder delivery. A send failure
    /// (writer task gone) falls back to the buffer rather than dropping.
    pub fn route(
        &self,
        device_id: &str,
        online: Option<ConnectionHandle>,
        event: ServerEvent,
    ) -> Delivery {
        let mut queue = self.queues.entry(device_id.to_string()).or_default();
        let delivery = match online {
            Some(handle) if queue.is_empty() => match handle.send(event) {
                Ok(()) => Delivery::Sent,
                Err(event) => {
                    queue.push_back(event);
                    Delivery::Queued
                }
            },
            _ => {
                queue.push_back(event);
                Delivery::Queued
            }
        };
        drop(queue);
        self.queues.remove_if(device_id, |_, q| q.is_empty());
        delivery
    }

    /// Drain a device's buffer into its fresh connection, preserving order
    ///
    /// Called by the registry path immediately after a successful
    /// registration. If the connection dies mid-flush the remaining events
    /// stay buffered, still in order, for the next registration. Returns
    /// the number of events flushed.
    pub fn flush_into(&self, device_id: &str, handle: &ConnectionHandle) -> usize {
        let mut flushed = 0;
        if let Some(mut queue) = self.queues.get_mut(device_id) {
            while let Some(event) = queue.pop_front() {
                match handle.send(event) {
                    Ok(()) => flushed += 1,
                    Err(event) => {
                        queue.push_front(event);
                        break;
                    }
                }
            }
        }
        self.queues.remove_if(device_id, |_, q| q.is_empty());
        flushed
    }

    /// Number of buffered events for one device
    pub fn pending_count(&self, device_id: &str) -> usize {
        self.queues.get(device_id).map(|q| q.len()).unwrap_or(0)
    }

    /// Total buffered events across all devices
    pub fn total_pending(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ConnectionId;
    use tokio::sync::mpsc;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(ConnectionId::new(), tx), rx)
    }

    fn stop_ringing(call_id: &str) -> ServerEvent {
        ServerEvent::StopRinging {
            call_id: call_id.to_string(),
        }
    }

    #[test]
    fn test_offline_events_buffer_in_fifo_order() {
        let queues = PendingQueues::new();
        for id in ["e1", "e2", "e3"] {
            assert_eq!(
                queues.route("robot_0001", None, stop_ringing(id)),
                Delivery::Queued
            );
        }
        assert_eq!(queues.pending_count("robot_0001"), 3);

        let (h, mut rx) = handle();
        assert_eq!(queues.flush_into("robot_0001", &h), 3);
        for expected in ["e1", "e2", "e3"] {
            match rx.try_recv().unwrap() {
                ServerEvent::StopRinging { call_id } => assert_eq!(call_id, expected),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(queues.pending_count("robot_0001"), 0);
    }

    #[test]
    fn test_online_empty_queue_sends_directly() {
        let queues = PendingQueues::new();
        let (h, mut rx) = handle();
        assert_eq!(
            queues.route("robot_0001", Some(h), stop_ringing("e1")),
            Delivery::Sent
        );
        assert!(rx.try_recv().is_ok());
        assert_eq!(queues.pending_count("robot_0001"), 0);
    }

    #[test]
    fn test_online_with_backlog_appends_behind_it() {
        let queues = PendingQueues::new();
        queues.route("robot_0001", None, stop_ringing("e1"));

        // Device came online but its backlog has not been flushed yet; the
        // new event must not overtake e1.
        let (h, mut rx) = handle();
        assert_eq!(
            queues.route("robot_0001", Some(h.clone()), stop_ringing("e2")),
            Delivery::Queued
        );

        queues.flush_into("robot_0001", &h);
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        match (first, second) {
            (
                ServerEvent::StopRinging { call_id: a },
                ServerEvent::StopRinging { call_id: b },
            ) => {
                assert_eq!(a, "e1");
                assert_eq!(b, "e2");
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn test_dead_connection_falls_back_to_queue() {
        let queues = PendingQueues::new();
        let (h, rx) = handle();
        drop(rx);
        assert_eq!(
            queues.route("robot_0001", Some(h), stop_ringing("e1")),
            Delivery::Queued
        );
        assert_eq!(queues.pending_count("robot_0001"), 1);
    }

    #[test]
    fn test_flush_to_dead_connection_keeps_events_ordered() {
        let queues = PendingQueues::new();
        queues.route("robot_0001", None, stop_ringing("e1"));
        queues.route("robot_0001", None, stop_ringing("e2"));

        let (h, rx) = handle();
        drop(rx);
        assert_eq!(queues.flush_into("robot_0001", &h), 0);
        assert_eq!(queues.pending_count("robot_0001"), 2);

        let (h2, mut rx2) = handle();
        assert_eq!(queues.flush_into("robot_0001", &h2), 2);
        match rx2.try_recv().unwrap() {
            ServerEvent::StopRinging { call_id } => assert_eq!(call_id, "e1"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_queues_are_isolated_per_device() {
        let queues = PendingQueues::new();
        queues.route("robot_0001", None, stop_ringing("e1"));
        queues.route("robot_0002", None, stop_ringing("e2"));
        assert_eq!(queues.pending_count("robot_0001"), 1);
        assert_eq!(queues.pending_count("robot_0002"), 1);
        assert_eq!(queues.total_pending(), 2);
    }
}
