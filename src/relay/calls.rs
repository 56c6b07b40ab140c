//! Live call session table
//!
//! The table holds only sessions that are Ringing or Accepted; terminal
//! outcomes (rejected, hung up, missed) are notifications, not stored
//! states. Every mutation is a single check-and-update under one lock, so
//! racing accept/reject/hangup/timeout operations resolve to exactly one
//! winner and the losers observe a no-op.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use crate::core::types::{CallId, DeviceId};

/// Status of a live call session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    /// Callee has been notified and the ring timer is running
    Ringing,
    /// Callee accepted; the parties are negotiating their own transport
    Accepted,
}

/// One live call between a caller and a callee
pub struct CallSession {
    /// Device that initiated the call
    pub caller: DeviceId,
    /// Device being called
    pub callee: DeviceId,
    /// Current status
    pub status: CallStatus,
    /// When the session was created
    pub started_at: Instant,
    /// Ring timer, present only while the call is ringing
    timer: Option<AbortHandle>,
}

/// Table of live call sessions
#[derive(Default)]
pub struct CallTable {
    sessions: Mutex<HashMap<CallId, CallSession>>,
}

impl CallTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a fresh ringing session
    pub fn insert_ringing(&self, call_id: &str, caller: &str, callee: &str) {
        let mut sessions = self.sessions.lock();
        sessions.insert(
            call_id.to_string(),
            CallSession {
                caller: caller.to_string(),
                callee: callee.to_string(),
                status: CallStatus::Ringing,
                started_at: Instant::now(),
                timer: None,
            },
        );
    }

    /// Attach the ring timer to a session, replacing any previous one
    ///
    /// Returns false when the session is already gone or no longer ringing;
    /// the caller must then abort the timer task itself, because the table
    /// will never fire or cancel it.
    pub fn arm_timer(&self, call_id: &str, handle: AbortHandle) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(call_id) {
            Some(session) if session.status == CallStatus::Ringing => {
                if let Some(old) = session.timer.replace(handle) {
                    old.abort();
                }
                true
            }
            _ => false,
        }
    }

    /// Transition Ringing -> Accepted, cancelling the ring timer
    ///
    /// No-op (None) when the call id is unknown or the session already left
    /// Ringing. Returns the parties on success.
    pub fn accept(&self, call_id: &str) -> Option<(DeviceId, DeviceId)> {
        let mut sessions = self.sessions.lock();
        let session = sessions.get_mut(call_id)?;
        if session.status != CallStatus::Ringing {
            return None;
        }
        session.status = CallStatus::Accepted;
        if let Some(timer) = session.timer.take() {
            timer.abort();
        }
        Some((session.caller.clone(), session.callee.clone()))
    }

    /// Remove a session regardless of its status, cancelling any timer
    ///
    /// Reject and hangup are permissive: they act on Ringing and Accepted
    /// sessions alike, and an unknown id is a silent no-op.
    pub fn remove(&self, call_id: &str) -> Option<(DeviceId, DeviceId)> {
        let mut sessions = self.sessions.lock();
        let session = sessions.remove(call_id)?;
        if let Some(timer) = session.timer {
            timer.abort();
        }
        Some((session.caller, session.callee))
    }

    /// Remove a session only if it is still ringing
    ///
    /// This is the ring-timer fire path: cancellation is best-effort, so a
    /// stale timer may fire after the call resolved, and the still-Ringing
    /// check here is what turns that into a guaranteed no-op.
    pub fn expire(&self, call_id: &str) -> Option<(DeviceId, DeviceId)> {
        let mut sessions = self.sessions.lock();
        let still_ringing = matches!(
            sessions.get(call_id),
            Some(session) if session.status == CallStatus::Ringing
        );
        if !still_ringing {
            return None;
        }
        let session = sessions.remove(call_id)?;
        Some((session.caller, session.callee))
    }

    /// Caller and callee of a live session
    pub fn roles(&self, call_id: &str) -> Option<(DeviceId, DeviceId)> {
        let sessions = self.sessions.lock();
        sessions
            .get(call_id)
            .map(|s| (s.caller.clone(), s.callee.clone()))
    }

    /// Status of a live session
    pub fn status_of(&self, call_id: &str) -> Option<CallStatus> {
        let sessions = self.sessions.lock();
        sessions.get(call_id).map(|s| s.status)
    }

    /// Whether a session is in the live table
    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.lock().contains_key(call_id)
    }

    /// Number of live sessions
    pub fn live_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn dummy_timer() -> AbortHandle {
        tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        })
        .abort_handle()
    }

    #[test]
    fn test_accept_requires_ringing() {
        let table = CallTable::new();
        table.insert_ringing("c1", "phone_0001", "robot_0001");

        let parties = table.accept("c1").unwrap();
        assert_eq!(parties.0, "phone_0001");
        assert_eq!(parties.1, "robot_0001");
        assert_eq!(table.status_of("c1"), Some(CallStatus::Accepted));

        // Second accept observes Accepted and becomes a no-op
        assert!(table.accept("c1").is_none());
        // Unknown id is a no-op too
        assert!(table.accept("nope").is_none());
    }

    #[test]
    fn test_remove_is_unconditional() {
        let table = CallTable::new();
        table.insert_ringing("c1", "phone_0001", "robot_0001");
        table.accept("c1").unwrap();

        // Hangup/reject act on an Accepted session as well
        assert!(table.remove("c1").is_some());
        assert!(!table.contains("c1"));
        assert!(table.remove("c1").is_none());
    }

    #[test]
    fn test_expire_only_fires_while_ringing() {
        let table = CallTable::new();
        table.insert_ringing("c1", "phone_0001", "robot_0001");
        table.accept("c1").unwrap();

        // A stale timer firing after accept must be a no-op
        assert!(table.expire("c1").is_none());
        assert!(table.contains("c1"));

        table.insert_ringing("c2", "phone_0001", "robot_0001");
        assert!(table.expire("c2").is_some());
        assert!(!table.contains("c2"));
    }

    #[tokio::test]
    async fn test_arm_timer_rejects_resolved_sessions() {
        let table = CallTable::new();
        table.insert_ringing("c1", "phone_0001", "robot_0001");
        assert!(table.arm_timer("c1", dummy_timer().await));

        table.remove("c1");
        assert!(!table.arm_timer("c1", dummy_timer().await));
        assert!(!table.arm_timer("unknown", dummy_timer().await));
    }

    #[test]
    fn test_roles_and_counts() {
        let table = CallTable::new();
        assert_eq!(table.live_count(), 0);
        table.insert_ringing("c1", "phone_0001", "robot_0001");
        assert_eq!(table.live_count(), 1);
        assert_eq!(
            table.roles("c1"),
            Some(("phone_0001".to_string(), "robot_0001".to_string()))
        );
        assert_eq!(table.roles("c2"), None);
    }
}
