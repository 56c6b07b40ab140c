//! Wire protocol for the signaling channel
//!
//! Every WebSocket frame is a JSON envelope `{"event": <name>, "data": {...}}`
//! in both directions. This module provides serde types for parsing client
//! events and emitting server events.
//!
//! Payloads are strict at the boundary: a missing required field or an
//! unknown field fails deserialization, and the caller drops the frame.
//! Unknown event names fail the same way. Nothing partially parsed ever
//! reaches the relay core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{CallId, DeviceId};

// ── Client → server events ──────────────────────────────────

/// Events a device sends to the relay
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Announce identity and bind this connection to a device id
    Register(RegisterPayload),
    /// Ask the relay to broadcast the current online list
    WhoIsOnline(WhoIsOnlinePayload),
    /// Start ringing another device
    CallRequest(CallRequestPayload),
    /// Callee accepted a ringing call
    CallAccepted(CallActionPayload),
    /// A party rejected the call
    CallRejected(CallActionPayload),
    /// A party ended the call
    Hangup(CallActionPayload),
    /// SDP offer from the caller
    WebrtcOffer(SdpPayload),
    /// SDP answer from the callee
    WebrtcAnswer(SdpPayload),
    /// Trickled ICE candidate from either party
    WebrtcIce(IcePayload),
    /// Direct device-to-device control command, outside any call
    RemoteControl(RemoteControlPayload),
}

/// Registration data: `{device_id, device_type?, display_name?}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterPayload {
    /// Device identifier; blank registers an anonymous id
    #[serde(default)]
    pub device_id: String,
    /// Declared device kind, opaque to the relay
    #[serde(default = "default_device_type")]
    pub device_type: String,
    /// Human-readable name, defaults to the device id
    #[serde(default)]
    pub display_name: Option<String>,
}

fn default_device_type() -> String {
    "unknown".to_string()
}

/// Empty payload for `who_is_online`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct WhoIsOnlinePayload {}

/// Call initiation data: `{from, to}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CallRequestPayload {
    /// Caller device id
    pub from: DeviceId,
    /// Callee device id
    pub to: DeviceId,
}

/// Accept/reject/hangup data: `{call_id, by}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct CallActionPayload {
    /// Call being acted on
    pub call_id: CallId,
    /// Device performing the action
    pub by: DeviceId,
}

/// SDP offer/answer data: `{call_id, from, sdp}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct SdpPayload {
    /// Call the description belongs to
    pub call_id: CallId,
    /// Sending device id, checked against the session's recorded role
    pub from: DeviceId,
    /// Session description, forwarded uninterpreted
    pub sdp: String,
}

/// ICE candidate data: `{call_id, from, candidate}`
///
/// The candidate is an opaque structured value (`{sdpMid, sdpMLineIndex,
/// candidate}` in practice) and passes through untouched.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct IcePayload {
    /// Call the candidate belongs to
    pub call_id: CallId,
    /// Sending device id
    pub from: DeviceId,
    /// Candidate value, forwarded uninterpreted
    pub candidate: Value,
}

/// Remote control data: `{from, to, ctrl_type, value?, duration_ms?}`
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct RemoteControlPayload {
    /// Sending device id
    pub from: DeviceId,
    /// Target device id
    pub to: DeviceId,
    /// Command kind ("move", "turn", "stop", ...), opaque to the relay
    pub ctrl_type: String,
    /// Command magnitude
    #[serde(default)]
    pub value: f64,
    /// Command duration in milliseconds
    #[serde(default)]
    pub duration_ms: i64,
}

// ── Server → client events ──────────────────────────────────

/// Events the relay sends to devices
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Registration acknowledgment, sent to the registering connection only
    Registered {
        /// Whether registration succeeded
        ok: bool,
        /// Effective device id (anonymous ids are generated server-side)
        device_id: DeviceId,
    },
    /// Presence snapshot, broadcast to every online device
    OnlineList {
        /// Online devices, sorted by id
        devices: Vec<OnlineDevice>,
    },
    /// Immediate acknowledgment of `call_request`, sent to the caller only
    CallCreated {
        /// Generated call id
        call_id: CallId,
    },
    /// A call is ringing for the receiving device
    IncomingCall {
        /// Ringing call id
        call_id: CallId,
        /// Caller device id
        from: DeviceId,
    },
    /// Stop any ringing UI for this call
    StopRinging {
        /// Call that stopped ringing
        call_id: CallId,
    },
    /// The call was accepted
    CallAccepted {
        /// Accepted call id
        call_id: CallId,
        /// Device that accepted
        by: DeviceId,
    },
    /// The call was rejected
    CallRejected {
        /// Rejected call id
        call_id: CallId,
        /// Device that rejected
        by: DeviceId,
    },
    /// The call was hung up
    CallEnded {
        /// Ended call id
        call_id: CallId,
        /// Device that hung up
        by: DeviceId,
    },
    /// The call rang out without an answer
    MissedCall {
        /// Timed-out call id
        call_id: CallId,
        /// The other party of the call
        peer: DeviceId,
    },
    /// Forwarded SDP offer
    WebrtcOffer {
        /// Call the description belongs to
        call_id: CallId,
        /// Originating device (the caller)
        from: DeviceId,
        /// Session description
        sdp: String,
    },
    /// Forwarded SDP answer
    WebrtcAnswer {
        /// Call the description belongs to
        call_id: CallId,
        /// Originating device (the callee)
        from: DeviceId,
        /// Session description
        sdp: String,
    },
    /// Forwarded ICE candidate
    WebrtcIce {
        /// Call the candidate belongs to
        call_id: CallId,
        /// Originating device
        from: DeviceId,
        /// Candidate value
        candidate: Value,
    },
    /// Forwarded control command
    RemoteControl {
        /// Sending device id
        from: DeviceId,
        /// Target device id
        to: DeviceId,
        /// Command kind
        ctrl_type: String,
        /// Command magnitude
        value: f64,
        /// Command duration in milliseconds
        duration_ms: i64,
    },
    /// Immediate acknowledgment of `remote_control`, sent to the sender only
    RemoteAck {
        /// Whether the command was relayed (or queued)
        ok: bool,
        /// Target device id
        target: DeviceId,
    },
}

/// One entry in the presence snapshot
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OnlineDevice {
    /// Online device id
    pub device_id: DeviceId,
}

impl ServerEvent {
    /// Wire name of this event, for log lines and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Registered { .. } => "registered",
            ServerEvent::OnlineList { .. } => "online_list",
            ServerEvent::CallCreated { .. } => "call_created",
            ServerEvent::IncomingCall { .. } => "incoming_call",
            ServerEvent::StopRinging { .. } => "stop_ringing",
            ServerEvent::CallAccepted { .. } => "call_accepted",
            ServerEvent::CallRejected { .. } => "call_rejected",
            ServerEvent::CallEnded { .. } => "call_ended",
            ServerEvent::MissedCall { .. } => "missed_call",
            ServerEvent::WebrtcOffer { .. } => "webrtc_offer",
            ServerEvent::WebrtcAnswer { .. } => "webrtc_answer",
            ServerEvent::WebrtcIce { .. } => "webrtc_ice",
            ServerEvent::RemoteControl { .. } => "remote_control",
            ServerEvent::RemoteAck { .. } => "remote_ack",
        }
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_register_full() {
        let json = serde_json::json!({
            "event": "register",
            "data": {
                "device_id": "robot_0001",
                "device_type": "robot",
                "display_name": "Lab Robot"
            }
        });
        let event: ClientEvent = serde_json::from_value(json).unwrap();
        match event {
            ClientEvent::Register(p) => {
                assert_eq!(p.device_id, "robot_0001");
                assert_eq!(p.device_type, "robot");
                assert_eq!(p.display_name.as_deref(), Some("Lab Robot"));
            }
            other => panic!("expected Register, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_register_applies_defaults() {
        let json = serde_json::json!({"event": "register", "data": {}});
        let event: ClientEvent = serde_json::from_value(json).unwrap();
        match event {
            ClientEvent::Register(p) => {
                assert_eq!(p.device_id, "");
                assert_eq!(p.device_type, "unknown");
                assert!(p.display_name.is_none());
            }
            other => panic!("expected Register, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_unknown_event_fails() {
        let json = serde_json::json!({"event": "make_coffee", "data": {}});
        assert!(serde_json::from_value::<ClientEvent>(json).is_err());
    }

    #[test]
    fn test_parse_call_request_missing_target_fails() {
        let json = serde_json::json!({
            "event": "call_request",
            "data": {"from": "phone_0001"}
        });
        assert!(serde_json::from_value::<ClientEvent>(json).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_payload_fields() {
        let json = serde_json::json!({
            "event": "hangup",
            "data": {"call_id": "c1", "by": "phone_0001", "reason": "bored"}
        });
        assert!(serde_json::from_value::<ClientEvent>(json).is_err());
    }

    #[test]
    fn test_ice_candidate_passes_through_opaque() {
        let json = serde_json::json!({
            "event": "webrtc_ice",
            "data": {
                "call_id": "c1",
                "from": "phone_0001",
                "candidate": {
                    "sdpMid": "0",
                    "sdpMLineIndex": 0,
                    "candidate": "candidate:1 1 UDP 2130706431 192.168.1.1 12345 typ host"
                }
            }
        });
        let event: ClientEvent = serde_json::from_value(json).unwrap();
        match event {
            ClientEvent::WebrtcIce(p) => {
                assert_eq!(p.candidate["sdpMid"], "0");
            }
            other => panic!("expected WebrtcIce, got {other:?}"),
        }
    }

    #[test]
    fn test_remote_control_defaults_value_and_duration() {
        let json = serde_json::json!({
            "event": "remote_control",
            "data": {"from": "phone_0001", "to": "robot_0001", "ctrl_type": "stop"}
        });
        let event: ClientEvent = serde_json::from_value(json).unwrap();
        match event {
            ClientEvent::RemoteControl(p) => {
                assert_eq!(p.value, 0.0);
                assert_eq!(p.duration_ms, 0);
            }
            other => panic!("expected RemoteControl, got {other:?}"),
        }
    }

    #[test]
    fn test_server_event_envelope_shape() {
        let event = ServerEvent::IncomingCall {
            call_id: "c1".to_string(),
            from: "phone_0001".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "incoming_call");
        assert_eq!(value["data"]["call_id"], "c1");
        assert_eq!(value["data"]["from"], "phone_0001");
    }

    #[test]
    fn test_server_event_roundtrip() {
        let event = ServerEvent::MissedCall {
            call_id: "c2".to_string(),
            peer: "robot_0001".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let decoded: ServerEvent = serde_json::from_str(&json).unwrap();
        match decoded {
            ServerEvent::MissedCall { call_id, peer } => {
                assert_eq!(call_id, "c2");
                assert_eq!(peer, "robot_0001");
            }
            other => panic!("expected MissedCall, got {other:?}"),
        }
        assert_eq!(event.name(), "missed_call");
    }
}
