//! WebSocket channel for device connections
//!
//! Each connection runs two tasks: this reader loop and a writer task that
//! drains the connection's outbound channel. The relay core only ever sees
//! the channel's sending half, wrapped in a [`ConnectionHandle`], so a slow
//! or dying socket can never block a critical section.
//!
//! Malformed frames (bad JSON, unknown event, missing/unknown fields) are
//! dropped silently per the error-handling contract; only the log records
//! them.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::app_state::AppState;
use crate::core::types::ConnectionId;
use crate::relay::presence::ConnectionHandle;
use crate::relay::protocol::{ClientEvent, ServerEvent};
use crate::relay::SignalHub;

/// `GET /ws` - upgrade to the signaling channel
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

/// Per-connection loop: read frames, dispatch events, clean up on close
async fn handle_socket(socket: WebSocket, hub: Arc<SignalHub>) {
    let conn_id = ConnectionId::new();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    let conn = ConnectionHandle::new(conn_id, tx);

    debug!(conn = %conn_id, "connection opened");

    // Writer task: serialize outbound events onto the socket
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound event");
                }
            }
        }
    });

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => dispatch(&hub, &conn, event),
                Err(e) => {
                    debug!(conn = %conn_id, error = %e, "dropping malformed frame");
                }
            },
            Message::Close(_) => break,
            // Ping/pong are answered at the protocol layer; binary is not
            // part of the signaling channel.
            _ => {}
        }
    }

    hub.disconnect(conn_id);
    writer.abort();
    debug!(conn = %conn_id, "connection closed");
}

/// Route one parsed client event into the relay core
fn dispatch(hub: &Arc<SignalHub>, conn: &ConnectionHandle, event: ClientEvent) {
    match event {
        ClientEvent::Register(payload) => {
            hub.register(conn.clone(), payload);
        }
        ClientEvent::WhoIsOnline(_) => {
            hub.broadcast_online_list();
        }
        ClientEvent::CallRequest(payload) => {
            if payload.from.is_empty() || payload.to.is_empty() {
                debug!("call_request with blank party dropped");
                return;
            }
            let call_id = hub.create_call(&payload.from, &payload.to);
            // The ack goes straight back on this connection, not through
            // addressed delivery.
            let _ = conn.send(ServerEvent::CallCreated { call_id });
        }
        ClientEvent::CallAccepted(payload) => {
            hub.accept_call(&payload.call_id, &payload.by);
        }
        ClientEvent::CallRejected(payload) => {
            hub.reject_call(&payload.call_id, &payload.by);
        }
        ClientEvent::Hangup(payload) => {
            hub.hangup(&payload.call_id, &payload.by);
        }
        ClientEvent::WebrtcOffer(payload) => {
            hub.relay_offer(&payload.call_id, &payload.from, payload.sdp);
        }
        ClientEvent::WebrtcAnswer(payload) => {
            hub.relay_answer(&payload.call_id, &payload.from, payload.sdp);
        }
        ClientEvent::WebrtcIce(payload) => {
            hub.relay_ice(&payload.call_id, &payload.from, payload.candidate);
        }
        ClientEvent::RemoteControl(payload) => {
            if payload.to.is_empty() {
                debug!("remote_control without target dropped");
                return;
            }
            let target = payload.to.clone();
            hub.relay_command(payload);
            let _ = conn.send(ServerEvent::RemoteAck { ok: true, target });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SignalingConfig;
    use crate::relay::protocol::RegisterPayload;

    fn test_hub() -> Arc<SignalHub> {
        SignalHub::new(&SignalingConfig::default())
    }

    fn connection() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(ConnectionId::new(), tx), rx)
    }

    fn parse(text: &str) -> ClientEvent {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_call_request_acks_caller_directly() {
        let hub = test_hub();
        let (conn, mut rx) = connection();
        hub.register(
            conn.clone(),
            RegisterPayload {
                device_id: "phone_0001".to_string(),
                device_type: "phone".to_string(),
                display_name: None,
            },
        );
        while rx.try_recv().is_ok() {}

        dispatch(
            &hub,
            &conn,
            parse(r#"{"event":"call_request","data":{"from":"phone_0001","to":"robot_0001"}}"#),
        );

        match rx.try_recv().unwrap() {
            ServerEvent::CallCreated { call_id } => assert!(hub.live_calls() == 1 && !call_id.is_empty()),
            other => panic!("expected CallCreated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_drops_blank_call_parties() {
        let hub = test_hub();
        let (conn, mut rx) = connection();

        dispatch(
            &hub,
            &conn,
            parse(r#"{"event":"call_request","data":{"from":"","to":"robot_0001"}}"#),
        );

        assert_eq!(hub.live_calls(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_remote_control_acks_sender() {
        let hub = test_hub();
        let (conn, mut rx) = connection();

        dispatch(
            &hub,
            &conn,
            parse(
                r#"{"event":"remote_control","data":{"from":"phone_0001","to":"robot_0001","ctrl_type":"stop"}}"#,
            ),
        );

        match rx.try_recv().unwrap() {
            ServerEvent::RemoteAck { ok, target } => {
                assert!(ok);
                assert_eq!(target, "robot_0001");
            }
            other => panic!("expected RemoteAck, got {other:?}"),
        }
        // The command itself was queued for the offline robot
        assert_eq!(hub.queued_events(), 1);
    }
}
