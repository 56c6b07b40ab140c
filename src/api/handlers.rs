//! HTTP request handlers for the Signal Hub API
//!
//! The one-shot call-initiation endpoint produces exactly the same session
//! side effects as the channel's `call_request` event; everything else here
//! is status surface.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::app_state::AppState;
use crate::system::metrics;

// Response types

/// Root status payload
#[derive(Serialize, Debug)]
pub struct RootStatus {
    /// Always "ok" while the process is serving
    pub status: String,
    /// Current unix time in seconds
    pub time: u64,
}

/// Body of the one-shot call initiation request
#[derive(Deserialize, Default)]
#[serde(default)]
pub struct CallRequestBody {
    /// Calling device id
    pub caller: Option<String>,
    /// Target device id
    pub target: Option<String>,
}

/// Successful call initiation reply
#[derive(Serialize, Debug)]
pub struct CallCreatedResponse {
    /// Always "calling"
    pub status: String,
    /// Generated call id
    pub call_id: String,
}

/// Dry-run reply, no side effects
#[derive(Serialize, Debug)]
pub struct DryRunResponse {
    /// Whether a real request with this body would place a call
    pub would_call: bool,
    /// Echoed caller id
    pub caller: String,
    /// Echoed target id
    pub target: String,
}

/// Structured error body for one-shot requests
#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    /// Always false
    pub ok: bool,
    /// Machine-readable error code
    pub error: String,
}

/// Health check payload
#[derive(Serialize, Debug)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Seconds since process start
    pub uptime_secs: u64,
    /// Crate version
    pub version: String,
}

/// Service info payload
#[derive(Serialize, Debug)]
pub struct InfoResponse {
    /// Crate name
    pub name: String,
    /// Crate version
    pub version: String,
    /// Currently online devices
    pub online_devices: usize,
    /// Live call sessions
    pub live_calls: usize,
    /// Events waiting in pending queues
    pub queued_events: usize,
    /// Supported surfaces
    pub capabilities: Vec<String>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn missing_field(field: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            ok: false,
            error: format!("missing_field:{}", field),
        }),
    )
}

fn required(value: Option<String>, field: &str) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(missing_field(field)),
    }
}

// Handlers

/// `GET /` - liveness probe with the server clock
pub async fn root_status() -> Json<RootStatus> {
    Json(RootStatus {
        status: "ok".to_string(),
        time: unix_now(),
    })
}

/// `POST /call_robot` - one-shot call initiation
///
/// Same session-creation side effects as the channel's `call_request`:
/// a Ringing session, a ring timer, and an `incoming_call` delivered (or
/// queued) to the target.
pub async fn call_robot(
    State(state): State<AppState>,
    Json(body): Json<CallRequestBody>,
) -> Result<Json<CallCreatedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = required(body.caller, "caller")?;
    let target = required(body.target, "target")?;

    let call_id = state.hub.create_call(&caller, &target);
    Ok(Json(CallCreatedResponse {
        status: "calling".to_string(),
        call_id,
    }))
}

/// `POST /call_robot_dry` - validation-only probe, no session created
pub async fn call_robot_dry(
    Json(body): Json<CallRequestBody>,
) -> Result<Json<DryRunResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = required(body.caller, "caller")?;
    let target = required(body.target, "target")?;

    Ok(Json(DryRunResponse {
        would_call: true,
        caller,
        target,
    }))
}

/// `GET /api/v1/health` - health check
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: crate::VERSION.to_string(),
    })
}

/// `GET /api/v1/info` - service info and live relay counters
pub async fn system_info(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        online_devices: state.hub.online_devices(),
        live_calls: state.hub.live_calls(),
        queued_events: state.hub.queued_events(),
        capabilities: vec![
            "presence".to_string(),
            "call-signaling".to_string(),
            "webrtc-relay".to_string(),
            "remote-control".to_string(),
        ],
    })
}

/// `GET /metrics` - Prometheus text exposition
pub async fn metrics_export() -> String {
    metrics::collect_metrics()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;

    fn test_state() -> AppState {
        AppState::new(Config::default())
    }

    #[tokio::test]
    async fn test_call_robot_creates_a_ringing_session() {
        let state = test_state();
        let body = CallRequestBody {
            caller: Some("phone_0001".to_string()),
            target: Some("robot_0001".to_string()),
        };

        let response = call_robot(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(response.0.status, "calling");
        assert!(!response.0.call_id.is_empty());
        assert_eq!(state.hub.live_calls(), 1);
        // The target is offline, so the ring was queued
        assert_eq!(state.hub.queued_events(), 1);
    }

    #[tokio::test]
    async fn test_call_robot_rejects_missing_target() {
        let state = test_state();
        let body = CallRequestBody {
            caller: Some("phone_0001".to_string()),
            target: None,
        };

        let err = call_robot(State(state.clone()), Json(body)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1 .0.error, "missing_field:target");
        assert_eq!(state.hub.live_calls(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_has_no_side_effects() {
        let body = CallRequestBody {
            caller: Some("phone_0001".to_string()),
            target: Some("robot_0001".to_string()),
        };
        let response = call_robot_dry(Json(body)).await.unwrap();
        assert!(response.0.would_call);
        assert_eq!(response.0.caller, "phone_0001");
    }

    #[tokio::test]
    async fn test_dry_run_rejects_blank_caller() {
        let body = CallRequestBody {
            caller: Some("   ".to_string()),
            target: Some("robot_0001".to_string()),
        };
        let err = call_robot_dry(Json(body)).await.unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
