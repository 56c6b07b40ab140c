//! # API Module
//!
//! This module provides the HTTP and WebSocket interface for Signal Hub:
//! - The persistent signaling channel all devices connect to
//! - One-shot call initiation over plain request/response
//! - System health, info, and metrics endpoints
//!
//! ## Endpoints Overview
//!
//! ### Signaling Channel
//! - `WebSocket /ws` - persistent bidirectional channel; every frame is a
//!   JSON envelope `{"event": <name>, "data": {...}}`
//!
//! ### Call Initiation
//! - `POST /call_robot` - create a call session, same side effects as the
//!   channel's `call_request`
//! - `POST /call_robot_dry` - validation-only probe, no session created
//!
//! ### System Essentials
//! - `GET /` - liveness probe with server clock
//! - `GET /api/v1/health` - health check
//! - `GET /api/v1/info` - service info and live relay counters
//! - `GET /metrics` - Prometheus exposition (when enabled)

pub mod handlers;
pub mod server;
pub mod ws;

// Re-export commonly used items
pub use server::{create_app, start_server};
