//! System utilities and monitoring
//!
//! This module contains metrics collection and other system-level
//! utilities shared by the server surfaces.

pub mod metrics;
