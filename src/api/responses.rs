//! API response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::TimerSnapshot;

/// Response for endpoints that change timer state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub active_count: usize,
    pub timers: Vec<TimerSnapshot>,
}

impl ApiResponse {
    pub fn new(
        status: &str,
        message: String,
        active_count: usize,
        timers: Vec<TimerSnapshot>,
    ) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            active_count,
            timers,
        }
    }

    pub fn ok(message: String, active_count: usize, timers: Vec<TimerSnapshot>) -> Self {
        Self::new("ok", message, active_count, timers)
    }
}

/// Response for a single timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub timer: TimerSnapshot,
    pub active_count: usize,
}

/// Badge count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCountResponse {
    pub active_count: usize,
}

/// Pool status with server metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: Vec<TimerSnapshot>,
    pub active_count: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Sound library listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundsResponse {
    pub sounds: Vec<String>,
    pub headless: bool,
}

/// Rows read from or written to the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsResponse {
    pub rows: Vec<Value>,
}

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            status: "error".to_string(),
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
