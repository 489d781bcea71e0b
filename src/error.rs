//! Error types shared across the crate

use thiserror::Error;

/// Failures of an owned alert-sound resource
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("sound '{sound}' not found in the sound library")]
    NotFound { sound: String },

    #[error("audio device error: {0}")]
    Device(String),
}

/// Failures of the timer pool itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("a timer pool needs at least one timer")]
    EmptyPool,

    #[error("timer index {index} is out of range (pool has {count} timers)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Failures talking to the hosted database
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("no database is configured")]
    NotConfigured,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid table or procedure name '{0}'")]
    InvalidName(String),
}

/// Failures of the shared application state
#[derive(Error, Debug)]
pub enum StateError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("failed to lock {0}")]
    LockPoisoned(&'static str),

    #[error("the timer pool has been shut down")]
    Closed,
}
