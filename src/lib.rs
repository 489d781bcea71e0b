//! Countertop - shop-floor countdown timers and back-office automation
//!
//! This library provides a fixed pool of independent countdown timers with
//! owned alarm sounds, a thin client for the hosted sales and inventory
//! database, and the scheduled trigger for recurring expenses.

pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod gateway;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{AudioError, GatewayError, PoolError, StateError};
pub use state::{AppState, TimerPool};
pub use utils::signals::shutdown_signal;
