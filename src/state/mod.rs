//! State management module
//!
//! This module contains the timer pool, its per-timer records and the shared
//! application state wrapped around them.

pub mod app_state;
pub mod pool;
pub mod timer_state;

// Re-export main types
pub use app_state::AppState;
pub use pool::{TickOutcome, TimerPool, DEFAULT_TIMER_COUNT};
pub use timer_state::{parse_duration, TickHandle, Timer, TimerPatch, TimerPhase, TimerSnapshot};
