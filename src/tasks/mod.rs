//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod countdown;
pub mod monthly_expenses;

// Re-export main functions
pub use countdown::countdown_task;
pub use monthly_expenses::{monthly_expenses_task, run_monthly_expenses, TaskReport};
