//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler))
        .route("/timers/active-count", get(active_count_handler))
        .route("/timers/events", get(timer_events_handler))
        .route("/timers/silence", post(silence_all_handler))
        .route("/timers/:index", patch(update_timer_handler))
        .route("/timers/:index/start", post(start_timer_handler))
        .route("/timers/:index/stop", post(stop_timer_handler))
        .route("/timers/:index/silence", post(silence_timer_handler))
        .route("/sounds", get(sounds_handler))
        .route("/products", get(products_handler))
        .route("/sales", post(record_sale_handler))
        .route("/tasks/monthly-expenses", post(monthly_expenses_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
