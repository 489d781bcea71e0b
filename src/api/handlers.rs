//! HTTP endpoint handlers

use std::{collections::HashMap, convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    error::{GatewayError, PoolError, StateError},
    gateway::RestGateway,
    state::{parse_duration, AppState, TickOutcome, TimerPatch},
    tasks::{run_monthly_expenses, TaskReport},
};
use super::responses::{
    ActiveCountResponse, ApiResponse, ErrorResponse, HealthResponse, RowsResponse,
    SoundsResponse, StatusResponse, TimerResponse,
};

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: String) -> ApiError {
    (status, Json(ErrorResponse::new(message)))
}

fn state_error(e: StateError) -> ApiError {
    let status = match &e {
        StateError::Pool(PoolError::IndexOutOfRange { .. }) => StatusCode::NOT_FOUND,
        StateError::Pool(PoolError::EmptyPool) => StatusCode::BAD_REQUEST,
        StateError::Pool(PoolError::Audio(_)) | StateError::LockPoisoned(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        StateError::Closed => StatusCode::SERVICE_UNAVAILABLE,
    };
    if status.is_server_error() {
        error!("Timer operation failed: {}", e);
    } else {
        warn!("Timer request rejected: {}", e);
    }
    api_error(status, e.to_string())
}

fn gateway_error(e: GatewayError) -> ApiError {
    let status = match &e {
        GatewayError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::InvalidName(_) => StatusCode::BAD_REQUEST,
        GatewayError::Transport(_) | GatewayError::Remote { .. } | GatewayError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    error!("Database request failed: {}", e);
    api_error(status, e.to_string())
}

fn gateway(state: &AppState) -> Result<&RestGateway, ApiError> {
    state
        .gateway
        .as_ref()
        .ok_or_else(|| gateway_error(GatewayError::NotConfigured))
}

/// Build the standard response from the current pool
fn pool_response(state: &AppState, message: String) -> ApiResult<ApiResponse> {
    let timers = state.timers().map_err(state_error)?;
    let active_count = state.active_count().map_err(state_error)?;
    Ok(Json(ApiResponse::ok(message, active_count, timers)))
}

fn timer_response(state: &AppState, index: usize) -> ApiResult<TimerResponse> {
    Ok(Json(TimerResponse {
        timer: state.timer(index).map_err(state_error)?,
        active_count: state.active_count().map_err(state_error)?,
    }))
}

/// Handle GET /timers - All timers and the active count
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    pool_response(&state, "Timers".to_string())
}

/// Handle GET /timers/active-count - Badge count
pub async fn active_count_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ActiveCountResponse> {
    let active_count = state.active_count().map_err(state_error)?;
    Ok(Json(ActiveCountResponse { active_count }))
}

/// Handle GET /timers/events - Snapshot list on every change
pub async fn timer_events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();

    let events = stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let timers = rx.borrow_and_update().clone();
        let event = match Event::default().event("timers").json_data(&timers) {
            Ok(event) => event,
            Err(e) => {
                warn!("Failed to encode timer event: {}", e);
                Event::default().comment("encoding failed")
            }
        };
        Some((Ok::<_, Infallible>(event), (rx, false)))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle PATCH /timers/:index - Partial update
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(patch): Json<TimerPatch>,
) -> ApiResult<TimerResponse> {
    state.update_timer(index, patch).map_err(state_error)?;
    timer_response(&state, index)
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    /// Duration in seconds; falls back to the timer's input text
    pub seconds: Option<u64>,
}

/// Handle POST /timers/:index/start - Start counting down
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    body: Option<Json<StartRequest>>,
) -> ApiResult<TimerResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let seconds = match request.seconds {
        Some(seconds) => seconds,
        None => {
            let input = state.timer(index).map_err(state_error)?.input_value;
            parse_duration(&input).ok_or_else(|| {
                warn!("Timer {} has no valid duration: '{}'", index, input);
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("'{}' is not a duration (use SS, MM:SS or HH:MM:SS)", input),
                )
            })?
        }
    };

    match state.start_timer(index, seconds).map_err(state_error)? {
        TickOutcome::Expired => info!("Timer {} started with no time left", index),
        _ => info!("Timer {} started for {}s", index, seconds),
    }
    timer_response(&state, index)
}

/// Handle POST /timers/:index/stop - Stop counting down
pub async fn stop_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> ApiResult<TimerResponse> {
    state.stop_timer(index).map_err(state_error)?;
    info!("Timer {} stopped", index);
    timer_response(&state, index)
}

/// Handle POST /timers/:index/silence - Silence one alarm
pub async fn silence_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> ApiResult<TimerResponse> {
    if state.silence_timer(index).map_err(state_error)? {
        info!("Timer {} silenced", index);
    }
    timer_response(&state, index)
}

/// Handle POST /timers/silence - Silence every alarm
pub async fn silence_all_handler(State(state): State<Arc<AppState>>) -> ApiResult<ApiResponse> {
    let silenced = state.silence_all().map_err(state_error)?;
    pool_response(&state, format!("Silenced {} alarms", silenced))
}

/// Handle GET /status - Pool status and server metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let timers = state.timers().map_err(state_error)?;
    let active_count = state.active_count().map_err(state_error)?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timers,
        active_count,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /sounds - Sounds available in the library
pub async fn sounds_handler(State(state): State<Arc<AppState>>) -> Json<SoundsResponse> {
    Json(SoundsResponse {
        sounds: state.sounds.available(),
        headless: state.sounds.dir().is_none(),
    })
}

/// Handle GET /products - Inventory rows, query parameters as filter
pub async fn products_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<HashMap<String, String>>,
) -> ApiResult<RowsResponse> {
    let mut filter: Vec<(String, String)> = filter.into_iter().collect();
    filter.sort();

    let rows = gateway(&state)?
        .select("products", &filter)
        .await
        .map_err(gateway_error)?;
    Ok(Json(RowsResponse { rows }))
}

/// Handle POST /sales - Record a sale
pub async fn record_sale_handler(
    State(state): State<Arc<AppState>>,
    Json(sale): Json<Value>,
) -> Result<(StatusCode, Json<RowsResponse>), ApiError> {
    let row = gateway(&state)?
        .insert("sales", &sale)
        .await
        .map_err(gateway_error)?;
    info!("Sale recorded");
    Ok((StatusCode::CREATED, Json(RowsResponse { rows: vec![row] })))
}

/// Handle POST /tasks/monthly-expenses - Trigger the recurring-expense run
pub async fn monthly_expenses_handler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<TaskReport>) {
    let report = run_monthly_expenses(state.gateway.as_ref()).await;
    let status = StatusCode::from_u16(report.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(report))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
