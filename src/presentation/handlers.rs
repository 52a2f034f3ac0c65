// HTTP request handlers
use crate::application::data_view::DataView;
use crate::application::events::FetchFailure;
use crate::domain::{ChannelId, HistoricalDataMap, SensorId, SensorMap, Timerange};
use crate::presentation::app_state::AppState;
use crate::presentation::error::ApiError;
use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct TimeQuery {
    pub at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub timerange: Timerange,
    pub data: HistoricalDataMap,
}

#[derive(Serialize)]
pub struct SelectionResponse {
    pub timerange: Timerange,
    pub current_time: DateTime<Utc>,
    pub current_sensor_id: Option<SensorId>,
    pub current_channel_id: Option<ChannelId>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List all sensors in scope
pub async fn list_sensors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SensorMap>, ApiError> {
    let view = state.bound_view()?;
    Ok(Json(view.sensors()))
}

/// Historical data for the current time range
pub async fn historical_data(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let view = state.bound_view()?;
    Ok(Json(HistoryResponse {
        timerange: view.timerange(),
        data: view.historical_data(),
    }))
}

pub async fn selection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    current_selection(&state)
}

pub async fn set_current_time(
    query: Result<Query<TimeQuery>, QueryRejection>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
    state.backend()?.set_current_time(query.at)?;
    current_selection(&state)
}

pub async fn select_sensor(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    state.backend()?.select_sensor(Some(id))?;
    current_selection(&state)
}

pub async fn clear_sensor(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    state.backend()?.select_sensor(None)?;
    current_selection(&state)
}

pub async fn select_channel(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    state.backend()?.select_channel(Some(id))?;
    current_selection(&state)
}

pub async fn clear_channel(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SelectionResponse>, ApiError> {
    state.backend()?.select_channel(None)?;
    current_selection(&state)
}

/// Most recent unresolved fetch failure, if any
pub async fn notices(State(state): State<Arc<AppState>>) -> Json<Option<FetchFailure>> {
    Json(state.notices().current())
}

fn current_selection(state: &AppState) -> Result<Json<SelectionResponse>, ApiError> {
    let view = state.bound_view()?;
    Ok(Json(SelectionResponse {
        timerange: view.timerange(),
        current_time: view.current_time(),
        current_sensor_id: view.current_sensor_id(),
        current_channel_id: view.current_channel_id(),
    }))
}
