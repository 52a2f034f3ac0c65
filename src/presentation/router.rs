// Route table for the data view API
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    clear_channel, clear_sensor, health_check, historical_data, list_sensors, notices,
    select_channel, select_sensor, selection, set_current_time,
};
use axum::Router;
use axum::routing::{delete, get, put};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/sensors", get(list_sensors))
        .route("/historical", get(historical_data))
        .route("/selection", get(selection))
        .route("/selection/time", put(set_current_time))
        .route("/selection/sensor", delete(clear_sensor))
        .route("/selection/sensor/:id", put(select_sensor))
        .route("/selection/channel", delete(clear_channel))
        .route("/selection/channel/:id", put(select_channel))
        .route("/notices", get(notices))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
