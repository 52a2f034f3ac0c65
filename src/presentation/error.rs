// API errors and their HTTP mapping
use crate::application::error::DataViewError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    DataView(#[from] DataViewError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no data view is bound")]
    Unbound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::DataView(DataViewError::UnknownSensor(_))
            | ApiError::DataView(DataViewError::UnknownChannel { .. }) => StatusCode::NOT_FOUND,
            ApiError::DataView(DataViewError::NoSensorSelected) => StatusCode::CONFLICT,
            ApiError::DataView(DataViewError::Inconsistent(_))
            | ApiError::DataView(DataViewError::Domain(_))
            | ApiError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unbound => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::consistency::Violation;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(DataViewError::UnknownSensor("s1".to_string())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DataViewError::NoSensorSelected).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(DataViewError::Inconsistent(Violation::OrphanHistoricalData(
                "s2".to_string()
            )))
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::InvalidInput("at".to_string()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::Unbound.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
