use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Failures raised by the inventory and purchase services.
///
/// Absence of a row is not an error: services return `Ok(None)` for it.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Errors as seen by HTTP clients. Every variant renders as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Insufficient stock")]
    InsufficientStock,

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InsufficientStock => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(msg) => AppError::Validation(msg),
            ServiceError::InsufficientStock { .. } => AppError::InsufficientStock,
            ServiceError::Storage(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Internal(e) => error!(error = ?e, "request failed"),
            other => warn!(%status, error = %other, "request rejected"),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Unwraps a JSON body, turning extractor rejections into a 400.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::Validation("Name is required".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::InsufficientStock { requested: 10, available: 5 },
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::Storage(anyhow::anyhow!("connection reset")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AppError::from(anyhow::anyhow!("password authentication failed for user postgres"));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(AppError::NotFound("Sweet").to_string(), "Sweet not found");
        assert_eq!(AppError::InsufficientStock.to_string(), "Insufficient stock");
    }
}
