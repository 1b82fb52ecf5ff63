use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::error::DomainError;

// Error unificado de la API: envuelve el error de dominio y lo proyecta al
// código HTTP que corresponde a su clasificación.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self.0 {
            DomainError::Validation(_)
            | DomainError::InsufficientAmount { .. }
            | DomainError::InsufficientBalance { .. }
            | DomainError::CurrencyMismatch { .. } => (StatusCode::BAD_REQUEST, self.0.to_string()),
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, self.0.to_string()),
            DomainError::BusinessRuleViolation(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.0.to_string())
            }
            DomainError::InvalidStatusTransition { .. } | DomainError::Concurrency { .. } => {
                (StatusCode::CONFLICT, self.0.to_string())
            }
            DomainError::Repository { message, .. } | DomainError::Publisher { message, .. } => {
                tracing::error!("infrastructure error: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            DomainError::Other { code, message } => {
                tracing::error!("unclassified domain error {code}: {message}");
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
        };

        let body = Json(json!({
            "status": "error",
            "message": error_message,
        }));

        (status, body).into_response()
    }
}
