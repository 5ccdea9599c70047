// HTTP error handling

use aula_sfu::SfuError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<SfuError> for AppError {
    fn from(err: SfuError) -> Self {
        let message = err.to_string();
        match err {
            SfuError::RoomNotFound(_)
            | SfuError::ParticipantNotFound(_)
            | SfuError::TransportNotFound(_)
            | SfuError::ProducerNotFound(_)
            | SfuError::ConsumerNotFound(_) => Self::not_found(message),
            SfuError::PermissionDenied(_) => Self::forbidden(message),
            SfuError::SelfConsumeRejected(_)
            | SfuError::UnsupportedMediaKind(_)
            | SfuError::InvalidTransportDirection(_) => Self::bad_request(message),
            SfuError::RoomLimitReached(_) | SfuError::ParticipantLimitReached(_) => {
                Self::service_unavailable(message)
            }
            SfuError::WorkerPoolInit(_) | SfuError::InvalidConfig(_) => {
                tracing::error!("SFU error: {message}");
                Self::internal("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aula_sfu::RoomId;

    #[test]
    fn test_not_found_mapping() {
        let err = AppError::from(SfuError::RoomNotFound(RoomId::from("r1")));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_limit_maps_to_unavailable() {
        let err = AppError::from(SfuError::RoomLimitReached(10));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
