//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::meeting::MeetingError;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<MeetingError> for ApiError {
    fn from(err: MeetingError) -> Self {
        let status = match &err {
            MeetingError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            MeetingError::InvalidTransition { .. } => StatusCode::CONFLICT,
            MeetingError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            MeetingError::NotInitiator => StatusCode::FORBIDDEN,
            MeetingError::GenerationFailure(_) => StatusCode::BAD_GATEWAY,
            MeetingError::ObserverChannel(_) | MeetingError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_meeting_errors_map_to_status_codes() {
        let cases = [
            (MeetingError::InvalidConfig("x".into()), StatusCode::BAD_REQUEST),
            (
                MeetingError::invalid_transition("pause", "completed"),
                StatusCode::CONFLICT,
            ),
            (MeetingError::SessionNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (MeetingError::NotInitiator, StatusCode::FORBIDDEN),
            (
                MeetingError::GenerationFailure("gm: timed out".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (MeetingError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_error_response_status() {
        let response = ApiError::bad_request("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
