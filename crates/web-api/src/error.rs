use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;
        use domain::{DomainError, RepositoryError};

        match error {
            AppErr::Domain(DomainError::InvalidArgument { field, reason }) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            AppErr::Domain(DomainError::RoomNotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", "room not found")
            }
            AppErr::Domain(DomainError::MessageNotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "MESSAGE_NOT_FOUND",
                "message not found",
            ),
            AppErr::Domain(DomainError::NotRoomParticipant) => ApiError::new(
                StatusCode::FORBIDDEN,
                "NOT_ROOM_PARTICIPANT",
                "user is not a participant of the room",
            ),
            AppErr::Domain(DomainError::DirectRoomParticipantCount) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_PARTICIPANTS",
                "a direct room requires exactly two participants",
            ),
            AppErr::Domain(DomainError::EmptyParticipantSet) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_PARTICIPANTS",
                "room requires at least one participant",
            ),
            AppErr::Domain(DomainError::RoomInactive) => ApiError::new(
                StatusCode::CONFLICT,
                "ROOM_INACTIVE",
                "room is deactivated",
            ),
            AppErr::Repository(RepositoryError::NotFound) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "resource not found")
            }
            AppErr::Repository(RepositoryError::Conflict) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource conflict")
            }
            AppErr::Repository(err) => {
                tracing::error!(error = %err, "repository failure");
                ApiError::internal_server_error("storage failure")
            }
            AppErr::Broadcast(err) => {
                tracing::error!(error = %err, "broadcast failure");
                ApiError::internal_server_error("broadcast failure")
            }
            AppErr::Authentication(err) => ApiError::unauthorized(err.to_string()),
            AppErr::Authorization => ApiError::new(
                StatusCode::FORBIDDEN,
                "AUTHORIZATION_ERROR",
                "not authorized",
            ),
            AppErr::Infrastructure(message) => {
                tracing::error!(error = %message, "infrastructure failure");
                ApiError::internal_server_error("infrastructure failure")
            }
        }
    }
}

impl From<application::AuthError> for ApiError {
    fn from(error: application::AuthError) -> Self {
        ApiError::unauthorized(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
