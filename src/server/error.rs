use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};

use crate::game::GameError;

const LOG_TARGET: &str = "chain_audit::server::error";

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::BadRequest(message)
            | ApiError::Internal(message) => message,
        }
    }
}

impl From<GameError> for ApiError {
    fn from(err: GameError) -> Self {
        let message = err.to_string();
        match err {
            GameError::NotRegistered(_)
            | GameError::SessionNotFound(_)
            | GameError::ScenarioNotFound(_) => ApiError::NotFound(message),
            GameError::WrongPhase { .. }
            | GameError::SessionFull { .. }
            | GameError::AlreadyMember { .. }
            | GameError::NotEnoughPlayers { .. } => ApiError::Conflict(message),
            GameError::InsufficientBalance { .. } | GameError::NotAMember { .. } => {
                ApiError::BadRequest(message)
            }
            GameError::Configuration(_)
            | GameError::Agreement(_)
            | GameError::Ledger(_)
            | GameError::Settlement(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(target: LOG_TARGET, message = %self.message(), "internal server error");
        } else {
            debug!(target: LOG_TARGET, %status, message = %self.message(), "request rejected");
        }
        let body = Json(ErrorBody {
            error: self.message(),
        });
        (status, body).into_response()
    }
}
