use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::models::ErrorResponse;
use crate::pipeline::InputError;
use crate::session::SessionError;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<InputError> for ServerError {
    fn from(err: InputError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Steps taken out of order conflict with the session's state; bad
/// indices or dishes are the caller's input.
impl From<SessionError> for ServerError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidTransition { .. } => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(input) = err.downcast_ref::<InputError>() {
            return Self::bad_request(input.to_string());
        }
        match err.downcast_ref::<SessionError>() {
            Some(session) => Self::from(session.clone()),
            None => Self::internal(format!("{:#}", err)),
        }
    }
}


impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
