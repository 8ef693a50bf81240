// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use gcpanel_core::oauth2::{ErrorCode, OAuth2Error};
use gcpanel_core::service::CallbackFailure;

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

    pub fn internal_server_error(message: impl Into<String>) -> Self {
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

/// HTTP status for a sign-in failure
#[must_use]
pub const fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::UnknownProvider | ErrorCode::InvalidState | ErrorCode::MissingEmail => {
            StatusCode::BAD_REQUEST
        }
        ErrorCode::AccountDisabled => StatusCode::FORBIDDEN,
        ErrorCode::TokenExchangeFailed | ErrorCode::UserInfoFailed => StatusCode::BAD_GATEWAY,
        ErrorCode::ProviderNotConfigured | ErrorCode::AccountCreationFailed => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Convert sign-in errors raised outside the callback to HTTP errors
impl From<OAuth2Error> for AppError {
    fn from(err: OAuth2Error) -> Self {
        let status = status_for(err.code());
        if status.is_server_error() {
            tracing::error!("OAuth2 error: {}", err);
        }
        Self::new(status, err.user_message())
    }
}

/// Callback failure rendered as `{errorCode, message, correlationId}`
#[derive(Debug)]
pub struct CallbackRejection(pub CallbackFailure);

impl IntoResponse for CallbackRejection {
    fn into_response(self) -> Response {
        (status_for(self.0.error_code), Json(self.0)).into_response()
    }
}
