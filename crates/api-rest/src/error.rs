use api_shared::{AuthError, ErrorRes};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// Failures visible to HTTP clients.
///
/// Each renders as `{"ok": false, "error": ...}` with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    /// An extractor refused the request, e.g. a body over the size limit.
    Rejected(StatusCode, String),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthorized => Self::Unauthorized,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Rejected(status, msg) => (status, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorRes::new(message))).into_response()
    }
}
