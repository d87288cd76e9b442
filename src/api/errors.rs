use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    /// Malformed or incomplete request; the message is echoed to the client.
    BadRequest(String),
    NotFound,
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound => (StatusCode::NOT_FOUND, "endpoint not found".to_owned()),
            AppError::Internal(e) => {
                error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        Self::Internal(e.into())
    }
}

impl AppError {
    pub fn invalid_body(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }

    pub fn invalid_query(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
