//! Mapping of daemon errors to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use openapi_server::models::ErrorResponse;
use tracing::error;

use crate::errors::{HarborError, ValidationError};

/// Error returned by handlers
#[derive(Debug)]
pub struct ApiError(pub HarborError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            HarborError::Validation(ValidationError::AppNotFound(_)) => StatusCode::NOT_FOUND,
            HarborError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HarborError> for ApiError {
    fn from(err: HarborError) -> Self {
        ApiError(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
