// file: src/server/error.rs
// version: 1.0.0
// guid: 93a5f0d2-7b1e-4c68-8f24-d6e0b7a3c915

//! HTTP mapping of crate errors

use crate::KangarooError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

/// Error returned by every handler
#[derive(Debug)]
pub struct ApiError(pub KangarooError);

impl From<KangarooError> for ApiError {
    fn from(err: KangarooError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            KangarooError::AuthRejected => StatusCode::FORBIDDEN,
            KangarooError::ValidationError(_) => StatusCode::BAD_REQUEST,
            KangarooError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            // Never say whether the token was missing or wrong
            KangarooError::AuthRejected => "forbidden".to_string(),
            KangarooError::ValidationError(msg) => msg.clone(),
            KangarooError::NotFound(what) => format!("{} not found", what),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
