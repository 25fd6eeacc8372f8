use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::CoreError;

/// Maps a classified core failure onto an HTTP status and `{error}` body.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoreError::NotFound(_) | CoreError::FileNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CoreError::Connection { .. } => StatusCode::BAD_GATEWAY,
            CoreError::Query(_) | CoreError::Import { .. } | CoreError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{} {}", status.as_u16(), self.0);
        } else {
            log::warn!("{} {}", status.as_u16(), self.0);
        }

        let body = match &self.0 {
            CoreError::Import {
                message,
                success_count,
                error_count,
            } => json!({
                "error": message,
                "success": false,
                "successCount": success_count,
                "errorCount": error_count,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
