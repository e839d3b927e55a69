use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use catalog_shared::{PasswordError, TokenError};
use catalog_store::StoreError;
use thiserror::Error;

use crate::uploads::UploadError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Reported in the `error` field instead of `message`. Login uses this.
    #[error("{error}")]
    Rejected {
        status: StatusCode,
        error: &'static str,
    },

    /// Anything unexpected. The detail is logged, never sent to the client.
    #[error("{detail:#}")]
    Internal {
        action: Option<&'static str>,
        detail: anyhow::Error,
    },
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn internal(detail: impl Into<anyhow::Error>) -> Self {
        ApiError::Internal {
            action: None,
            detail: detail.into(),
        }
    }

    /// Name the operation a 500 belongs to, e.g. `"Failed to create course"`.
    pub fn in_action(self, action: &'static str) -> Self {
        match self {
            ApiError::Internal {
                action: None,
                detail,
            } => ApiError::Internal {
                action: Some(action),
                detail,
            },
            other => other,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::Rejected { error, .. } => serde_json::json!({
                "success": false,
                "error": error,
            }),
            ApiError::Internal { action, detail } => {
                tracing::error!(
                    action = action.unwrap_or("request"),
                    error = %format!("{detail:#}"),
                    "Unhandled failure"
                );
                serde_json::json!({
                    "success": false,
                    "message": action.unwrap_or("Internal server error"),
                    "error": "Internal server error",
                })
            }
            other => serde_json::json!({
                "success": false,
                "message": other.to_string(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal(err)
    }
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) => ApiError::internal(err),
            rejected => ApiError::BadRequest(rejected.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(err)
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::internal(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_action_only_labels_internal_errors() {
        let err = ApiError::internal(anyhow::anyhow!("disk on fire")).in_action("Failed to create course");
        assert!(matches!(
            err,
            ApiError::Internal {
                action: Some("Failed to create course"),
                ..
            }
        ));

        let err = ApiError::bad_request("nope").in_action("Failed to create course");
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "nope"));
    }

    #[test]
    fn test_upload_rejections_are_client_errors() {
        assert_eq!(ApiError::from(UploadError::TooLarge).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(UploadError::InvalidType).to_string(), "Invalid file type");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(
            ApiError::from(UploadError::Io(io)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
