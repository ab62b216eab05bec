use crate::services::error::ServiceError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Error returned by every handler: an HTTP status plus a message, rendered
/// as `{"error": .., "status": ..}`.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Missing queues and buckets are client mistakes (400); a missing key is
/// 404; everything the provider or the disk rejects otherwise is 500.
impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::QueueNotFound(_)
            | ServiceError::BucketNotFound(_)
            | ServiceError::InvalidRequest(_) => AppError::bad_request(message),
            ServiceError::ObjectNotFound { .. } | ServiceError::LocalFileNotFound(_) => {
                AppError::not_found(message)
            }
            ServiceError::MessageTooLarge(_) | ServiceError::Provider { .. } | ServiceError::Io(_) => {
                tracing::error!("{}", message);
                AppError::internal(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_coarse_statuses() {
        let cases = [
            (ServiceError::QueueNotFound("q".into()), StatusCode::BAD_REQUEST),
            (ServiceError::BucketNotFound("b".into()), StatusCode::BAD_REQUEST),
            (ServiceError::invalid("nope"), StatusCode::BAD_REQUEST),
            (
                ServiceError::ObjectNotFound {
                    bucket: "b".into(),
                    key: "k".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::MessageTooLarge("too big".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::Provider {
                    operation: "ListBuckets",
                    code: "AccessDenied".into(),
                    message: "denied".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn response_body_carries_message_and_status() {
        let response = AppError::from(anyhow::anyhow!("bind failed")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"error": "bind failed", "status": 500}));
    }

    #[test]
    fn queue_error_message_names_the_queue() {
        let err = AppError::from(ServiceError::QueueNotFound("orders.fifo".into()));
        assert_eq!(err.message, "invalid queue name `orders.fifo`");
    }
}
