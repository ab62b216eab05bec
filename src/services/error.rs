//! Error type shared by the object-store and queue adapters.
//!
//! Provider failures are classified by the error code the SDK reports so
//! that handlers can map them onto coarse HTTP statuses.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid queue name `{0}`")]
    QueueNotFound(String),
    #[error("bucket `{0}` does not exist")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("local file `{0}` does not exist")]
    LocalFileNotFound(String),
    #[error("message rejected by the queue: {0}; use the large-message path")]
    MessageTooLarge(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("{operation} failed ({code}): {message}")]
    Provider {
        operation: &'static str,
        code: String,
        message: String,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Error code in the provider's vocabulary, for per-entry batch failures.
    pub fn code(&self) -> &str {
        match self {
            Self::QueueNotFound(_) => "AWS.SimpleQueueService.NonExistentQueue",
            Self::BucketNotFound(_) => "NoSuchBucket",
            Self::ObjectNotFound { .. } => "NoSuchKey",
            Self::LocalFileNotFound(_) => "LocalFileNotFound",
            Self::MessageTooLarge(_) => "InvalidParameterValue",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::Provider { code, .. } => code.as_str(),
            Self::Io(_) => "IoError",
        }
    }

    /// Whether retrying the same request unchanged is pointless.
    pub fn is_sender_fault(&self) -> bool {
        !matches!(self, Self::Provider { .. } | Self::Io(_))
    }
}

/// Extracts the provider error code and message from an SDK error.
///
/// Service errors carry the code from the response (e.g. `NoSuchKey`).
/// Transport, timeout and construction failures have no code and report
/// `N/A` with the full error chain as the message.
pub(crate) fn sdk_error_details<E, R>(err: &SdkError<E, R>) -> (String, String)
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => (
            code.to_string(),
            err.message().unwrap_or("no message").to_string(),
        ),
        None => ("N/A".to_string(), DisplayErrorContext(err).to_string()),
    }
}

/// Map an object-store error code onto a service error.
pub(crate) fn classify_s3_error(
    operation: &'static str,
    bucket: &str,
    key: Option<&str>,
    code: String,
    message: String,
) -> ServiceError {
    match (code.as_str(), key) {
        ("NoSuchBucket", _) | ("NotFound", None) => {
            ServiceError::BucketNotFound(bucket.to_string())
        }
        ("NoSuchKey" | "NotFound", Some(key)) => ServiceError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        _ => ServiceError::Provider {
            operation,
            code,
            message,
        },
    }
}

/// Map a queue error code onto a service error.
pub(crate) fn classify_sqs_error(
    operation: &'static str,
    queue: &str,
    code: String,
    message: String,
) -> ServiceError {
    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            ServiceError::QueueNotFound(queue.to_string())
        }
        _ if message.contains("Message must be shorter") => ServiceError::MessageTooLarge(message),
        "InvalidParameterValue" | "MissingParameter" | "InvalidMessageContents" => {
            ServiceError::InvalidRequest(message)
        }
        _ => ServiceError::Provider {
            operation,
            code,
            message,
        },
    }
}
