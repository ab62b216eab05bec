//! Large-payload offloading through the object store.
//!
//! Messages above the threshold are stored as objects and replaced on the
//! queue by a JSON pointer tagged with the `ExtendedPayloadSize` attribute.
//! The pointer and receipt-handle encodings match the provider's extended
//! client so either side can consume messages produced by the other.

use crate::{
    models::message::{MessageAttribute, OutgoingMessage, ReceivedMessage},
    services::{
        error::{ServiceError, ServiceResult},
        object_store::{ObjectStore, PutObject},
    },
};
use aws_sdk_s3::primitives::ByteStream;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, info};
use uuid::Uuid;

/// Queue message size limit (256 KiB).
pub const DEFAULT_PAYLOAD_THRESHOLD: usize = 262_144;
pub const EXTENDED_PAYLOAD_SIZE_ATTRIBUTE: &str = "ExtendedPayloadSize";
pub const LEGACY_PAYLOAD_SIZE_ATTRIBUTE: &str = "SQSLargePayloadSize";

const POINTER_CLASS: &str = "software.amazon.payloadoffloading.PayloadS3Pointer";
const BUCKET_MARKER: &str = "-..s3BucketName..-";
const KEY_MARKER: &str = "-..s3Key..-";

/// Location of an offloaded message body.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PayloadPointer {
    #[serde(rename = "s3BucketName")]
    pub bucket: String,
    #[serde(rename = "s3Key")]
    pub key: String,
}

impl PayloadPointer {
    /// Encode as `["<pointer class>", {"s3BucketName": .., "s3Key": ..}]`.
    pub fn to_message_body(&self) -> ServiceResult<String> {
        serde_json::to_string(&(POINTER_CLASS, self))
            .map_err(|err| ServiceError::invalid(format!("encoding payload pointer: {}", err)))
    }

    pub fn from_message_body(body: &str) -> ServiceResult<Self> {
        let (class, pointer): (String, PayloadPointer) = serde_json::from_str(body)
            .map_err(|err| ServiceError::invalid(format!("malformed payload pointer: {}", err)))?;
        if class != POINTER_CLASS {
            return Err(ServiceError::invalid(format!(
                "unexpected payload pointer class `{}`",
                class
            )));
        }
        Ok(pointer)
    }

    /// Prefix a receipt handle with this pointer so a later delete can find the payload.
    pub fn embed_in_receipt_handle(&self, receipt_handle: &str) -> String {
        format!(
            "{m}{bucket}{m}{k}{key}{k}{handle}",
            m = BUCKET_MARKER,
            k = KEY_MARKER,
            bucket = self.bucket,
            key = self.key,
            handle = receipt_handle
        )
    }

    /// Split a receipt handle produced by `embed_in_receipt_handle` into the
    /// pointer and the queue's original handle. Plain handles yield `None`.
    pub fn split_receipt_handle(receipt_handle: &str) -> Option<(Self, String)> {
        let (bucket, rest) = between_markers(receipt_handle, BUCKET_MARKER)?;
        let (key, original) = between_markers(rest, KEY_MARKER)?;
        Some((
            Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            original.to_string(),
        ))
    }
}

/// For `"{marker}{value}{marker}{rest}"` return `(value, rest)`.
fn between_markers<'a>(input: &'a str, marker: &str) -> Option<(&'a str, &'a str)> {
    let after = input.strip_prefix(marker)?;
    let end = after.find(marker)?;
    Some((&after[..end], &after[end + marker.len()..]))
}

/// Whether a received message carries an offloaded payload.
pub fn is_offloaded(attributes: &BTreeMap<String, MessageAttribute>) -> bool {
    attributes.contains_key(EXTENDED_PAYLOAD_SIZE_ATTRIBUTE)
        || attributes.contains_key(LEGACY_PAYLOAD_SIZE_ATTRIBUTE)
}

/// Stores oversized bodies in a bucket and resolves them again on receipt.
#[derive(Clone)]
pub struct PayloadOffloader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    threshold: usize,
}

impl PayloadOffloader {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, threshold: usize) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            threshold,
        }
    }

    /// Messages strictly larger than the threshold take the extended path.
    pub fn exceeds_threshold(&self, message: &OutgoingMessage) -> bool {
        message.size_bytes() > self.threshold
    }

    /// Replace an oversized message by a pointer to its stored body.
    ///
    /// Returns the message to put on the queue and whether it was offloaded.
    pub async fn offload(&self, message: OutgoingMessage) -> ServiceResult<(OutgoingMessage, bool)> {
        if message.attributes.contains_key(EXTENDED_PAYLOAD_SIZE_ATTRIBUTE) {
            return Err(ServiceError::invalid(format!(
                "attribute `{}` is reserved",
                EXTENDED_PAYLOAD_SIZE_ATTRIBUTE
            )));
        }
        if !self.exceeds_threshold(&message) {
            return Ok((message, false));
        }

        let payload_size = message.body.len();
        let pointer = PayloadPointer {
            bucket: self.bucket.clone(),
            key: Uuid::new_v4().to_string(),
        };

        let etag = self
            .store
            .put_object(PutObject {
                bucket: pointer.bucket.clone(),
                key: pointer.key.clone(),
                content_type: Some("text/plain; charset=utf-8".into()),
                content_md5: None,
                body: ByteStream::from(message.body.into_bytes()),
            })
            .await?;
        info!(
            bucket = %pointer.bucket,
            key = %pointer.key,
            payload_size,
            etag = etag.as_deref().unwrap_or(""),
            "offloaded message payload"
        );

        let mut attributes = message.attributes;
        attributes.insert(
            EXTENDED_PAYLOAD_SIZE_ATTRIBUTE.to_string(),
            MessageAttribute::number(payload_size),
        );

        Ok((
            OutgoingMessage {
                body: pointer.to_message_body()?,
                group_id: message.group_id,
                attributes,
            },
            true,
        ))
    }

    /// Swap a pointer message's body for the stored payload. Messages
    /// without the size attribute are returned untouched.
    pub async fn restore(&self, mut message: ReceivedMessage) -> ServiceResult<ReceivedMessage> {
        if !is_offloaded(&message.attributes) {
            return Ok(message);
        }

        let pointer = PayloadPointer::from_message_body(&message.body)?;
        let stored = self.store.get_object(&pointer.bucket, &pointer.key).await?;
        let bytes = stored
            .body
            .collect()
            .await
            .map_err(|err| ServiceError::Io(std::io::Error::other(err)))?
            .into_bytes();
        let body = String::from_utf8(bytes.to_vec()).map_err(|err| {
            ServiceError::invalid(format!(
                "payload {}/{} is not UTF-8: {}",
                pointer.bucket, pointer.key, err
            ))
        })?;
        debug!(bucket = %pointer.bucket, key = %pointer.key, "restored offloaded payload");

        message.body = body;
        message.receipt_handle = pointer.embed_in_receipt_handle(&message.receipt_handle);
        message.attributes.remove(EXTENDED_PAYLOAD_SIZE_ATTRIBUTE);
        message.attributes.remove(LEGACY_PAYLOAD_SIZE_ATTRIBUTE);
        Ok(message)
    }

    /// Delete the stored payload referenced by a receipt handle, if any, and
    /// return the handle the queue itself issued.
    pub async fn release(&self, receipt_handle: &str) -> ServiceResult<String> {
        match PayloadPointer::split_receipt_handle(receipt_handle) {
            Some((pointer, original)) => {
                self.store.delete_object(&pointer.bucket, &pointer.key).await?;
                debug!(bucket = %pointer.bucket, key = %pointer.key, "deleted offloaded payload");
                Ok(original)
            }
            None => Ok(receipt_handle.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointer() -> PayloadPointer {
        PayloadPointer {
            bucket: "queue-payloads".into(),
            key: "0b7f2b8e-4c55-4d8e-a1c0-3f1e2d9a7b61".into(),
        }
    }

    #[test]
    fn pointer_body_matches_extended_client_format() {
        assert_eq!(
            pointer().to_message_body().unwrap(),
            r#"["software.amazon.payloadoffloading.PayloadS3Pointer",{"s3BucketName":"queue-payloads","s3Key":"0b7f2b8e-4c55-4d8e-a1c0-3f1e2d9a7b61"}]"#
        );
    }

    #[test]
    fn pointer_body_is_parsed_back() {
        let body = pointer().to_message_body().unwrap();
        assert_eq!(PayloadPointer::from_message_body(&body).unwrap(), pointer());
    }

    #[test]
    fn foreign_pointer_class_is_rejected() {
        let body = r#"["com.example.Other",{"s3BucketName":"b","s3Key":"k"}]"#;
        assert!(matches!(
            PayloadPointer::from_message_body(body),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[test]
    fn receipt_handle_embedding_is_reversible() {
        let handle = "AQEBzbVv...plain-handle==";
        let embedded = pointer().embed_in_receipt_handle(handle);
        assert!(embedded.starts_with("-..s3BucketName..-queue-payloads-..s3BucketName..-"));

        let (parsed, original) = PayloadPointer::split_receipt_handle(&embedded).unwrap();
        assert_eq!(parsed, pointer());
        assert_eq!(original, handle);
    }

    #[test]
    fn plain_receipt_handles_are_not_split() {
        assert!(PayloadPointer::split_receipt_handle("AQEBzbVv...plain-handle==").is_none());
    }

    #[test]
    fn legacy_size_attribute_marks_offloaded_messages() {
        let mut attrs = BTreeMap::new();
        assert!(!is_offloaded(&attrs));
        attrs.insert(LEGACY_PAYLOAD_SIZE_ATTRIBUTE.to_string(), MessageAttribute::number(10));
        assert!(is_offloaded(&attrs));
    }
}
