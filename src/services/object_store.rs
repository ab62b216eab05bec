//! `ObjectStore` — the seam between the gateway and the object-store SDK.
//!
//! `S3ObjectStore` forwards every call to `aws_sdk_s3::Client` and converts
//! the SDK's outputs and errors into the gateway's own models.

use crate::{
    models::object::{BucketSummary, ListingPage, ObjectMetadata, ObjectSummary},
    services::error::{ServiceResult, classify_s3_error, sdk_error_details},
};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    primitives::{ByteStream, DateTime as SdkDateTime},
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Parameters of a single-object upload.
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,

    /// Base64 MD5 digest of the body, verified by the provider when present.
    pub content_md5: Option<String>,

    pub body: ByteStream,
}

/// An object's metadata together with its body stream.
pub struct StoredObject {
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> ServiceResult<Vec<BucketSummary>>;

    /// Fetch one listing page. `continuation_token` is the cursor returned
    /// by the previous page, `None` for the first.
    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> ServiceResult<ListingPage>;

    /// Store an object and return its ETag.
    async fn put_object(&self, request: PutObject) -> ServiceResult<Option<String>>;

    async fn get_object(&self, bucket: &str, key: &str) -> ServiceResult<StoredObject>;

    async fn head_object(&self, bucket: &str, key: &str) -> ServiceResult<ObjectMetadata>;

    /// Server-side copy; returns the ETag of the new object.
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
    ) -> ServiceResult<Option<String>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> ServiceResult<()>;

    /// Succeeds when the bucket exists and is reachable with the current credentials.
    async fn head_bucket(&self, bucket: &str) -> ServiceResult<()>;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Log an SDK failure and classify it.
fn s3_error<E, R>(
    operation: &'static str,
    bucket: &str,
    key: Option<&str>,
    err: SdkError<E, R>,
) -> crate::services::error::ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let (code, message) = sdk_error_details(&err);
    warn!(
        bucket,
        key = key.unwrap_or(""),
        s3_error_code = %code,
        s3_error_message = %message,
        "S3 {} call failed",
        operation
    );
    classify_s3_error(operation, bucket, key, code, message)
}

fn to_chrono(value: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn to_btree(metadata: Option<&HashMap<String, String>>) -> BTreeMap<String, String> {
    metadata
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Build the `x-amz-copy-source` value: bucket plus URL-encoded key segments.
pub(crate) fn copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{}", bucket, encoded)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list_buckets(&self) -> ServiceResult<Vec<BucketSummary>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| s3_error("ListBuckets", "", None, err))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                bucket.name().map(|name| BucketSummary {
                    name: name.to_string(),
                    created_at: bucket.creation_date().and_then(to_chrono),
                })
            })
            .collect())
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> ServiceResult<ListingPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(str::to_string))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|err| s3_error("ListObjectsV2", bucket, None, err))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size_bytes: object.size().unwrap_or(0),
                    etag: object.e_tag().map(str::to_string),
                    last_modified: object.last_modified().and_then(to_chrono),
                    storage_class: object.storage_class().map(|c| c.as_str().to_string()),
                })
            })
            .collect::<Vec<_>>();

        debug!(
            bucket,
            count = objects.len(),
            truncated = output.is_truncated().unwrap_or(false),
            "listed object page"
        );

        Ok(ListingPage {
            objects,
            is_truncated: output.is_truncated().unwrap_or(false),
            next_continuation_token: output.next_continuation_token().map(String::from),
        })
    }

    async fn put_object(&self, request: PutObject) -> ServiceResult<Option<String>> {
        let PutObject {
            bucket,
            key,
            content_type,
            content_md5,
            body,
        } = request;

        let output = self
            .client
            .put_object()
            .bucket(&bucket)
            .key(&key)
            .set_content_type(content_type)
            .set_content_md5(content_md5)
            .body(body)
            .send()
            .await
            .map_err(|err| s3_error("PutObject", &bucket, Some(&key), err))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ServiceResult<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| s3_error("GetObject", bucket, Some(key), err))?;

        let metadata = ObjectMetadata {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: output.content_type().map(str::to_string),
            size_bytes: output.content_length().unwrap_or(0),
            etag: output.e_tag().map(str::to_string),
            last_modified: output.last_modified().and_then(to_chrono),
            storage_class: output.storage_class().map(|c| c.as_str().to_string()),
            user_metadata: to_btree(output.metadata()),
        };

        Ok(StoredObject {
            metadata,
            body: output.body,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ServiceResult<ObjectMetadata> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| s3_error("HeadObject", bucket, Some(key), err))?;

        Ok(ObjectMetadata {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: output.content_type().map(str::to_string),
            size_bytes: output.content_length().unwrap_or(0),
            etag: output.e_tag().map(str::to_string),
            last_modified: output.last_modified().and_then(to_chrono),
            storage_class: output.storage_class().map(|c| c.as_str().to_string()),
            user_metadata: to_btree(output.metadata()),
        })
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
    ) -> ServiceResult<Option<String>> {
        let output = self
            .client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| s3_error("CopyObject", source_bucket, Some(source_key), err))?;

        Ok(output
            .copy_object_result()
            .and_then(|result| result.e_tag())
            .map(str::to_string))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ServiceResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| s3_error("DeleteObject", bucket, Some(key), err))?;
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> ServiceResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|err| s3_error("HeadBucket", bucket, None, err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_source_encodes_each_segment() {
        assert_eq!(
            copy_source("media", "photos/2025/summer trip.jpg"),
            "media/photos/2025/summer%20trip.jpg"
        );
    }

    #[test]
    fn sdk_timestamps_convert_to_utc() {
        let converted = to_chrono(&SdkDateTime::from_secs(1_700_000_000)).unwrap();
        assert_eq!(converted.timestamp(), 1_700_000_000);
    }
}
