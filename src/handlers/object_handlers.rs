//! HTTP handlers for bucket and object operations.
//! Streams object bodies out without buffering and delegates provider
//! concerns to `StorageService`.

use crate::{
    errors::AppError,
    models::object::{BucketSummary, ObjectMetadata, ObjectSummary, StoredObjectRef},
    services::storage_service::StorageService,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Query params accepted by `GET /objects`.
#[derive(Debug, Deserialize)]
pub struct ListObjectsQuery {
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

/// Request body for `POST /copy`.
#[derive(Debug, Deserialize)]
pub struct CopyObjectReq {
    pub source_bucket: Option<String>,
    pub source_key: String,
    pub destination_key: String,
}

#[derive(Debug, Serialize)]
pub struct ListBucketsResponse {
    pub buckets: Vec<BucketSummary>,
}

#[derive(Debug, Serialize)]
pub struct ListObjectsResponse {
    pub bucket: String,
    pub prefix: String,
    pub key_count: usize,
    pub objects: Vec<ObjectSummary>,
}

/// GET `/buckets`
pub async fn list_buckets(
    State(service): State<StorageService>,
) -> Result<Json<ListBucketsResponse>, AppError> {
    let buckets = service.list_buckets().await?;
    Ok(Json(ListBucketsResponse { buckets }))
}

/// GET `/objects?bucket=&prefix=` — every object under the prefix, all pages.
pub async fn list_objects(
    State(service): State<StorageService>,
    Query(q): Query<ListObjectsQuery>,
) -> Result<Json<ListObjectsResponse>, AppError> {
    let objects = service
        .list_all_objects(q.bucket.as_deref(), q.prefix.as_deref())
        .await?;

    Ok(Json(ListObjectsResponse {
        bucket: q
            .bucket
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| service.default_bucket.clone()),
        prefix: q.prefix.unwrap_or_default(),
        key_count: objects.len(),
        objects,
    }))
}

/// PUT `/objects/{*key}` — upload the request body.
pub async fn upload_object(
    State(service): State<StorageService>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stored = service.upload_bytes(&key, content_type, body).await?;

    let mut resp_headers = HeaderMap::new();
    if let Some(value) = stored.etag.as_deref() {
        if let Ok(header_value) = HeaderValue::from_str(value) {
            resp_headers.insert(header::ETAG, header_value);
        }
    }

    Ok((StatusCode::OK, resp_headers, Json(stored)))
}

/// GET `/objects/{*key}` — stream the object body.
pub async fn get_object(
    State(service): State<StorageService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let stored = service.download_object(&key).await?;
    let stream = ReaderStream::new(stored.body.into_async_read());
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &stored.metadata);

    Ok(response)
}

/// HEAD `/objects/{*key}` — same headers as GET but no body.
pub async fn head_object(
    State(service): State<StorageService>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let meta = service.object_metadata(&key).await?;
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

/// DELETE `/objects/{*key}`
pub async fn delete_object(
    State(service): State<StorageService>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    service.delete_object(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/metadata/{*key}` — object metadata as JSON; 404 for a missing key.
pub async fn object_metadata(
    State(service): State<StorageService>,
    Path(key): Path<String>,
) -> Result<Json<ObjectMetadata>, AppError> {
    Ok(Json(service.object_metadata(&key).await?))
}

/// POST `/copy` — server-side copy into the default bucket.
pub async fn copy_object(
    State(service): State<StorageService>,
    Json(req): Json<CopyObjectReq>,
) -> Result<Json<StoredObjectRef>, AppError> {
    let stored = service
        .copy_object(
            req.source_bucket.as_deref(),
            &req.source_key,
            &req.destination_key,
        )
        .await?;
    Ok(Json(stored))
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMetadata) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0) as u64),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Some(modified) = meta.last_modified {
        if let Ok(value) = HeaderValue::from_str(&modified.to_rfc2822()) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }

    for (name, value) in &meta.user_metadata {
        let header_name = HeaderName::try_from(format!("x-amz-meta-{}", name));
        if let (Ok(name), Ok(value)) = (header_name, HeaderValue::from_str(value)) {
            headers.insert(name, value);
        }
    }
}
