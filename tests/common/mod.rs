//! In-memory provider fakes and a router wired to them.

#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use cloud_gateway::{
    AppState,
    models::{
        message::{
            BatchEntry, BatchFailure, BatchSendOutcome, BatchSuccess, OutgoingMessage,
            ReceivedMessage,
        },
        object::{BucketSummary, ListingPage, ObjectMetadata, ObjectSummary},
    },
    routes::routes::routes,
    services::{
        error::{ServiceError, ServiceResult},
        object_store::{ObjectStore, PutObject, StoredObject},
        payload_offload::PayloadOffloader,
        queue_client::QueueClient,
        queue_service::QueueService,
        storage_service::StorageService,
    },
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    sync::{Arc, Mutex},
};
use tower::ServiceExt;

pub const BUCKET: &str = "gateway-test";
pub const THRESHOLD: usize = 128;
/// Largest message the fake queue accepts.
pub const QUEUE_LIMIT: usize = 512;
/// Request body cap for payload-carrying routes; above axum's 2 MiB default.
pub const BODY_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Clone)]
struct StoredEntry {
    body: Vec<u8>,
    content_type: Option<String>,
    etag: String,
}

/// Buckets of objects kept in memory. Listings are served `page_size`
/// keys at a time so callers must follow continuation tokens.
pub struct MemoryStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, StoredEntry>>>,
    page_size: usize,
    pub list_calls: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        let mut buckets = BTreeMap::new();
        buckets.insert(BUCKET.to_string(), BTreeMap::new());
        Self {
            buckets: Mutex::new(buckets),
            page_size,
            list_calls: Mutex::new(0),
        }
    }

    pub fn insert(&self, bucket: &str, key: &str, body: &[u8]) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredEntry {
                    body: body.to_vec(),
                    content_type: None,
                    etag: etag_of(body),
                },
            );
    }

    pub fn body(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|entry| entry.body.clone())
    }

    pub fn remove(&self, bucket: &str, key: &str) {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.remove(key);
        }
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn entry(&self, bucket: &str, key: &str) -> ServiceResult<StoredEntry> {
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| ServiceError::BucketNotFound(bucket.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

fn etag_of(body: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(body))
}

fn metadata_of(bucket: &str, key: &str, entry: &StoredEntry) -> ObjectMetadata {
    ObjectMetadata {
        bucket: bucket.to_string(),
        key: key.to_string(),
        content_type: entry.content_type.clone(),
        size_bytes: entry.body.len() as i64,
        etag: Some(entry.etag.clone()),
        ..Default::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> ServiceResult<Vec<BucketSummary>> {
        Ok(self
            .buckets
            .lock()
            .unwrap()
            .keys()
            .map(|name| BucketSummary {
                name: name.clone(),
                created_at: None,
            })
            .collect())
    }

    async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        continuation_token: Option<&str>,
    ) -> ServiceResult<ListingPage> {
        *self.list_calls.lock().unwrap() += 1;
        let buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| ServiceError::BucketNotFound(bucket.to_string()))?;

        let prefix = prefix.unwrap_or("");
        let start: usize = continuation_token
            .map(|token| token.parse().unwrap())
            .unwrap_or(0);
        let matching: Vec<_> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        let end = (start + self.page_size).min(matching.len());
        let is_truncated = end < matching.len();

        Ok(ListingPage {
            objects: matching[start..end]
                .iter()
                .map(|(key, entry)| ObjectSummary {
                    key: key.to_string(),
                    size_bytes: entry.body.len() as i64,
                    etag: Some(entry.etag.clone()),
                    last_modified: None,
                    storage_class: Some("STANDARD".into()),
                })
                .collect(),
            is_truncated,
            next_continuation_token: is_truncated.then(|| end.to_string()),
        })
    }

    async fn put_object(&self, request: PutObject) -> ServiceResult<Option<String>> {
        let body = request
            .body
            .collect()
            .await
            .map_err(|err| ServiceError::Io(std::io::Error::other(err)))?
            .into_bytes()
            .to_vec();
        let etag = etag_of(&body);
        let mut buckets = self.buckets.lock().unwrap();
        let objects = buckets
            .get_mut(&request.bucket)
            .ok_or_else(|| ServiceError::BucketNotFound(request.bucket.clone()))?;
        objects.insert(
            request.key,
            StoredEntry {
                body,
                content_type: request.content_type,
                etag: etag.clone(),
            },
        );
        Ok(Some(etag))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ServiceResult<StoredObject> {
        let entry = self.entry(bucket, key)?;
        Ok(StoredObject {
            metadata: metadata_of(bucket, key, &entry),
            body: ByteStream::from(entry.body),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> ServiceResult<ObjectMetadata> {
        let entry = self.entry(bucket, key)?;
        Ok(metadata_of(bucket, key, &entry))
    }

    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        bucket: &str,
        key: &str,
    ) -> ServiceResult<Option<String>> {
        let entry = self.entry(source_bucket, source_key)?;
        let etag = entry.etag.clone();
        self.buckets
            .lock()
            .unwrap()
            .get_mut(bucket)
            .ok_or_else(|| ServiceError::BucketNotFound(bucket.to_string()))?
            .insert(key.to_string(), entry);
        Ok(Some(etag))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> ServiceResult<()> {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.remove(key);
        }
        Ok(())
    }

    async fn head_bucket(&self, bucket: &str) -> ServiceResult<()> {
        if self.buckets.lock().unwrap().contains_key(bucket) {
            Ok(())
        } else {
            Err(ServiceError::BucketNotFound(bucket.to_string()))
        }
    }
}

struct InFlight {
    message_id: String,
    receipt_handle: String,
    message: OutgoingMessage,
}

/// Named queues kept in memory. Received messages stay queued until their
/// receipt handle is deleted; bodies above `max_body` are rejected the way
/// the real service rejects oversized messages.
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, Vec<InFlight>>>,
    next_id: Mutex<usize>,
    max_body: usize,
    pub deleted: Mutex<Vec<String>>,
}

impl MemoryQueue {
    pub fn new(names: &[&str], max_body: usize) -> Self {
        Self {
            queues: Mutex::new(
                names
                    .iter()
                    .map(|name| (queue_url(name), Vec::new()))
                    .collect(),
            ),
            next_id: Mutex::new(0),
            max_body,
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn pending(&self, name: &str) -> Vec<OutgoingMessage> {
        self.queues.lock().unwrap()[&queue_url(name)]
            .iter()
            .map(|in_flight| in_flight.message.clone())
            .collect()
    }

    fn enqueue(&self, queue_url: &str, message: OutgoingMessage) -> ServiceResult<String> {
        if message.size_bytes() > self.max_body {
            return Err(ServiceError::MessageTooLarge(format!(
                "Message must be shorter than {} bytes.",
                self.max_body
            )));
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let message_id = format!("msg-{}", next_id);
        self.queues
            .lock()
            .unwrap()
            .get_mut(queue_url)
            .ok_or_else(|| ServiceError::QueueNotFound(queue_url.to_string()))?
            .push(InFlight {
                message_id: message_id.clone(),
                receipt_handle: format!("rh-{}", next_id),
                message,
            });
        Ok(message_id)
    }
}

fn queue_url(name: &str) -> String {
    format!("http://queue.local/000000000000/{}", name)
}

#[async_trait]
impl QueueClient for MemoryQueue {
    async fn queue_url(&self, queue_name: &str) -> ServiceResult<String> {
        let url = queue_url(queue_name);
        if self.queues.lock().unwrap().contains_key(&url) {
            Ok(url)
        } else {
            Err(ServiceError::QueueNotFound(queue_name.to_string()))
        }
    }

    async fn send_message(&self, queue_url: &str, message: OutgoingMessage) -> ServiceResult<String> {
        self.enqueue(queue_url, message)
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> ServiceResult<BatchSendOutcome> {
        if entries.len() > 10 {
            return Err(ServiceError::invalid("too many entries in batch"));
        }
        let mut outcome = BatchSendOutcome::default();
        for entry in entries {
            match self.enqueue(queue_url, entry.message) {
                Ok(message_id) => outcome.successful.push(BatchSuccess {
                    id: entry.id,
                    message_id,
                }),
                Err(err) => outcome.failed.push(BatchFailure {
                    id: entry.id,
                    code: "InvalidParameterValue".into(),
                    message: Some(err.to_string()),
                    sender_fault: true,
                }),
            }
        }
        Ok(outcome)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        _wait_time_seconds: Option<i32>,
    ) -> ServiceResult<Vec<ReceivedMessage>> {
        let queues = self.queues.lock().unwrap();
        let pending = queues
            .get(queue_url)
            .ok_or_else(|| ServiceError::QueueNotFound(queue_url.to_string()))?;
        Ok(pending
            .iter()
            .take(max_messages as usize)
            .map(|in_flight| ReceivedMessage {
                message_id: in_flight.message_id.clone(),
                receipt_handle: in_flight.receipt_handle.clone(),
                body: in_flight.message.body.clone(),
                attributes: in_flight.message.attributes.clone(),
            })
            .collect())
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> ServiceResult<()> {
        let mut queues = self.queues.lock().unwrap();
        let pending = queues
            .get_mut(queue_url)
            .ok_or_else(|| ServiceError::QueueNotFound(queue_url.to_string()))?;
        let before = pending.len();
        pending.retain(|in_flight| in_flight.receipt_handle != receipt_handle);
        if pending.len() == before {
            return Err(ServiceError::invalid(format!(
                "receipt handle `{}` is not valid",
                receipt_handle
            )));
        }
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn ping(&self) -> ServiceResult<()> {
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
}

/// Router over fresh fakes. Payloads above `THRESHOLD` are offloaded on
/// the large-message path; the queue knows `orders` and `orders.fifo`.
pub fn test_app(transfer_root: &Path) -> TestApp {
    let store = Arc::new(MemoryStore::new(2));
    let queue = Arc::new(MemoryQueue::new(&["orders", "orders.fifo"], QUEUE_LIMIT));
    let offloader = PayloadOffloader::new(store.clone(), BUCKET, THRESHOLD);
    let state = AppState {
        storage: StorageService::new(store.clone(), BUCKET, transfer_root),
        queues: QueueService::new(queue.clone(), offloader),
    };
    TestApp {
        router: routes(BODY_LIMIT).with_state(state),
        store,
        queue,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn assert_error(response: Response<Body>, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    let body = json_body(response).await;
    assert_eq!(body["status"], status.as_u16());
    body
}
