//! Defines routes for all object-store and queue operations.
//!
//! ## Structure
//! - **Object store**
//!   - `GET    /buckets` — list buckets
//!   - `GET    /objects?bucket=&prefix=` — list every object under a prefix
//!   - `PUT    /objects/{*key}` — upload the request body
//!   - `GET    /objects/{*key}` — download object
//!   - `HEAD   /objects/{*key}` — retrieve metadata only
//!   - `DELETE /objects/{*key}` — delete object
//!   - `GET    /metadata/{*key}` — metadata as JSON
//!   - `POST   /copy` — server-side copy
//!
//! - **Transfers** (local paths are relative to the transfer directory)
//!   - `POST /uploads/file`, `POST /uploads/data`
//!   - `POST /downloads/file`, `POST /downloads/prefix`
//!
//! - **Queues**
//!   - `POST|GET|DELETE /queues/{queue}/messages` — send, receive, delete
//!   - `POST            /queues/{queue}/messages/batch` — batch send
//!   - `POST|GET|DELETE /queues/{queue}/large-messages` — same, with payload offloading
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.
//!
//! Object uploads, `/uploads/data` and the large-message routes accept
//! bodies up to the configured limit instead of axum's 2 MiB default.

use crate::{
    AppState,
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            copy_object, delete_object, get_object, head_object, list_buckets, list_objects,
            object_metadata, upload_object,
        },
        queue_handlers::{
            delete_large_messages, delete_messages, receive_large_messages, receive_messages,
            send_batch, send_large_message, send_message,
        },
        transfer_handlers::{download_file, download_prefix, upload_data, upload_file},
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

/// Build and return the gateway router.
///
/// The router carries `AppState`; handlers pull the service they need out
/// of it with `State<StorageService>` or `State<QueueService>`.
/// `max_body_bytes` caps request bodies on the payload-carrying routes.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    let payload_limit = DefaultBodyLimit::max(max_body_bytes);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Object store
        .route("/buckets", get(list_buckets))
        .route("/objects", get(list_objects))
        .route(
            "/objects/{*key}",
            put(upload_object)
                .layer(payload_limit)
                .get(get_object)
                .head(head_object)
                .delete(delete_object),
        )
        .route("/metadata/{*key}", get(object_metadata))
        .route("/copy", post(copy_object))
        // Transfers
        .route("/uploads/file", post(upload_file))
        .route("/uploads/data", post(upload_data).layer(payload_limit))
        .route("/downloads/file", post(download_file))
        .route("/downloads/prefix", post(download_prefix))
        // Queues
        .route(
            "/queues/{queue}/messages",
            post(send_message)
                .get(receive_messages)
                .delete(delete_messages),
        )
        .route("/queues/{queue}/messages/batch", post(send_batch))
        .route(
            "/queues/{queue}/large-messages",
            post(send_large_message)
                .layer(payload_limit)
                .get(receive_large_messages)
                .delete(delete_large_messages),
        )
}
