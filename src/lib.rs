//! HTTP gateway over a managed object store and message queue.
//!
//! Requests are mapped one-to-one onto SDK calls; the gateway adds the
//! listing loop over continuation tokens and the large-message path that
//! offloads oversized queue payloads to the object store.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

use axum::extract::FromRef;
use services::{queue_service::QueueService, storage_service::StorageService};

/// State shared by every handler. Handlers extract the service they need
/// via `State<StorageService>` or `State<QueueService>`.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub storage: StorageService,
    pub queues: QueueService,
}
