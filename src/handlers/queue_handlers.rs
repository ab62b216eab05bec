//! HTTP handlers for queue operations.
//!
//! `/queues/{queue}/messages` is the plain path; `/queues/{queue}/large-messages`
//! routes bodies above the payload threshold through the object store.

use crate::{
    errors::AppError,
    models::message::{BatchSendOutcome, ReceivedMessage, SentMessage},
    services::queue_service::QueueService,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

const DEFAULT_RECEIVE_MAX: i32 = 10;

#[derive(Debug, Deserialize)]
pub struct SendMessageReq {
    pub body: String,
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendBatchReq {
    pub messages: Vec<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    pub max: Option<i32>,
    /// Long-poll duration in seconds (0..=20).
    pub wait: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessagesReq {
    pub receipt_handles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReceiveResponse {
    pub messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: usize,
}

/// POST `/queues/{queue}/messages`
pub async fn send_message(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Json(req): Json<SendMessageReq>,
) -> Result<Json<SentMessage>, AppError> {
    let sent = service.send_message(&queue, req.body, req.group_id).await?;
    Ok(Json(sent))
}

/// POST `/queues/{queue}/large-messages`
pub async fn send_large_message(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Json(req): Json<SendMessageReq>,
) -> Result<Json<SentMessage>, AppError> {
    let sent = service
        .send_large_message(&queue, req.body, req.group_id)
        .await?;
    Ok(Json(sent))
}

/// POST `/queues/{queue}/messages/batch`
pub async fn send_batch(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Json(req): Json<SendBatchReq>,
) -> Result<Json<BatchSendOutcome>, AppError> {
    let outcome = service.send_batch(&queue, req.messages, req.group_id).await?;
    Ok(Json(outcome))
}

/// GET `/queues/{queue}/messages?max=&wait=`
pub async fn receive_messages(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Query(q): Query<ReceiveQuery>,
) -> Result<Json<ReceiveResponse>, AppError> {
    let messages = service
        .receive_messages(&queue, q.max.unwrap_or(DEFAULT_RECEIVE_MAX), q.wait)
        .await?;
    Ok(Json(ReceiveResponse { messages }))
}

/// GET `/queues/{queue}/large-messages?max=&wait=`
pub async fn receive_large_messages(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Query(q): Query<ReceiveQuery>,
) -> Result<Json<ReceiveResponse>, AppError> {
    let messages = service
        .receive_large_messages(&queue, q.max.unwrap_or(DEFAULT_RECEIVE_MAX), q.wait)
        .await?;
    Ok(Json(ReceiveResponse { messages }))
}

/// DELETE `/queues/{queue}/messages`
pub async fn delete_messages(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Json(req): Json<DeleteMessagesReq>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = service
        .delete_messages(&queue, &req.receipt_handles)
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// DELETE `/queues/{queue}/large-messages`
pub async fn delete_large_messages(
    State(service): State<QueueService>,
    Path(queue): Path<String>,
    Json(req): Json<DeleteMessagesReq>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = service
        .delete_large_messages(&queue, &req.receipt_handles)
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}
