//! QueueService — queue operations exposed by the gateway.
//!
//! Two paths exist for every message operation: the plain one, a direct
//! call-through to the `QueueClient`, and the large-message one which runs
//! bodies through the `PayloadOffloader` first.

use crate::{
    models::message::{
        BatchEntry, BatchFailure, BatchSendOutcome, OutgoingMessage, ReceivedMessage, SentMessage,
    },
    services::{
        error::{ServiceError, ServiceResult},
        payload_offload::PayloadOffloader,
        queue_client::QueueClient,
    },
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Most entries the queue accepts in one batch request.
pub const MAX_BATCH_ENTRIES: usize = 10;
/// Most messages the queue hands out per receive call.
pub const MAX_RECEIVE_MESSAGES: i32 = 10;
/// Longest long-poll the queue allows, in seconds.
pub const MAX_WAIT_SECONDS: i32 = 20;

const FIFO_SUFFIX: &str = ".fifo";

#[derive(Clone)]
pub struct QueueService {
    client: Arc<dyn QueueClient>,
    offloader: PayloadOffloader,
}

impl QueueService {
    pub fn new(client: Arc<dyn QueueClient>, offloader: PayloadOffloader) -> Self {
        Self { client, offloader }
    }

    async fn resolve(&self, queue_name: &str) -> ServiceResult<String> {
        if queue_name.trim().is_empty() {
            return Err(ServiceError::invalid("queue name must not be empty"));
        }
        self.client.queue_url(queue_name).await
    }

    /// Send through the plain path only; oversized bodies are left for the
    /// queue to reject.
    pub async fn send_message(
        &self,
        queue_name: &str,
        body: String,
        group_id: Option<String>,
    ) -> ServiceResult<SentMessage> {
        let queue_url = self.resolve(queue_name).await?;
        let message = OutgoingMessage::new(body).with_group_id(resolve_group_id(queue_name, group_id));
        let message_id = self.client.send_message(&queue_url, message).await?;
        info!("Message Sent Success: {}", message_id);
        Ok(SentMessage {
            message_id,
            offloaded: false,
        })
    }

    /// Send, offloading the body to the object store when it exceeds the
    /// payload threshold.
    pub async fn send_large_message(
        &self,
        queue_name: &str,
        body: String,
        group_id: Option<String>,
    ) -> ServiceResult<SentMessage> {
        let queue_url = self.resolve(queue_name).await?;
        let message = OutgoingMessage::new(body).with_group_id(resolve_group_id(queue_name, group_id));
        let (message, offloaded) = self.offloader.offload(message).await?;
        let message_id = self.client.send_message(&queue_url, message).await?;
        info!(offloaded, "Message Sent Success: {}", message_id);
        Ok(SentMessage {
            message_id,
            offloaded,
        })
    }

    /// Send `bodies` in batches of at most ten; each entry gets a random id.
    ///
    /// A request that fails as a whole marks its entries as failed and the
    /// remaining chunks are still sent, so the outcome always accounts for
    /// every entry.
    pub async fn send_batch(
        &self,
        queue_name: &str,
        bodies: Vec<String>,
        group_id: Option<String>,
    ) -> ServiceResult<BatchSendOutcome> {
        if bodies.is_empty() {
            return Err(ServiceError::invalid("batch must contain at least one message"));
        }
        let queue_url = self.resolve(queue_name).await?;
        let group_id = resolve_group_id(queue_name, group_id);
        info!("Sending {} messages in batches", bodies.len());

        let entries: Vec<BatchEntry> = bodies
            .into_iter()
            .map(|body| BatchEntry {
                id: Uuid::new_v4().to_string(),
                message: OutgoingMessage::new(body).with_group_id(group_id.clone()),
            })
            .collect();

        let mut outcome = BatchSendOutcome::default();
        for chunk in entries.chunks(MAX_BATCH_ENTRIES) {
            match self
                .client
                .send_message_batch(&queue_url, chunk.to_vec())
                .await
            {
                Ok(result) => outcome.merge(result),
                Err(err) => {
                    warn!(entries = chunk.len(), error = %err, "batch request failed");
                    outcome.failed.extend(chunk.iter().map(|entry| BatchFailure {
                        id: entry.id.clone(),
                        code: err.code().to_string(),
                        message: Some(err.to_string()),
                        sender_fault: err.is_sender_fault(),
                    }));
                }
            }
        }
        info!(
            successful = outcome.successful.len(),
            failed = outcome.failed.len(),
            "batch send finished"
        );
        Ok(outcome)
    }

    /// `wait_seconds` long-polls for up to 20 seconds; `None` uses the
    /// queue's configured default.
    pub async fn receive_messages(
        &self,
        queue_name: &str,
        max_messages: i32,
        wait_seconds: Option<i32>,
    ) -> ServiceResult<Vec<ReceivedMessage>> {
        let queue_url = self.resolve(queue_name).await?;
        self.client
            .receive_messages(&queue_url, clamp_receive(max_messages), clamp_wait(wait_seconds))
            .await
    }

    /// Receive and resolve offloaded payloads. Receipt handles of resolved
    /// messages embed the payload location for `delete_large_messages`.
    ///
    /// A message whose payload is missing or whose pointer is malformed is
    /// left out of the result and stays on the queue; the others are still
    /// returned.
    pub async fn receive_large_messages(
        &self,
        queue_name: &str,
        max_messages: i32,
        wait_seconds: Option<i32>,
    ) -> ServiceResult<Vec<ReceivedMessage>> {
        let queue_url = self.resolve(queue_name).await?;
        let received = self
            .client
            .receive_messages(&queue_url, clamp_receive(max_messages), clamp_wait(wait_seconds))
            .await?;

        let mut messages = Vec::with_capacity(received.len());
        for message in received {
            let message_id = message.message_id.clone();
            match self.offloader.restore(message).await {
                Ok(restored) => messages.push(restored),
                Err(
                    err @ (ServiceError::ObjectNotFound { .. }
                    | ServiceError::BucketNotFound(_)
                    | ServiceError::InvalidRequest(_)),
                ) => {
                    warn!(%message_id, error = %err, "skipping message with unresolvable payload");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(messages)
    }

    /// Delete each receipt handle in turn; returns how many were deleted.
    pub async fn delete_messages(
        &self,
        queue_name: &str,
        receipt_handles: &[String],
    ) -> ServiceResult<usize> {
        let queue_url = self.resolve(queue_name).await?;
        for handle in receipt_handles {
            self.client.delete_message(&queue_url, handle).await?;
        }
        info!("Deleted {} messages from {}", receipt_handles.len(), queue_name);
        Ok(receipt_handles.len())
    }

    /// Delete messages and the offloaded payloads their handles point to.
    pub async fn delete_large_messages(
        &self,
        queue_name: &str,
        receipt_handles: &[String],
    ) -> ServiceResult<usize> {
        let queue_url = self.resolve(queue_name).await?;
        for handle in receipt_handles {
            let original = self.offloader.release(handle).await?;
            self.client.delete_message(&queue_url, &original).await?;
        }
        info!("Deleted {} messages from {}", receipt_handles.len(), queue_name);
        Ok(receipt_handles.len())
    }

    /// Readiness: the queue service answers.
    pub async fn check_ready(&self) -> ServiceResult<()> {
        self.client.ping().await
    }
}

/// Use the caller's group id; FIFO queues get a random one when none is given.
fn resolve_group_id(queue_name: &str, group_id: Option<String>) -> Option<String> {
    match group_id {
        Some(id) if !id.is_empty() => Some(id),
        _ if queue_name.ends_with(FIFO_SUFFIX) => Some(Uuid::new_v4().to_string()),
        _ => None,
    }
}

fn clamp_receive(max_messages: i32) -> i32 {
    max_messages.clamp(1, MAX_RECEIVE_MESSAGES)
}

fn clamp_wait(wait_seconds: Option<i32>) -> Option<i32> {
    wait_seconds.map(|secs| secs.clamp(0, MAX_WAIT_SECONDS))
}
