//! `QueueClient` — the seam between the gateway and the queue SDK.
//!
//! `SqsQueueClient` is a direct call-through to `aws_sdk_sqs::Client`.

use crate::{
    models::message::{
        BatchEntry, BatchFailure, BatchSendOutcome, BatchSuccess, MessageAttribute,
        OutgoingMessage, ReceivedMessage,
    },
    services::error::{ServiceError, ServiceResult, classify_sqs_error, sdk_error_details},
};
use async_trait::async_trait;
use aws_sdk_sqs::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    types::{MessageAttributeValue, SendMessageBatchRequestEntry},
};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Resolve a queue name to its URL.
    async fn queue_url(&self, queue_name: &str) -> ServiceResult<String>;

    /// Send one message and return the id the queue assigned.
    async fn send_message(&self, queue_url: &str, message: OutgoingMessage)
    -> ServiceResult<String>;

    /// Send at most ten entries in a single request.
    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> ServiceResult<BatchSendOutcome>;

    /// Receive up to `max_messages` messages with all their attributes.
    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_time_seconds: Option<i32>,
    ) -> ServiceResult<Vec<ReceivedMessage>>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> ServiceResult<()>;

    /// Cheap call used by the readiness probe.
    async fn ping(&self) -> ServiceResult<()>;
}

#[derive(Clone)]
pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn sqs_error<E, R>(operation: &'static str, queue: &str, err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let (code, message) = sdk_error_details(&err);
    warn!(
        queue,
        sqs_error_code = %code,
        sqs_error_message = %message,
        "SQS {} call failed",
        operation
    );
    classify_sqs_error(operation, queue, code, message)
}

fn to_sdk_attributes(
    attributes: BTreeMap<String, MessageAttribute>,
) -> ServiceResult<Option<HashMap<String, MessageAttributeValue>>> {
    if attributes.is_empty() {
        return Ok(None);
    }
    let mut converted = HashMap::with_capacity(attributes.len());
    for (name, attr) in attributes {
        let value = MessageAttributeValue::builder()
            .data_type(attr.data_type)
            .string_value(attr.string_value)
            .build()
            .map_err(|err| ServiceError::invalid(format!("attribute `{}`: {}", name, err)))?;
        converted.insert(name, value);
    }
    Ok(Some(converted))
}

fn from_sdk_attributes(
    attributes: Option<&HashMap<String, MessageAttributeValue>>,
) -> BTreeMap<String, MessageAttribute> {
    attributes
        .map(|attrs| {
            attrs
                .iter()
                .filter_map(|(name, value)| {
                    value.string_value().map(|s| {
                        (
                            name.clone(),
                            MessageAttribute {
                                data_type: value.data_type().to_string(),
                                string_value: s.to_string(),
                            },
                        )
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn queue_url(&self, queue_name: &str) -> ServiceResult<String> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| sqs_error("GetQueueUrl", queue_name, err))?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::QueueNotFound(queue_name.to_string()))
    }

    async fn send_message(
        &self,
        queue_url: &str,
        message: OutgoingMessage,
    ) -> ServiceResult<String> {
        let OutgoingMessage {
            body,
            group_id,
            attributes,
        } = message;

        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .set_message_group_id(group_id)
            .set_message_attributes(to_sdk_attributes(attributes)?)
            .send()
            .await
            .map_err(|err| sqs_error("SendMessage", queue_url, err))?;

        Ok(output.message_id().unwrap_or_default().to_string())
    }

    async fn send_message_batch(
        &self,
        queue_url: &str,
        entries: Vec<BatchEntry>,
    ) -> ServiceResult<BatchSendOutcome> {
        let mut request_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            let built = SendMessageBatchRequestEntry::builder()
                .id(entry.id)
                .message_body(entry.message.body)
                .set_message_group_id(entry.message.group_id)
                .set_message_attributes(to_sdk_attributes(entry.message.attributes)?)
                .build()
                .map_err(|err| ServiceError::invalid(err.to_string()))?;
            request_entries.push(built);
        }

        let output = self
            .client
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(request_entries))
            .send()
            .await
            .map_err(|err| sqs_error("SendMessageBatch", queue_url, err))?;

        Ok(BatchSendOutcome {
            successful: output
                .successful()
                .iter()
                .map(|entry| BatchSuccess {
                    id: entry.id().to_string(),
                    message_id: entry.message_id().to_string(),
                })
                .collect(),
            failed: output
                .failed()
                .iter()
                .map(|entry| BatchFailure {
                    id: entry.id().to_string(),
                    code: entry.code().to_string(),
                    message: entry.message().map(str::to_string),
                    sender_fault: entry.sender_fault(),
                })
                .collect(),
        })
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        max_messages: i32,
        wait_time_seconds: Option<i32>,
    ) -> ServiceResult<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(max_messages)
            .set_wait_time_seconds(wait_time_seconds)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|err| sqs_error("ReceiveMessage", queue_url, err))?;

        Ok(output
            .messages()
            .iter()
            .map(|message| ReceivedMessage {
                message_id: message.message_id().unwrap_or_default().to_string(),
                receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
                body: message.body().unwrap_or_default().to_string(),
                attributes: from_sdk_attributes(message.message_attributes()),
            })
            .collect())
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> ServiceResult<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|err| sqs_error("DeleteMessage", queue_url, err))?;
        Ok(())
    }

    async fn ping(&self) -> ServiceResult<()> {
        self.client
            .list_queues()
            .max_results(1)
            .send()
            .await
            .map_err(|err| sqs_error("ListQueues", "", err))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attributes_are_omitted() {
        assert!(to_sdk_attributes(BTreeMap::new()).unwrap().is_none());
    }

    #[test]
    fn attributes_round_trip_through_sdk_types() {
        let mut attrs = BTreeMap::new();
        attrs.insert("ExtendedPayloadSize".to_string(), MessageAttribute::number(300_000));

        let sdk = to_sdk_attributes(attrs.clone()).unwrap().unwrap();
        assert_eq!(sdk["ExtendedPayloadSize"].data_type(), "Number");
        assert_eq!(from_sdk_attributes(Some(&sdk)), attrs);
    }
}
