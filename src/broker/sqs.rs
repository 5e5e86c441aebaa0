//! SQS-backed [`Broker`] implementation.

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageAttributeValue, MessageSystemAttributeName};
use chrono::Utc;
use tracing::{error, warn};

use super::{derive_dlq_url, truncate_error_message, Broker, BrokerError, Message, QueueDepth};

pub struct SqsBroker {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    dlq_url: OnceLock<String>,
    configured_dlq_url: Option<String>,
}

impl SqsBroker {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: String, configured_dlq_url: Option<String>) -> Self {
        Self {
            client,
            queue_url,
            dlq_url: OnceLock::new(),
            configured_dlq_url,
        }
    }

    /// Resolve (and cache) the DLQ URL: explicit config wins, else derive
    /// from the primary queue name.
    fn dlq_url(&self) -> &str {
        self.dlq_url.get_or_init(|| {
            self.configured_dlq_url
                .clone()
                .unwrap_or_else(|| derive_dlq_url(&self.queue_url))
        })
    }
}

fn chunks_of_ten(handles: &[String]) -> impl Iterator<Item = &[String]> {
    handles.chunks(10)
}

#[async_trait]
impl Broker for SqsBroker {
    async fn receive_batch(
        &self,
        max: u32,
        wait_seconds: u32,
        visibility_timeout: u32,
    ) -> Result<Vec<Message>, BrokerError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max.min(10) as i32)
            .wait_time_seconds(wait_seconds as i32)
            .visibility_timeout(visibility_timeout as i32)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        let messages = resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let message_id = m.message_id?;
                let receipt_handle = m.receipt_handle?;
                let body = m.body.unwrap_or_default();
                let attributes = m
                    .message_attributes
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|(k, v)| v.string_value.map(|s| (k, s)))
                    .collect();
                Some(Message {
                    message_id,
                    receipt_handle,
                    body,
                    attributes,
                    received_at: Utc::now(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<(), BrokerError> {
        let mut failed = Vec::new();

        for chunk in chunks_of_ten(receipt_handles) {
            let entries: Vec<_> = chunk
                .iter()
                .enumerate()
                .filter_map(|(i, handle)| {
                    aws_sdk_sqs::types::DeleteMessageBatchRequestEntry::builder()
                        .id(i.to_string())
                        .receipt_handle(handle)
                        .build()
                        .ok()
                })
                .collect();

            let result = self
                .client
                .delete_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await;

            match result {
                Ok(resp) => {
                    for failure in resp.failed {
                        warn!(id = %failure.id, "sqs batch delete entry failed, falling back to individual delete");
                        if let Ok(idx) = failure.id.parse::<usize>() {
                            if let Some(handle) = chunk.get(idx) {
                                if self
                                    .client
                                    .delete_message()
                                    .queue_url(&self.queue_url)
                                    .receipt_handle(handle)
                                    .send()
                                    .await
                                    .is_err()
                                {
                                    failed.push(handle.clone());
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "sqs batch delete request failed entirely, falling back to individual deletes");
                    for handle in chunk {
                        if self
                            .client
                            .delete_message()
                            .queue_url(&self.queue_url)
                            .receipt_handle(handle)
                            .send()
                            .await
                            .is_err()
                        {
                            failed.push(handle.clone());
                        }
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            error!(metric = "MessageDeleteFailed", count = failed.len(), "message delete failed");
            Err(BrokerError::DeleteFailed { failed_ids: failed })
        }
    }

    async fn extend_visibility(&self, receipt_handle: &str, seconds: u32) -> Result<(), BrokerError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds as i32)
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn send_to_dlq(&self, original: &Message, error_reason: &str) -> Result<(), BrokerError> {
        let mut attrs: HashMap<String, MessageAttributeValue> = HashMap::new();
        attrs.insert(
            "FailedAt".to_string(),
            MessageAttributeValue::builder()
                .data_type("String")
                .string_value(Utc::now().to_rfc3339())
                .build()
                .map_err(|e| BrokerError::Connection(e.to_string()))?,
        );
        attrs.insert(
            "OriginalMessageId".to_string(),
            MessageAttributeValue::builder()
                .data_type("String")
                .string_value(original.message_id.clone())
                .build()
                .map_err(|e| BrokerError::Connection(e.to_string()))?,
        );
        attrs.insert(
            "ErrorMessage".to_string(),
            MessageAttributeValue::builder()
                .data_type("String")
                .string_value(truncate_error_message(error_reason))
                .build()
                .map_err(|e| BrokerError::Connection(e.to_string()))?,
        );

        self.client
            .send_message()
            .queue_url(self.dlq_url())
            .message_body(&original.body)
            .set_message_attributes(Some(attrs))
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn requeue(
        &self,
        body: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), BrokerError> {
        let attrs: HashMap<String, MessageAttributeValue> = attributes
            .into_iter()
            .filter_map(|(k, v)| {
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(v)
                    .build()
                    .ok()
                    .map(|av| (k, av))
            })
            .collect();

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .set_message_attributes(Some(attrs))
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, BrokerError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(MessageSystemAttributeName::ApproximateNumberOfMessages)
            .attribute_names(MessageSystemAttributeName::ApproximateNumberOfMessagesNotVisible)
            .attribute_names(MessageSystemAttributeName::ApproximateNumberOfMessagesDelayed)
            .send()
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;

        let attrs = resp.attributes.unwrap_or_default();
        let get = |name: &aws_sdk_sqs::types::QueueAttributeName| -> u64 {
            attrs
                .get(name)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };

        Ok(QueueDepth {
            available: get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessages),
            in_flight: get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessagesNotVisible),
            delayed: get(&aws_sdk_sqs::types::QueueAttributeName::ApproximateNumberOfMessagesDelayed),
        })
    }
}
