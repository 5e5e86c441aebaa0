//! In-memory [`Broker`] fake used by worker-runtime tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{truncate_error_message, Broker, BrokerError, Message, QueueDepth};

/// A queue plus its DLQ, both backed by a `VecDeque` behind a mutex.
#[derive(Default)]
pub struct MemoryBroker {
    primary: Mutex<VecDeque<Message>>,
    dlq: Mutex<VecDeque<Message>>,
    in_flight: Mutex<HashMap<String, Message>>,
    next_id: AtomicU64,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_message_id(&self) -> String {
        format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Push a message directly onto the primary queue, for test setup.
    pub async fn push(&self, body: impl Into<String>) {
        let id = self.next_message_id();
        self.primary.lock().await.push_back(Message {
            message_id: id.clone(),
            receipt_handle: id,
            body: body.into(),
            attributes: HashMap::new(),
            received_at: Utc::now(),
        });
    }

    /// Snapshot of everything currently sitting in the DLQ, for assertions.
    pub async fn dlq_contents(&self) -> Vec<Message> {
        self.dlq.lock().await.iter().cloned().collect()
    }

    /// Number of messages remaining in the primary queue.
    pub async fn primary_len(&self) -> usize {
        self.primary.lock().await.len()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn receive_batch(
        &self,
        max: u32,
        _wait_seconds: u32,
        _visibility_timeout: u32,
    ) -> Result<Vec<Message>, BrokerError> {
        let mut primary = self.primary.lock().await;
        let mut in_flight = self.in_flight.lock().await;
        let mut received = Vec::new();
        for _ in 0..max {
            match primary.pop_front() {
                Some(msg) => {
                    in_flight.insert(msg.receipt_handle.clone(), msg.clone());
                    received.push(msg);
                }
                None => break,
            }
        }
        Ok(received)
    }

    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<(), BrokerError> {
        let mut in_flight = self.in_flight.lock().await;
        for handle in receipt_handles {
            in_flight.remove(handle);
        }
        Ok(())
    }

    async fn extend_visibility(&self, _receipt_handle: &str, _seconds: u32) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn send_to_dlq(&self, original: &Message, error_reason: &str) -> Result<(), BrokerError> {
        let mut tagged = original.clone();
        tagged
            .attributes
            .insert("FailedAt".to_string(), Utc::now().to_rfc3339());
        tagged
            .attributes
            .insert("OriginalMessageId".to_string(), original.message_id.clone());
        tagged
            .attributes
            .insert("ErrorMessage".to_string(), truncate_error_message(error_reason));
        self.dlq.lock().await.push_back(tagged);
        self.in_flight.lock().await.remove(&original.receipt_handle);
        Ok(())
    }

    async fn requeue(
        &self,
        body: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), BrokerError> {
        let id = self.next_message_id();
        self.primary.lock().await.push_back(Message {
            message_id: id.clone(),
            receipt_handle: id,
            body: body.to_string(),
            attributes,
            received_at: Utc::now(),
        });
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, BrokerError> {
        Ok(QueueDepth {
            available: self.primary.lock().await.len() as u64,
            in_flight: self.in_flight.lock().await.len() as u64,
            delayed: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_then_delete_drains_primary_queue() {
        let broker = MemoryBroker::new();
        broker.push("hello").await;
        let received = broker.receive_batch(10, 0, 30).await.unwrap();
        assert_eq!(received.len(), 1);
        broker
            .delete_batch(&[received[0].receipt_handle.clone()])
            .await
            .unwrap();
        assert_eq!(broker.primary_len().await, 0);
    }

    #[tokio::test]
    async fn send_to_dlq_tags_failure_metadata() {
        let broker = MemoryBroker::new();
        broker.push("body").await;
        let received = broker.receive_batch(10, 0, 30).await.unwrap();
        broker.send_to_dlq(&received[0], "boom").await.unwrap();
        let dlq = broker.dlq_contents().await;
        assert_eq!(dlq.len(), 1);
        assert_eq!(dlq[0].attributes.get("ErrorMessage").unwrap(), "boom");
    }
}
