//! Work-item broker: the queue abstraction the worker runtime drains.
//!
//! One production backend (`SqsBroker`) and one in-memory test double
//! (`MemoryBroker`) implement the same trait, mirroring the pluggable
//! backend seam the reference crate uses for OCR.

mod memory;
mod sqs;

pub use memory::MemoryBroker;
pub use sqs::SqsBroker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker connection error: {0}")]
    Connection(String),
    #[error("broker request throttled: {0}")]
    Throttled(String),
    #[error("message delete failed for {failed_ids:?}")]
    DeleteFailed { failed_ids: Vec<String> },
}

/// A message received from the broker, not yet acted upon.
#[derive(Debug, Clone)]
pub struct Message {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub attributes: std::collections::HashMap<String, String>,
    pub received_at: DateTime<Utc>,
}

/// Snapshot of queue depth, best-effort (not all brokers report all three).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueDepth {
    pub available: u64,
    pub in_flight: u64,
    pub delayed: u64,
}

/// Abstracts the message queue for the worker runtime and DLQ triage.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Long-poll the primary queue for up to `max` messages.
    async fn receive_batch(
        &self,
        max: u32,
        wait_seconds: u32,
        visibility_timeout: u32,
    ) -> Result<Vec<Message>, BrokerError>;

    /// Delete up to 10 messages per broker call; chunks larger batches
    /// internally and falls back to per-message deletes if a chunk fails.
    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<(), BrokerError>;

    /// Extend the visibility timeout of an in-flight message.
    async fn extend_visibility(&self, receipt_handle: &str, seconds: u32) -> Result<(), BrokerError>;

    /// Route a failed message to the DLQ, tagging it with failure metadata.
    async fn send_to_dlq(&self, original: &Message, error_reason: &str) -> Result<(), BrokerError>;

    /// Publish a new message body (with attributes) to the primary queue.
    async fn requeue(
        &self,
        body: &str,
        attributes: std::collections::HashMap<String, String>,
    ) -> Result<(), BrokerError>;

    /// Best-effort queue depth, for the health monitor.
    async fn depth(&self) -> Result<QueueDepth, BrokerError>;
}

/// DLQ message attribute truncated to 256 chars, matching the broker's
/// batched send-to-DLQ contract.
pub fn truncate_error_message(message: &str) -> String {
    const LIMIT: usize = 256;
    if message.len() <= LIMIT {
        message.to_string()
    } else {
        // Truncate on a char boundary so multi-byte (e.g. Japanese) text
        // never gets split mid-codepoint.
        let mut end = LIMIT;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message[..end].to_string()
    }
}

/// Derive the DLQ queue URL from the primary queue URL by substituting the
/// trailing `queue` path segment with `dlq`, used when `DLQ_QUEUE_URL` is
/// not explicitly configured. Ported from `worker.py::_get_dlq_url`.
pub fn derive_dlq_url(primary_queue_url: &str) -> String {
    if let Some(idx) = primary_queue_url.rfind("queue") {
        let mut derived = primary_queue_url.to_string();
        derived.replace_range(idx..idx + "queue".len(), "dlq");
        derived
    } else {
        format!("{primary_queue_url}-dlq")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_error_message_leaves_short_messages_alone() {
        assert_eq!(truncate_error_message("short"), "short");
    }

    #[test]
    fn truncate_error_message_caps_at_256_bytes() {
        let long = "x".repeat(500);
        assert_eq!(truncate_error_message(&long).len(), 256);
    }

    #[test]
    fn derive_dlq_url_substitutes_queue_segment() {
        assert_eq!(
            derive_dlq_url("https://sqs.ap-northeast-1.amazonaws.com/123/ingest-queue"),
            "https://sqs.ap-northeast-1.amazonaws.com/123/ingest-dlq"
        );
    }

    #[test]
    fn derive_dlq_url_falls_back_when_no_queue_segment() {
        assert_eq!(derive_dlq_url("https://example/whatever"), "https://example/whatever-dlq");
    }
}
