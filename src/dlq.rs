//! DLQ triage: decides, for each message sitting in the dead-letter queue,
//! whether it is worth replaying onto the primary queue or should be
//! archived to cold storage and left alone.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::broker::{Broker, BrokerError, Message};
use crate::enrichment::artifacts::dlq_archive_key;
use crate::error::ErrorCategory;
use crate::object_store::ObjectStore;
use crate::ProcessingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriageVerdict {
    /// Young enough / under the retry cap / classified recoverable: put it
    /// back on the primary queue with its retry count bumped.
    Replay,
    /// Exhausted retries, classified unrecoverable, or too young to judge
    /// yet (left alone for the next pass).
    Archive,
    Skip,
}

pub struct DlqTriagePolicy {
    pub min_age: chrono::Duration,
    pub max_retries: u32,
}

impl DlqTriagePolicy {
    pub fn classify(&self, message: &Message, now: DateTime<Utc>) -> TriageVerdict {
        let failed_at = message
            .attributes
            .get("FailedAt")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        if let Some(failed_at) = failed_at {
            if now - failed_at < self.min_age {
                return TriageVerdict::Skip;
            }
        }

        let retry_count: u32 = message
            .attributes
            .get("RetryCount")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if retry_count >= self.max_retries {
            return TriageVerdict::Archive;
        }

        let error_message = message.attributes.get("ErrorMessage").map(String::as_str).unwrap_or("");
        match ProcessingError::classify_message(error_message) {
            ErrorCategory::Recoverable | ErrorCategory::Unknown => TriageVerdict::Replay,
            ErrorCategory::Unrecoverable => TriageVerdict::Archive,
        }
    }
}

pub struct DlqTriage {
    broker: std::sync::Arc<dyn Broker>,
    object_store: std::sync::Arc<dyn ObjectStore>,
    dlq_archive_bucket: String,
    policy: DlqTriagePolicy,
}

#[derive(Debug, Default, Clone)]
pub struct TriageSummary {
    pub replayed: u32,
    pub archived: u32,
    pub skipped: u32,
}

impl DlqTriage {
    pub fn new(
        broker: std::sync::Arc<dyn Broker>,
        object_store: std::sync::Arc<dyn ObjectStore>,
        dlq_archive_bucket: String,
        policy: DlqTriagePolicy,
    ) -> Self {
        Self {
            broker,
            object_store,
            dlq_archive_bucket,
            policy,
        }
    }

    /// Drain up to `max_messages` from the DLQ, classify each, and either
    /// replay it onto the primary queue or archive it to object storage.
    /// Set `dry_run` to only report what would happen.
    pub async fn run(&self, max_messages: u32, dry_run: bool) -> Result<TriageSummary, BrokerError> {
        let mut summary = TriageSummary::default();
        let now = Utc::now();

        let batch = self.broker.receive_batch(max_messages, 1, 30).await?;
        let mut handled_receipts = Vec::new();

        for message in batch {
            match self.policy.classify(&message, now) {
                TriageVerdict::Skip => {
                    summary.skipped += 1;
                    continue;
                }
                TriageVerdict::Replay => {
                    summary.replayed += 1;
                    info!(message_id = %message.message_id, verdict = "replay", dry_run, "DLQ triage verdict");
                    if !dry_run {
                        let retry_count: u32 = message
                            .attributes
                            .get("RetryCount")
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(0);
                        let mut attributes = message.attributes.clone();
                        attributes.insert("RetryCount".to_string(), (retry_count + 1).to_string());
                        attributes.insert("ReprocessedAt".to_string(), now.to_rfc3339());
                        self.broker.requeue(&message.body, attributes).await?;
                        handled_receipts.push(message.receipt_handle.clone());
                    }
                }
                TriageVerdict::Archive => {
                    summary.archived += 1;
                    info!(message_id = %message.message_id, verdict = "archive", dry_run, "DLQ triage verdict");
                    if !dry_run {
                        let key = dlq_archive_key(&message.message_id, now);
                        let body = serde_json::json!({
                            "messageId": message.message_id,
                            "body": message.body,
                            "attributes": message.attributes,
                            "archivedAt": now.to_rfc3339(),
                        });
                        if self
                            .object_store
                            .upload_bytes(
                                &self.dlq_archive_bucket,
                                &key,
                                serde_json::to_vec_pretty(&body).unwrap_or_default(),
                                "application/json",
                            )
                            .await
                            .is_ok()
                        {
                            handled_receipts.push(message.receipt_handle.clone());
                        }
                    }
                }
            }
        }

        if !dry_run && !handled_receipts.is_empty() {
            self.broker.delete_batch(&handled_receipts).await?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn message_with(attrs: &[(&str, &str)]) -> Message {
        let mut attributes = HashMap::new();
        for (k, v) in attrs {
            attributes.insert(k.to_string(), v.to_string());
        }
        Message {
            message_id: "m-1".to_string(),
            receipt_handle: "r-1".to_string(),
            body: "{}".to_string(),
            attributes,
            received_at: Utc::now(),
        }
    }

    fn policy() -> DlqTriagePolicy {
        DlqTriagePolicy {
            min_age: chrono::Duration::seconds(300),
            max_retries: 3,
        }
    }

    #[test]
    fn too_young_messages_are_skipped() {
        let now = Utc::now();
        let message = message_with(&[("FailedAt", &now.to_rfc3339())]);
        assert_eq!(policy().classify(&message, now), TriageVerdict::Skip);
    }

    #[test]
    fn exhausted_retries_archive_regardless_of_error_kind() {
        let now = Utc::now();
        let failed_at = now - chrono::Duration::seconds(600);
        let message = message_with(&[
            ("FailedAt", &failed_at.to_rfc3339()),
            ("RetryCount", "3"),
            ("ErrorMessage", "Timeout: connection refused"),
        ]);
        assert_eq!(policy().classify(&message, now), TriageVerdict::Archive);
    }

    #[test]
    fn recoverable_error_under_retry_cap_replays() {
        let now = Utc::now();
        let failed_at = now - chrono::Duration::seconds(600);
        let message = message_with(&[
            ("FailedAt", &failed_at.to_rfc3339()),
            ("RetryCount", "1"),
            ("ErrorMessage", "OpenSearch connection timed out"),
        ]);
        assert_eq!(policy().classify(&message, now), TriageVerdict::Replay);
    }

    #[test]
    fn unrecoverable_error_archives() {
        let now = Utc::now();
        let failed_at = now - chrono::Duration::seconds(600);
        let message = message_with(&[
            ("FailedAt", &failed_at.to_rfc3339()),
            ("RetryCount", "0"),
            ("ErrorMessage", "UnsupportedFormat: .dwg"),
        ]);
        assert_eq!(policy().classify(&message, now), TriageVerdict::Archive);
    }
}
