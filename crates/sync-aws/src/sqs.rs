//! Retry queue backed by SQS.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client;
use chrono::Utc;
use tracing::debug;

use sync_types::RetryEnvelope;
use sync_worker::{RetryQueue, WorkerError};

pub struct SqsRetryQueue {
    client: Client,
    queue_url: String,
}

impl SqsRetryQueue {
    pub fn new(sdk_config: &SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::from_client(Client::new(sdk_config), queue_url)
    }

    pub fn from_client(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

/// Convert a received message into an envelope.
///
/// A message without a receipt handle could never be acknowledged, so it
/// is rejected rather than processed.
fn envelope_from_message(message: Message, visibility: Duration) -> Result<RetryEnvelope, WorkerError> {
    let message_id = message.message_id.unwrap_or_default();
    let receipt_handle = message.receipt_handle.ok_or_else(|| {
        WorkerError::Queue(format!("message {message_id} has no receipt handle"))
    })?;
    let hold = chrono::Duration::from_std(visibility)
        .map_err(|e| WorkerError::Queue(format!("invalid visibility hold: {e}")))?;

    Ok(RetryEnvelope {
        message_id,
        body: message.body.unwrap_or_default(),
        receipt_handle,
        visible_until: Utc::now() + hold,
    })
}

#[async_trait]
impl RetryQueue for SqsRetryQueue {
    async fn receive_one(
        &self,
        visibility: Duration,
    ) -> Result<Option<RetryEnvelope>, WorkerError> {
        let visibility_secs = i32::try_from(visibility.as_secs())
            .map_err(|_| WorkerError::Queue("visibility hold too large".to_string()))?;

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(visibility_secs)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("receive: {}", DisplayErrorContext(&e))))?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let envelope = envelope_from_message(message, visibility)?;
        debug!(message_id = %envelope.message_id, "Received retry envelope");
        Ok(Some(envelope))
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), WorkerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| WorkerError::Queue(format!("delete: {}", DisplayErrorContext(&e))))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sdk_config;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const QUEUE_URL: &str = "https://sqs.us-east-1.amazonaws.com/123456789012/search-sync-dlq";

    fn json_response(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "application/x-amz-json-1.0")
            .set_body_json(body)
    }

    #[tokio::test]
    async fn test_receive_one_with_visibility_hold() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.ReceiveMessage"))
            .and(body_partial_json(json!({
                "QueueUrl": QUEUE_URL,
                "MaxNumberOfMessages": 1,
                "VisibilityTimeout": 10
            })))
            .respond_with(json_response(json!({
                "Messages": [{
                    "MessageId": "m-1",
                    "ReceiptHandle": "r-1",
                    "Body": "{\"Records\":[]}"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let queue = SqsRetryQueue::new(&sdk_config(&server.uri()), QUEUE_URL);
        let envelope = queue
            .receive_one(Duration::from_secs(10))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(envelope.message_id, "m-1");
        assert_eq!(envelope.receipt_handle, "r-1");
        assert_eq!(envelope.body, r#"{"Records":[]}"#);
    }

    #[tokio::test]
    async fn test_receive_one_empty_queue() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.ReceiveMessage"))
            .respond_with(json_response(json!({})))
            .mount(&server)
            .await;

        let queue = SqsRetryQueue::new(&sdk_config(&server.uri()), QUEUE_URL);
        assert!(queue
            .receive_one(Duration::from_secs(10))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_by_receipt_handle() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("x-amz-target", "AmazonSQS.DeleteMessage"))
            .and(body_partial_json(json!({
                "QueueUrl": QUEUE_URL,
                "ReceiptHandle": "r-1"
            })))
            .respond_with(json_response(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let queue = SqsRetryQueue::new(&sdk_config(&server.uri()), QUEUE_URL);
        queue.delete("r-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_failure_is_queue_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .insert_header("content-type", "application/x-amz-json-1.0")
                    .set_body_json(json!({
                        "__type": "com.amazonaws.sqs#ReceiptHandleIsInvalid",
                        "message": "The receipt handle is not valid"
                    })),
            )
            .mount(&server)
            .await;

        let queue = SqsRetryQueue::new(&sdk_config(&server.uri()), QUEUE_URL);
        assert!(matches!(
            queue.delete("bogus").await,
            Err(WorkerError::Queue(_))
        ));
    }

    #[test]
    fn test_envelope_from_message() {
        let message = Message::builder()
            .message_id("m-1")
            .receipt_handle("r-1")
            .body(r#"{"Records":[]}"#)
            .build();

        let before = Utc::now();
        let envelope = envelope_from_message(message, Duration::from_secs(10)).unwrap();

        assert_eq!(envelope.message_id, "m-1");
        assert_eq!(envelope.receipt_handle, "r-1");
        assert_eq!(envelope.body, r#"{"Records":[]}"#);
        assert!(envelope.visible_until >= before + chrono::Duration::seconds(10));
    }

    #[test]
    fn test_message_without_receipt_rejected() {
        let message = Message::builder().message_id("m-1").body("{}").build();
        assert!(matches!(
            envelope_from_message(message, Duration::from_secs(10)),
            Err(WorkerError::Queue(_))
        ));
    }
}
