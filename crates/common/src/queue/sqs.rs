//! SQS-backed job queue

use super::{Delivery, ExtractJob, JobQueue, JobSource};
use crate::config::QueueConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client as SqsClient;
use backoff::{future::retry, ExponentialBackoff};
use std::time::Duration;
use tracing::{debug, warn};

/// SQS caps visibility timeouts at 12 hours
const MAX_VISIBILITY_SECS: u64 = 43_200;

/// SQS queue client wrapper
pub struct SqsQueue {
    client: SqsClient,
    url: String,
    visibility_timeout: i32,
    wait_time_seconds: i32,
}

impl SqsQueue {
    /// Create a new queue client from configuration
    pub async fn new(config: &QueueConfig) -> Result<Self> {
        let url = config
            .extraction_queue_url
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "queue.extraction_queue_url is not set".to_string(),
            })?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;
        let client = SqsClient::new(&aws_config);

        Ok(Self::with_client(client, url, config))
    }

    /// Create with existing SQS client
    pub fn with_client(client: SqsClient, url: String, config: &QueueConfig) -> Self {
        Self {
            client,
            url,
            visibility_timeout: config.visibility_timeout_secs.min(MAX_VISIBILITY_SECS) as i32,
            wait_time_seconds: config.poll_timeout_secs.min(20) as i32,
        }
    }

    fn to_delivery(message: aws_sdk_sqs::types::Message) -> Option<Delivery> {
        let receipt = message.receipt_handle?;
        let body = message.body.unwrap_or_default();
        let attempt = message
            .attributes
            .as_ref()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse::<u32>().ok())
            .unwrap_or(1);

        Some(Delivery {
            job: ExtractJob::decode(&body).ok(),
            attempt,
            receipt,
            body,
        })
    }
}

#[async_trait]
impl JobQueue for SqsQueue {
    async fn enqueue(&self, job: &ExtractJob) -> Result<()> {
        let body = job.encode()?;

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        let (client, url, body) = (&self.client, &self.url, &body);
        let result = retry(backoff, || async move {
            client
                .send_message()
                .queue_url(url)
                .message_body(body)
                .send()
                .await
                .map_err(|e| {
                    warn!(error = %e, "SQS send failed, retrying");
                    backoff::Error::transient(e)
                })
        })
        .await
        .map_err(|e| AppError::QueueError {
            message: format!("Failed to send message: {}", e),
        })?;

        let message_id = result.message_id.unwrap_or_default();
        debug!(message_id = %message_id, document_id = %job.document_id, "Job sent to queue");

        Ok(())
    }
}

#[async_trait]
impl JobSource for SqsQueue {
    async fn receive(&self) -> Result<Vec<Delivery>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(1)
            .visibility_timeout(self.visibility_timeout)
            .wait_time_seconds(self.wait_time_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let deliveries: Vec<Delivery> = result
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(Self::to_delivery)
            .collect();

        debug!(count = deliveries.len(), "Received messages from queue");
        Ok(deliveries)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(&delivery.receipt)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<()> {
        let seconds = delay.as_secs().min(MAX_VISIBILITY_SECS) as i32;

        self.client
            .change_message_visibility()
            .queue_url(&self.url)
            .receipt_handle(&delivery.receipt)
            .visibility_timeout(seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to change visibility: {}", e),
            })?;

        debug!(delay_seconds = seconds, attempt = delivery.attempt, "Message scheduled for redelivery");
        Ok(())
    }
}
