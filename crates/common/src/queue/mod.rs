//! Extraction job queue
//!
//! Provides:
//! - The `ExtractJob` message published by the gateway
//! - `JobQueue` (producer side) and `JobSource` (consumer side) seams
//! - SQS implementation with retry on send and visibility-based redelivery
//! - Bounded in-memory channel implementation with an overflow policy
//!
//! Delivery is at-least-once. A job may be seen more than once and handlers
//! must tolerate that.

mod memory;
mod sqs;

pub use memory::MemoryQueue;
pub use sqs::SqsQueue;

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Longest delay between two deliveries of the same job
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

/// Extraction job message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractJob {
    pub document_id: Uuid,
    pub object_key: String,
    pub file_name: String,
}

impl ExtractJob {
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| AppError::QueueError {
            message: format!("Failed to serialize message: {}", e),
        })
    }

    pub fn decode(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| AppError::QueueError {
            message: format!("Failed to parse message: {}", e),
        })
    }
}

/// A received message, decoded or not
#[derive(Debug, Clone)]
pub struct Delivery {
    /// `None` when the payload could not be decoded
    pub job: Option<ExtractJob>,
    /// 1-based delivery count
    pub attempt: u32,
    /// Backend handle used for ack and retry
    pub receipt: String,
    /// Raw body, kept for logging undecodable payloads
    pub body: String,
}

/// Producer side of the queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &ExtractJob) -> Result<()>;
}

/// Consumer side of the queue
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Wait for the next batch of deliveries; may return empty on poll timeout
    async fn receive(&self) -> Result<Vec<Delivery>>;

    /// Remove a delivery permanently
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Make the delivery visible again after `delay`
    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<()>;
}

/// Exponential redelivery delay for a failed attempt, capped at five minutes
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(MAX_RETRY_DELAY)
}
