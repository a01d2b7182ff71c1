//! Bounded in-memory job queue
//!
//! A fixed-capacity channel shared by the gateway and an embedded worker
//! pool. Enqueue never blocks: a full channel fails with `QueueFull` and the
//! caller applies its overflow policy.

use super::{Delivery, ExtractJob, JobQueue, JobSource};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

struct Envelope {
    job: ExtractJob,
    attempt: u32,
}

/// In-process queue backed by a bounded mpsc channel
#[derive(Clone)]
pub struct MemoryQueue {
    tx: mpsc::Sender<Envelope>,
    rx: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    /// Deliveries handed out but not yet acked or retried, keyed by receipt
    pending: Arc<Mutex<std::collections::HashMap<String, Envelope>>>,
    next_receipt: Arc<AtomicU64>,
}

impl MemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            pending: Arc::default(),
            next_receipt: Arc::new(AtomicU64::new(1)),
        }
    }

    fn push(&self, envelope: Envelope) -> Result<()> {
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AppError::QueueError {
                message: "queue closed".to_string(),
            },
        })
    }

    /// Jobs waiting in the channel
    pub fn depth(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &ExtractJob) -> Result<()> {
        self.push(Envelope {
            job: job.clone(),
            attempt: 1,
        })?;
        debug!(document_id = %job.document_id, depth = self.depth(), "Job queued in memory");
        Ok(())
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn receive(&self) -> Result<Vec<Delivery>> {
        let envelope = {
            let mut rx = self.rx.lock().await;
            rx.recv().await
        };

        let Some(envelope) = envelope else {
            return Ok(Vec::new());
        };

        let receipt = self.next_receipt.fetch_add(1, Ordering::Relaxed).to_string();
        let delivery = Delivery {
            job: Some(envelope.job.clone()),
            attempt: envelope.attempt,
            receipt: receipt.clone(),
            body: String::new(),
        };
        self.pending.lock().await.insert(receipt, envelope);

        Ok(vec![delivery])
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.pending.lock().await.remove(&delivery.receipt);
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> Result<()> {
        let Some(envelope) = self.pending.lock().await.remove(&delivery.receipt) else {
            return Ok(());
        };

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let document_id = envelope.job.document_id;
            let next = Envelope {
                job: envelope.job,
                attempt: envelope.attempt + 1,
            };
            if let Err(e) = queue.push(next) {
                warn!(document_id = %document_id, error = %e, "Dropping retried job");
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job() -> ExtractJob {
        let id = Uuid::new_v4();
        ExtractJob {
            document_id: id,
            object_key: format!("uploads/{id}/a.pdf"),
            file_name: "a.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_enqueue_then_receive() {
        let queue = MemoryQueue::new(4);
        let sent = job();
        queue.enqueue(&sent).await.unwrap();
        assert_eq!(queue.depth(), 1);

        let deliveries = queue.receive().await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].job.as_ref(), Some(&sent));
        assert_eq!(deliveries[0].attempt, 1);
        queue.ack(&deliveries[0]).await.unwrap();
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_full_queue_rejects() {
        let queue = MemoryQueue::new(1);
        queue.enqueue(&job()).await.unwrap();

        let err = queue.enqueue(&job()).await.unwrap_err();
        assert!(matches!(err, AppError::QueueFull));
    }

    #[tokio::test]
    async fn test_retry_redelivers_with_next_attempt() {
        let queue = MemoryQueue::new(2);
        let sent = job();
        queue.enqueue(&sent).await.unwrap();

        let first = queue.receive().await.unwrap().remove(0);
        queue.retry(&first, Duration::from_millis(10)).await.unwrap();

        let second = tokio::time::timeout(Duration::from_secs(2), queue.receive())
            .await
            .unwrap()
            .unwrap()
            .remove(0);
        assert_eq!(second.job.as_ref(), Some(&sent));
        assert_eq!(second.attempt, 2);
        assert_ne!(second.receipt, first.receipt);
    }
}
