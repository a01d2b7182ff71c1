//! Worker pool runtime
//!
//! A fixed number of units, each pulling one delivery at a time from the
//! job source and handing it to the registered handler. The outcome decides
//! what happens to the delivery: ack on success, delayed redelivery while
//! attempts remain, abandonment once the budget is spent.

use crate::processor::{HandleOutcome, JobHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use vaultdrop_common::config::AppConfig;
use vaultdrop_common::metrics::{self, JobOutcome};
use vaultdrop_common::queue::{retry_delay, Delivery};
use vaultdrop_common::JobSource;

/// Pause after a failed receive before polling again
const RECEIVE_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base: Duration,
    /// How long in-flight jobs may run after shutdown is requested
    pub grace: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            concurrency: config.worker.concurrency.max(1),
            max_attempts: config.queue.max_attempts.max(1),
            retry_base: Duration::from_secs(config.queue.retry_delay_secs),
            grace: config.shutdown_timeout(),
        }
    }
}

pub struct WorkerPool {
    source: Arc<dyn JobSource>,
    handler: Arc<dyn JobHandler>,
    settings: PoolSettings,
}

impl WorkerPool {
    pub fn new(source: Arc<dyn JobSource>, handler: Arc<dyn JobHandler>, settings: PoolSettings) -> Self {
        Self {
            source,
            handler,
            settings,
        }
    }

    /// Run until `shutdown` flips to true, then drain within the grace period
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut units = JoinSet::new();
        for unit in 0..self.settings.concurrency {
            units.spawn(unit_loop(
                unit,
                self.source.clone(),
                self.handler.clone(),
                self.settings.clone(),
                shutdown.clone(),
            ));
        }

        info!(concurrency = self.settings.concurrency, "Worker pool started");

        let mut signal = shutdown;
        let _ = signal.wait_for(|stop| *stop).await;
        info!(grace_secs = self.settings.grace.as_secs(), "Worker pool draining");

        let drained = tokio::time::timeout(self.settings.grace, async {
            while units.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!("Grace period elapsed, aborting in-flight jobs");
            units.abort_all();
            while units.join_next().await.is_some() {}
        }

        info!("Worker pool stopped");
    }
}

async fn unit_loop(
    unit: usize,
    source: Arc<dyn JobSource>,
    handler: Arc<dyn JobHandler>,
    settings: PoolSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = source.receive() => received,
        };

        match received {
            Ok(deliveries) => {
                for delivery in deliveries {
                    settle(source.as_ref(), handler.as_ref(), &settings, delivery).await;
                }
            }
            Err(e) => {
                error!(unit, error = %e, "Failed to receive from queue");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                }
            }
        }
    }
}

/// Run the handler for one delivery and ack, retry or abandon it
pub(crate) async fn settle(
    source: &dyn JobSource,
    handler: &dyn JobHandler,
    settings: &PoolSettings,
    delivery: Delivery,
) {
    let Some(job) = delivery.job.as_ref() else {
        error!(body = %delivery.body, "Undecodable job payload, abandoning");
        metrics::record_job(JobOutcome::Abandoned);
        ack(source, &delivery).await;
        return;
    };

    match handler.handle(job).await {
        Ok(HandleOutcome::Completed) => {
            metrics::record_job(JobOutcome::Completed);
            ack(source, &delivery).await;
        }
        Ok(HandleOutcome::AlreadyCompleted) => {
            metrics::record_job(JobOutcome::Skipped);
            ack(source, &delivery).await;
        }
        Err(e) if e.is_permanent() || delivery.attempt >= settings.max_attempts => {
            error!(
                document_id = %job.document_id,
                attempt = delivery.attempt,
                max_attempts = settings.max_attempts,
                error = %e,
                "Abandoning extraction job"
            );
            metrics::record_job(JobOutcome::Abandoned);
            ack(source, &delivery).await;
        }
        Err(e) => {
            let delay = retry_delay(settings.retry_base, delivery.attempt);
            warn!(
                document_id = %job.document_id,
                attempt = delivery.attempt,
                delay_secs = delay.as_secs(),
                error = %e,
                "Extraction failed, scheduling retry"
            );
            metrics::record_job(JobOutcome::Retried);
            if let Err(e) = source.retry(&delivery, delay).await {
                error!(document_id = %job.document_id, error = %e, "Failed to schedule retry");
            }
        }
    }
}

async fn ack(source: &dyn JobSource, delivery: &Delivery) {
    if let Err(e) = source.ack(delivery).await {
        error!(error = %e, "Failed to ack delivery");
    }
}
