//! Metrics and observability utilities
//!
//! Prometheus metrics for the intake path and the extraction pipeline,
//! all sharing the `vaultdrop` prefix.

use crate::config::ObservabilityConfig;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Metrics prefix for all VaultDrop metrics
pub const METRICS_PREFIX: &str = "vaultdrop";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for extraction latency (large PDFs are slow)
pub const EXTRACTION_BUCKETS: &[f64] = &[
    0.050,  // 50ms
    0.250,  // 250ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
];

/// Outcome of a single upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted,
    Rejected,
    Failed,
}

impl UploadOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            UploadOutcome::Accepted => "accepted",
            UploadOutcome::Rejected => "rejected",
            UploadOutcome::Failed => "failed",
        }
    }
}

/// Outcome of a single job delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Already completed by an earlier delivery
    Skipped,
    Retried,
    Abandoned,
}

impl JobOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Completed => "completed",
            JobOutcome::Skipped => "skipped",
            JobOutcome::Retried => "retried",
            JobOutcome::Abandoned => "abandoned",
        }
    }
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Intake metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Upload requests by outcome"
    );

    describe_histogram!(
        format!("{}_upload_bytes", METRICS_PREFIX),
        Unit::Bytes,
        "Size of accepted uploads"
    );

    // Extraction metrics
    describe_histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "PDF text extraction latency in seconds"
    );

    describe_counter!(
        format!("{}_jobs_total", METRICS_PREFIX),
        Unit::Count,
        "Extraction job deliveries by outcome"
    );

    describe_counter!(
        format!("{}_job_retries_total", METRICS_PREFIX),
        Unit::Count,
        "Extraction jobs scheduled for redelivery"
    );

    describe_counter!(
        format!("{}_jobs_abandoned_total", METRICS_PREFIX),
        Unit::Count,
        "Extraction jobs dropped after exhausting retries"
    );

    tracing::info!("Metrics registered");
}

/// Serve Prometheus metrics on `metrics_port`; 0 disables the exporter.
/// Every series carries a `service` label from `service_name`.
pub fn install_exporter(config: &ObservabilityConfig) -> Result<(), BuildError> {
    let port = config.metrics_port;
    if port == 0 {
        tracing::info!("Metrics exporter disabled");
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", config.service_name.clone())
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_extraction_duration_seconds", METRICS_PREFIX)),
            EXTRACTION_BUCKETS,
        )?
        .install()?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record an upload decision
pub fn record_upload(outcome: UploadOutcome, bytes: u64) {
    counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    if outcome == UploadOutcome::Accepted {
        histogram!(format!("{}_upload_bytes", METRICS_PREFIX)).record(bytes as f64);
    }
}

/// Helper to record extraction latency
pub fn record_extraction(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    histogram!(
        format!("{}_extraction_duration_seconds", METRICS_PREFIX),
        "status" => status
    )
    .record(duration_secs);
}

/// Helper to record what happened to a job delivery
pub fn record_job(outcome: JobOutcome) {
    counter!(
        format!("{}_jobs_total", METRICS_PREFIX),
        "outcome" => outcome.as_str()
    )
    .increment(1);

    match outcome {
        JobOutcome::Retried => {
            counter!(format!("{}_job_retries_total", METRICS_PREFIX)).increment(1);
        }
        JobOutcome::Abandoned => {
            counter!(format!("{}_jobs_abandoned_total", METRICS_PREFIX)).increment(1);
        }
        JobOutcome::Completed | JobOutcome::Skipped => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, EXTRACTION_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper is a no-op
        let metrics = RequestMetrics::start("POST", "/documents");
        metrics.finish(202);
        record_upload(UploadOutcome::Accepted, 1024);
        record_upload(UploadOutcome::Rejected, 0);
        record_extraction(0.2, true);
        record_job(JobOutcome::Retried);
        record_job(JobOutcome::Abandoned);
    }

    #[test]
    fn test_exporter_disabled_on_port_zero() {
        let config = ObservabilityConfig {
            metrics_port: 0,
            service_name: "vaultdrop-test".into(),
        };
        assert!(install_exporter(&config).is_ok());
    }
}
