//! Transfer metrics.
//!
//! The adapter reports the byte count of every completed GET and PUT to a
//! [`MetricsSender`].  [`NopSender`] discards them; [`PrometheusSender`]
//! records them through the `metrics` facade, which the binary exports with
//! `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::MetricsError;

// -- Metric name constants ----------------------------------------------------

/// Total bytes served by GET (counter).
pub const GET_BYTES_TOTAL: &str = "f3_get_bytes_total";

/// Total bytes stored by PUT (counter).
pub const PUT_BYTES_TOTAL: &str = "f3_put_bytes_total";

/// Completed transfers (counter). Labels: operation.
pub const TRANSFERS_TOTAL: &str = "f3_transfers_total";

/// Unix time of the most recent transfer (gauge). Labels: operation.
pub const LAST_TRANSFER_TIMESTAMP_SECONDS: &str = "f3_last_transfer_timestamp_seconds";

// -- Sender contract ----------------------------------------------------------

/// Receives byte counts for completed transfers.
pub trait MetricsSender: Send + Sync + 'static {
    /// Report a completed GET of `bytes` bytes that started at `timestamp`.
    fn send_get(&self, bytes: u64, timestamp: SystemTime) -> Result<(), MetricsError>;

    /// Report a completed PUT of `bytes` bytes that started at `timestamp`.
    fn send_put(&self, bytes: u64, timestamp: SystemTime) -> Result<(), MetricsError>;
}

/// Discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopSender;

impl MetricsSender for NopSender {
    fn send_get(&self, _bytes: u64, _timestamp: SystemTime) -> Result<(), MetricsError> {
        Ok(())
    }

    fn send_put(&self, _bytes: u64, _timestamp: SystemTime) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Records transfers with the globally installed `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusSender;

impl PrometheusSender {
    /// Create a sender and register metric descriptions.
    pub fn new() -> Self {
        describe_metrics();
        Self
    }

    fn record(
        &self,
        operation: &'static str,
        bytes_metric: &'static str,
        bytes: u64,
        timestamp: SystemTime,
    ) -> Result<(), MetricsError> {
        let secs = timestamp
            .duration_since(UNIX_EPOCH)
            .map_err(|_| MetricsError::InvalidTimestamp)?
            .as_secs_f64();

        counter!(bytes_metric).increment(bytes);
        counter!(TRANSFERS_TOTAL, "operation" => operation).increment(1);
        gauge!(LAST_TRANSFER_TIMESTAMP_SECONDS, "operation" => operation).set(secs);
        Ok(())
    }
}

impl MetricsSender for PrometheusSender {
    fn send_get(&self, bytes: u64, timestamp: SystemTime) -> Result<(), MetricsError> {
        self.record("get", GET_BYTES_TOTAL, bytes, timestamp)
    }

    fn send_put(&self, bytes: u64, timestamp: SystemTime) -> Result<(), MetricsError> {
        self.record("put", PUT_BYTES_TOTAL, bytes, timestamp)
    }
}

// -- Global recorder installation ---------------------------------------------

/// Guards against installing the exporter twice.
static EXPORTER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the Prometheus exporter with an HTTP listener on `listen`.
///
/// Idempotent: only the first call installs anything.  Must be called from
/// within a tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> anyhow::Result<()> {
    if EXPORTER_INSTALLED.get().is_some() {
        return Ok(());
    }
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;
    let _ = EXPORTER_INSTALLED.set(());
    Ok(())
}

/// Register metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(GET_BYTES_TOTAL, "Total bytes served by GET");
    describe_counter!(PUT_BYTES_TOTAL, "Total bytes stored by PUT");
    describe_counter!(TRANSFERS_TOTAL, "Completed transfers by operation");
    describe_gauge!(
        LAST_TRANSFER_TIMESTAMP_SECONDS,
        "Unix time of the most recent transfer by operation"
    );
}

// -- Tests --------------------------------------------------------------------
