use serde::Serialize;
use std::sync::Mutex;

/// Process-wide counters for ingestion and delivery.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub frames_processed: usize,
    pub frames_failed: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics::default()),
        }
    }

    pub fn record_processed(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.frames_processed += 1;
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.frames_failed += 1;
        }
    }

    pub fn record_delivery(&self, delivered: usize, failed: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.deliveries += delivered;
            metrics.delivery_failures += failed;
        }
    }

    pub fn snapshot(&self) -> Metrics {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
