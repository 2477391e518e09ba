//! Central accumulation point for all metrics.
//!
//! Instrumentation sources, the vitals bridge, and application code all push
//! into one bounded buffer; the dashboard reads snapshots and derived stats
//! back out; flushes hand batches to the transport with at-least-once
//! semantics. Telemetry is strictly best-effort — nothing in here ever
//! propagates an error to a caller.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;

use crate::config::MonitorConfig;
use crate::metric::{Metadata, Metric, MetricUnit};
use crate::mirror::DebugMirror;
use crate::percentiles::PercentileSet;
use crate::transport::{FlushPayload, Transport};

// ─── Derived stats ───────────────────────────────────────────────

/// Aggregate over every buffered metric sharing one name. Recomputed from the
/// buffer on each call, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

// ─── Collector ───────────────────────────────────────────────────

/// Bounded metric buffer with flush orchestration.
///
/// All mutation is synchronous under one lock; network I/O happens only after
/// a batch has been drained out, so metrics arriving during an in-flight
/// flush are neither lost nor double-counted.
pub struct Collector {
    inner: Mutex<Inner>,
    transport: Option<Arc<dyn Transport>>,
    mirror: Option<DebugMirror>,
    capacity: usize,
    /// Buffer occupancy that triggers an automatic background flush.
    flush_threshold: usize,
    console_logging: bool,
    user_agent: String,
    page: Mutex<String>,
    flush_in_flight: AtomicBool,
}

struct Inner {
    buffer: VecDeque<Metric>,
}

impl Collector {
    pub fn new(
        config: &MonitorConfig,
        transport: Option<Arc<dyn Transport>>,
        mirror: Option<DebugMirror>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buffer: VecDeque::with_capacity(config.capacity.min(1024)),
            }),
            transport,
            mirror,
            capacity: config.capacity.max(1),
            flush_threshold: config.flush_threshold.max(1),
            console_logging: config.console_logging,
            user_agent: config.user_agent.clone(),
            page: Mutex::new(String::new()),
            flush_in_flight: AtomicBool::new(false),
        }
    }

    /// Current page path, carried in the bulk flush payload.
    pub fn set_page(&self, url: impl Into<String>) {
        *self.page.lock() = url.into();
    }

    // ── Tracking ────────────────────────────────────────────────

    /// Append a fully-formed metric. Oldest entry is evicted first when the
    /// buffer is at capacity: recent signals are more actionable for a live
    /// dashboard than old ones.
    pub fn track(self: &Arc<Self>, metric: Metric) {
        if self.console_logging {
            tracing::debug!(
                name = %metric.name,
                value = metric.value,
                unit = %metric.unit,
                "metric tracked"
            );
        }
        if let Some(mirror) = &self.mirror {
            mirror.record(&metric);
        }

        let len = {
            let mut inner = self.inner.lock();
            if inner.buffer.len() >= self.capacity {
                inner.buffer.pop_front();
            }
            inner.buffer.push_back(metric);
            inner.buffer.len()
        };

        if self.transport.is_some() && len >= self.flush_threshold {
            self.spawn_flush();
        }
    }

    /// Append a metric with the current timestamp. No validation beyond unit
    /// coercion; any name/unit string is accepted.
    pub fn track_custom(
        self: &Arc<Self>,
        name: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        metadata: Option<Metadata>,
    ) {
        let mut metric = Metric::now(name, value, unit);
        if let Some(metadata) = metadata {
            metric.metadata = metadata;
        }
        self.track(metric);
    }

    // ── Typed wrappers ──────────────────────────────────────────
    // These exist so every call site produces metrics of a uniform shape per
    // category; the stats map and dashboard grouping rely on it.

    pub fn track_page_load(self: &Arc<Self>, page: &str, load_time_ms: f64) {
        self.track_custom(
            "page_load_time",
            load_time_ms,
            MetricUnit::Ms,
            Some(Metadata::from([("page".into(), json!(page))])),
        );
    }

    pub fn track_api_call(
        self: &Arc<Self>,
        endpoint: &str,
        method: &str,
        duration_ms: f64,
        status: u16,
    ) {
        self.track_custom(
            "api_response_time",
            duration_ms,
            MetricUnit::Ms,
            Some(Metadata::from([
                ("endpoint".into(), json!(endpoint)),
                ("method".into(), json!(method)),
                ("status".into(), json!(status)),
            ])),
        );
    }

    pub fn track_image_load(
        self: &Arc<Self>,
        src: &str,
        load_time_ms: f64,
        dimensions: Option<(u32, u32)>,
    ) {
        let mut metadata = Metadata::from([("src".into(), json!(src))]);
        if let Some((w, h)) = dimensions {
            metadata.insert("width".into(), json!(w));
            metadata.insert("height".into(), json!(h));
        }
        self.track_custom("image_load_time", load_time_ms, MetricUnit::Ms, Some(metadata));
    }

    pub fn track_bundle_load(self: &Arc<Self>, name: &str, size_bytes: u64, load_time_ms: f64) {
        self.track_custom(
            "bundle_load_time",
            load_time_ms,
            MetricUnit::Ms,
            Some(Metadata::from([
                ("bundle".into(), json!(name)),
                ("size_bytes".into(), json!(size_bytes)),
            ])),
        );
    }

    // ── Read API ────────────────────────────────────────────────

    /// Snapshot copy of the buffer, insertion order. Does not reflect
    /// subsequent mutation.
    pub fn metrics(&self) -> Vec<Metric> {
        self.inner.lock().buffer.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().buffer.is_empty()
    }

    /// Per-name aggregates over the current buffer. Empty buffer gives an
    /// empty map, not an error.
    pub fn stats(&self) -> HashMap<String, MetricStats> {
        let inner = self.inner.lock();
        let mut out: HashMap<String, MetricStats> = HashMap::new();
        for m in &inner.buffer {
            let entry = out.entry(m.name.clone()).or_insert(MetricStats {
                count: 0,
                sum: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                avg: 0.0,
            });
            entry.count += 1;
            entry.sum += m.value;
            entry.min = entry.min.min(m.value);
            entry.max = entry.max.max(m.value);
        }
        for stats in out.values_mut() {
            stats.avg = stats.sum / stats.count as f64;
        }
        out
    }

    /// On-demand percentile breakdown for one metric name (ms-valued
    /// metrics). Derived from the buffer like [`Collector::stats`].
    pub fn percentiles(&self, name: &str) -> PercentileSet {
        let inner = self.inner.lock();
        PercentileSet::from_values_ms(
            inner
                .buffer
                .iter()
                .filter(|m| m.name == name)
                .map(|m| m.value),
        )
    }

    // ── Flush / lifecycle ───────────────────────────────────────

    /// Hand the buffered batch to the transport. Returns `true` when the
    /// batch was accepted (or there was nothing to send); on failure every
    /// metric is requeued for the next attempt — at-least-once, duplicates
    /// across retries accepted.
    pub async fn flush(&self) -> bool {
        let batch: Vec<Metric> = {
            let mut inner = self.inner.lock();
            inner.buffer.drain(..).collect()
        };
        if batch.is_empty() {
            return true;
        }

        let Some(transport) = &self.transport else {
            // Remote reporting disabled: keep the batch, ring eviction bounds it
            self.requeue(batch);
            return false;
        };

        let count = batch.len();
        let url = self.page.lock().clone();
        let payload = FlushPayload {
            metrics: &batch,
            user_agent: &self.user_agent,
            url: &url,
            timestamp: Utc::now().timestamp_millis(),
        };
        let body = match serde_json::to_value(&payload) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode flush payload");
                self.requeue(batch);
                return false;
            }
        };

        match transport.deliver(body).await {
            Ok(()) => {
                tracing::debug!(count, "metrics flushed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, count, "flush failed, retaining metrics");
                self.requeue(batch);
                false
            }
        }
    }

    /// Discard everything without a transport attempt. Debug/testing use.
    pub fn clear(&self) {
        self.inner.lock().buffer.clear();
    }

    /// Put a failed batch back in front of anything that arrived while the
    /// flush was in flight, preserving insertion order, then re-apply the
    /// capacity bound (oldest evicted first).
    fn requeue(&self, batch: Vec<Metric>) {
        let mut inner = self.inner.lock();
        for metric in batch.into_iter().rev() {
            inner.buffer.push_front(metric);
        }
        while inner.buffer.len() > self.capacity {
            inner.buffer.pop_front();
        }
    }

    /// Background flush for the high-water mark. Requires a tokio runtime;
    /// without one the trigger is skipped and eviction bounds the buffer.
    fn spawn_flush(self: &Arc<Self>) {
        if self
            .flush_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.flush_in_flight.store(false, Ordering::Release);
            return;
        };
        let collector = Arc::clone(self);
        handle.spawn(async move {
            collector.flush().await;
            collector.flush_in_flight.store(false, Ordering::Release);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::Value;

    fn config(capacity: usize, flush_threshold: usize) -> MonitorConfig {
        MonitorConfig {
            capacity,
            flush_threshold,
            ..MonitorConfig::default()
        }
    }

    fn collector(capacity: usize) -> Arc<Collector> {
        Arc::new(Collector::new(&config(capacity, usize::MAX), None, None))
    }

    struct OkTransport {
        sent: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl Transport for OkTransport {
        async fn deliver(&self, body: Value) -> Result<(), TransportError> {
            self.sent.lock().push(body);
            Ok(())
        }
    }

    struct FailTransport;

    #[async_trait]
    impl Transport for FailTransport {
        async fn deliver(&self, _body: Value) -> Result<(), TransportError> {
            Err(TransportError::Status(503))
        }
    }

    #[test]
    fn buffer_never_exceeds_capacity_and_evicts_oldest() {
        let c = collector(1000);
        for i in 0..=1000 {
            c.track_custom(format!("metric_{i}"), i as f64, MetricUnit::Ms, None);
            assert!(c.len() <= 1000);
        }
        let metrics = c.metrics();
        assert_eq!(metrics.len(), 1000);
        assert_eq!(metrics[0].name, "metric_1");
        assert_eq!(metrics[999].name, "metric_1000");
    }

    #[test]
    fn stats_aggregate_per_name() {
        let c = collector(100);
        for v in [100.0, 200.0, 150.0] {
            c.track_custom("test_metric", v, MetricUnit::Ms, None);
        }
        c.track_custom("other", 7.0, MetricUnit::Score, None);

        let stats = c.stats();
        let s = &stats["test_metric"];
        assert_eq!(s.count, 3);
        assert_eq!(s.sum, 450.0);
        assert_eq!(s.min, 100.0);
        assert_eq!(s.max, 200.0);
        assert_eq!(s.avg, 150.0);
        assert_eq!(stats["other"].count, 1);
    }

    #[test]
    fn empty_buffer_gives_empty_stats() {
        let c = collector(10);
        assert!(c.stats().is_empty());
    }

    #[test]
    fn typed_wrappers_produce_uniform_shapes() {
        let c = collector(10);
        c.track_page_load("/exhibitions", 850.0);
        c.track_api_call("/api/notices", "GET", 120.0, 200);
        c.track_image_load("/static/artwork.jpg", 340.0, Some((800, 600)));
        c.track_bundle_load("main", 214_000, 95.0);

        let metrics = c.metrics();
        assert_eq!(metrics[0].name, "page_load_time");
        assert_eq!(metrics[1].name, "api_response_time");
        assert_eq!(metrics[1].metadata["method"], "GET");
        assert_eq!(metrics[1].metadata["status"], 200);
        assert_eq!(metrics[2].name, "image_load_time");
        assert_eq!(metrics[2].metadata["width"], 800);
        assert_eq!(metrics[3].name, "bundle_load_time");
        assert_eq!(metrics[3].metadata["size_bytes"], 214_000);
        assert!(metrics.iter().all(|m| m.unit == MetricUnit::Ms));
    }

    #[test]
    fn clear_discards_without_transport() {
        let c = collector(10);
        c.track_custom("m", 1.0, MetricUnit::Ms, None);
        c.clear();
        assert!(c.is_empty());
    }

    #[tokio::test]
    async fn flush_success_clears_buffer() {
        let transport = Arc::new(OkTransport {
            sent: Mutex::new(Vec::new()),
        });
        let c = Arc::new(Collector::new(
            &config(100, usize::MAX),
            Some(transport.clone()),
            None,
        ));
        c.track_custom("m", 1.0, MetricUnit::Ms, None);
        c.track_custom("m", 2.0, MetricUnit::Ms, None);

        assert!(c.flush().await);
        assert_eq!(c.len(), 0);

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["metrics"].as_array().unwrap().len(), 2);
        assert!(sent[0].get("userAgent").is_some());
        assert!(sent[0].get("timestamp").is_some());
    }

    #[tokio::test]
    async fn flush_failure_preserves_buffer_in_order() {
        let c = Arc::new(Collector::new(
            &config(100, usize::MAX),
            Some(Arc::new(FailTransport)),
            None,
        ));
        c.track_custom("a", 1.0, MetricUnit::Ms, None);
        c.track_custom("b", 2.0, MetricUnit::Ms, None);

        assert!(!c.flush().await);
        let metrics = c.metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name, "a");
        assert_eq!(metrics[1].name, "b");
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let transport = Arc::new(OkTransport {
            sent: Mutex::new(Vec::new()),
        });
        let c = Arc::new(Collector::new(&config(100, usize::MAX), Some(transport.clone()), None));
        assert!(c.flush().await);
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn reaching_high_water_mark_triggers_auto_flush() {
        let transport = Arc::new(OkTransport {
            sent: Mutex::new(Vec::new()),
        });
        let c = Arc::new(Collector::new(&config(100, 5), Some(transport.clone()), None));
        for i in 0..5 {
            c.track_custom("m", i as f64, MetricUnit::Ms, None);
        }
        // Give the spawned flush a chance to run
        for _ in 0..20 {
            if !transport.sent.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(transport.sent.lock().len(), 1);
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn percentiles_are_scoped_to_one_name() {
        let c = collector(100);
        for v in 1..=10 {
            c.track_custom("api_response_time", v as f64, MetricUnit::Ms, None);
        }
        c.track_custom("unrelated", 10_000.0, MetricUnit::Ms, None);

        let set = c.percentiles("api_response_time");
        assert_eq!(set.count, 10);
        assert!(set.max < 11_000); // microseconds; the outlier name is excluded
    }
}
