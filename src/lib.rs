//! In-process performance telemetry core.
//!
//! One bounded [`Collector`] accumulates normalized metrics from the
//! instrumentation sources, the Web Vitals bridge, and application code;
//! batches are shipped best-effort to a remote endpoint (beacon first,
//! keep-alive POST fallback) and the admin dashboard reads snapshots and
//! derived stats straight out of memory.
//!
//! The whole subsystem is deliberately invisible: no failure path here ever
//! propagates to application code — delivery failures retain the buffer,
//! unsupported host capabilities leave a source inactive, and a broken
//! analytics callback is logged and swallowed.

pub mod budget;
pub mod collector;
pub mod config;
pub mod metric;
pub mod mirror;
pub mod overlay;
pub mod percentiles;
pub mod sources;
pub mod timeline;
pub mod transport;
pub mod vitals;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tokio::task::JoinHandle;

pub use budget::{BudgetMonitor, VitalBudgets};
pub use collector::{Collector, MetricStats};
pub use config::{MonitorConfig, ReportingConfig};
pub use metric::{Metadata, Metric, MetricUnit};
pub use percentiles::PercentileSet;
pub use timeline::{Capabilities, EntryKind, FullCapabilities, PerformanceEntry, StaticCapabilities};
pub use transport::{BeaconSender, TieredTransport, Transport, TransportError};
pub use vitals::{Rating, Vital, VitalCallback, VitalKind, VitalsBridge};

use mirror::DebugMirror;
use sources::{memory::spawn_memory_sampler, Instrumentation};

// ─── Monitor ─────────────────────────────────────────────────────

/// The telemetry subsystem as one explicit object.
///
/// Constructed once at application start and injected into whatever needs it
/// (instrumentation hooks, the dashboard overlay) — process-wide lifecycle
/// without a hidden module-level global. Dropped or [`shutdown`] on app
/// teardown.
///
/// [`shutdown`]: PerformanceMonitor::shutdown
pub struct PerformanceMonitor {
    collector: Arc<Collector>,
    instrumentation: Mutex<Instrumentation>,
    bridge: VitalsBridge,
    sampler: Mutex<Option<JoinHandle<()>>>,
    /// Session sampling decision, made once at construction. A sampled-out
    /// session keeps the monitor inert end to end.
    enabled: bool,
}

impl PerformanceMonitor {
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(config)
    }

    /// Full default wiring: every source, HTTP transports from the config's
    /// reporting section (when present).
    pub fn from_config(config: MonitorConfig) -> Arc<Self> {
        Self::builder(config).build()
    }

    // ── Ingest ──────────────────────────────────────────────────

    /// Feed one raw timeline entry through the attached sources.
    pub fn observe(&self, entry: PerformanceEntry) {
        if !self.enabled {
            return;
        }
        self.instrumentation.lock().dispatch(&entry, &self.collector);
    }

    /// Feed one Web Vitals measurement through the bridge.
    pub fn on_vital(&self, vital: Vital) {
        if !self.enabled {
            return;
        }
        self.bridge.on_vital(vital);
    }

    pub fn track_custom(
        &self,
        name: impl Into<String>,
        value: f64,
        unit: MetricUnit,
        metadata: Option<Metadata>,
    ) {
        if self.enabled {
            self.collector.track_custom(name, value, unit, metadata);
        }
    }

    pub fn track_page_load(&self, page: &str, load_time_ms: f64) {
        if self.enabled {
            self.collector.track_page_load(page, load_time_ms);
        }
    }

    pub fn track_api_call(&self, endpoint: &str, method: &str, duration_ms: f64, status: u16) {
        if self.enabled {
            self.collector.track_api_call(endpoint, method, duration_ms, status);
        }
    }

    pub fn track_image_load(&self, src: &str, load_time_ms: f64, dimensions: Option<(u32, u32)>) {
        if self.enabled {
            self.collector.track_image_load(src, load_time_ms, dimensions);
        }
    }

    pub fn track_bundle_load(&self, name: &str, size_bytes: u64, load_time_ms: f64) {
        if self.enabled {
            self.collector.track_bundle_load(name, size_bytes, load_time_ms);
        }
    }

    /// Page path carried in bulk flush payloads.
    pub fn set_page(&self, url: impl Into<String>) {
        self.collector.set_page(url);
    }

    // ── Read API (dashboard) ────────────────────────────────────

    pub fn metrics(&self) -> Vec<Metric> {
        self.collector.metrics()
    }

    pub fn stats(&self) -> HashMap<String, MetricStats> {
        self.collector.stats()
    }

    pub fn percentiles(&self, name: &str) -> PercentileSet {
        self.collector.percentiles(name)
    }

    pub fn active_sources(&self) -> Vec<String> {
        self.instrumentation
            .lock()
            .active_sources()
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub fn inactive_sources(&self) -> Vec<String> {
        self.instrumentation.lock().inactive_sources().to_vec()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn session_id(&self) -> &str {
        self.bridge.session_id()
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Flush the buffer now. See [`Collector::flush`] for the retry
    /// semantics.
    pub async fn flush(&self) -> bool {
        self.collector.flush().await
    }

    /// Discard the buffer without a transport attempt.
    pub fn clear(&self) {
        self.collector.clear();
    }

    /// Teardown: stop the memory sampler, detach every source, and make a
    /// final flush so the page-unload batch gets its beacon attempt.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sampler.lock().take() {
            handle.abort();
        }
        self.instrumentation.lock().detach_all();
        self.flush().await;
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        // Dropping without shutdown() must still stop the sampler timer
        if let Some(handle) = self.sampler.lock().take() {
            handle.abort();
        }
    }
}

// ─── Builder ─────────────────────────────────────────────────────

/// Wires collector, sources, bridge, and budget monitor together. Transports
/// are injectable so both delivery paths can be tested without a network.
pub struct MonitorBuilder {
    config: MonitorConfig,
    capabilities: Box<dyn Capabilities>,
    transport: Option<Arc<dyn Transport>>,
    vitals_transport: Option<Arc<dyn Transport>>,
    vitals_callback: Option<VitalCallback>,
}

impl MonitorBuilder {
    fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            capabilities: Box::new(FullCapabilities),
            transport: None,
            vitals_transport: None,
            vitals_callback: None,
        }
    }

    /// What the host timeline can deliver; sources failing this check stay
    /// inactive.
    pub fn capabilities(mut self, caps: impl Capabilities + 'static) -> Self {
        self.capabilities = Box::new(caps);
        self
    }

    /// Bulk-flush transport override (defaults to the tiered HTTP stack
    /// against `reporting.endpoint`).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Per-vital report transport override (defaults to the tiered HTTP
    /// stack against `reporting.vitals_endpoint`).
    pub fn vitals_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.vitals_transport = Some(transport);
        self
    }

    /// External analytics hook invoked per vital after recording.
    pub fn vitals_callback(mut self, callback: VitalCallback) -> Self {
        self.vitals_callback = Some(callback);
        self
    }

    pub fn build(self) -> Arc<PerformanceMonitor> {
        let config = self.config;

        let enabled = rand::thread_rng().gen::<f64>() < config.sample_rate;
        if !enabled {
            tracing::debug!(sample_rate = config.sample_rate, "session sampled out");
        }

        let transport = self.transport.or_else(|| {
            config
                .reporting
                .as_ref()
                .map(|r| Arc::new(TieredTransport::http(&r.endpoint)) as Arc<dyn Transport>)
        });
        let vitals_transport = self.vitals_transport.or_else(|| {
            config
                .reporting
                .as_ref()
                .and_then(|r| r.vitals_endpoint.as_deref())
                .map(|ep| Arc::new(TieredTransport::http(ep)) as Arc<dyn Transport>)
        });
        let mirror = config.mirror_dir.as_ref().map(DebugMirror::new);
        if let Some(mirror) = &mirror {
            if mirror.first_visit() {
                tracing::debug!("first visit for this session scope");
            }
        }

        let collector = Arc::new(Collector::new(&config, transport, mirror));
        let instrumentation = Instrumentation::with_defaults(self.capabilities.as_ref(), &config);

        let mut bridge = VitalsBridge::new(collector.clone())
            .with_budget_monitor(BudgetMonitor::new(config.budgets.clone()));
        if let Some(callback) = self.vitals_callback {
            bridge = bridge.with_callback(callback);
        }
        if let Some(t) = vitals_transport {
            bridge = bridge.with_reporter(t);
        }

        let monitor = Arc::new(PerformanceMonitor {
            collector,
            instrumentation: Mutex::new(instrumentation),
            bridge,
            sampler: Mutex::new(None),
            enabled,
        });

        // Memory trend sampling needs a runtime and a capable host; without
        // either it is simply not started.
        let memory_attached = monitor
            .active_sources()
            .iter()
            .any(|name| name == "memory");
        if enabled && memory_attached && tokio::runtime::Handle::try_current().is_ok() {
            let weak = Arc::downgrade(&monitor);
            let handle = spawn_memory_sampler(config.memory_sample_secs, move |entry| {
                // A failed upgrade means the monitor is gone: end the task
                match weak.upgrade() {
                    Some(monitor) => {
                        monitor.observe(entry);
                        true
                    }
                    None => false,
                }
            });
            *monitor.sampler.lock() = Some(handle);
        }

        monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled_config(rate: f64) -> MonitorConfig {
        MonitorConfig {
            sample_rate: rate,
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn sampled_out_session_records_nothing() {
        let monitor = PerformanceMonitor::builder(sampled_config(0.0)).build();
        assert!(!monitor.is_enabled());

        monitor.track_custom("m", 1.0, MetricUnit::Ms, None);
        monitor.observe(PerformanceEntry::Paint {
            name: "first-paint".into(),
            start_ms: 5.0,
        });
        monitor.on_vital(Vital {
            kind: VitalKind::Lcp,
            value: 9000.0,
            rating: Rating::Poor,
            delta: 9000.0,
            id: "v1".into(),
        });

        assert!(monitor.metrics().is_empty());
        assert!(monitor.stats().is_empty());
    }

    #[tokio::test]
    async fn dropped_monitor_is_released_despite_running_sampler() {
        let monitor = PerformanceMonitor::builder(sampled_config(1.0)).build();
        // Sampler is running on a full-capability host inside a runtime
        assert!(monitor.sampler.lock().is_some());

        let weak = Arc::downgrade(&monitor);
        drop(monitor);
        // The sampler task only holds a Weak, so the monitor is freed and
        // Drop has aborted the timer
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn full_rate_session_instruments() {
        let monitor = PerformanceMonitor::builder(sampled_config(1.0)).build();
        assert!(monitor.is_enabled());
        monitor.track_page_load("/contest", 640.0);
        assert_eq!(monitor.metrics().len(), 1);
        assert_eq!(monitor.stats()["page_load_time"].avg, 640.0);
    }
}
