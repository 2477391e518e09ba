//! Instrumentation source framework.
//!
//! Each [`InstrumentSource`] translates one category of timeline entry into
//! normalized metrics. Sources are attached through [`Instrumentation`],
//! which negotiates capabilities up front: a source whose entry kinds the
//! host cannot deliver is recorded as inactive (one warning) and the rest
//! keep operating — per-source failure isolation.

pub mod input;
pub mod layout_shift;
pub mod lcp;
pub mod memory;
pub mod navigation;
pub mod paint;
pub mod resource;

use std::sync::Arc;

use crate::collector::Collector;
use crate::config::MonitorConfig;
use crate::metric::Metric;
use crate::timeline::{Capabilities, EntryKind, PerformanceEntry};

/// Adapter from raw timeline entries to normalized metrics.
pub trait InstrumentSource: Send + Sync {
    /// Source name (e.g. `"navigation"`, `"layout_shift"`), used for logging
    /// and the active/inactive introspection API.
    fn name(&self) -> &str;

    /// Entry kinds this source consumes. All must be supported by the host
    /// for the source to attach.
    fn kinds(&self) -> &[EntryKind];

    /// Translate one entry into zero or more metrics. Entries the source
    /// does not care about yield an empty vec, never an error.
    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric>;
}

/// Registry of attached sources plus the names of those that failed
/// capability negotiation.
#[derive(Default)]
pub struct Instrumentation {
    active: Vec<Box<dyn InstrumentSource>>,
    inactive: Vec<String>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every standard source, attached against the host's capabilities.
    pub fn with_defaults(caps: &dyn Capabilities, config: &MonitorConfig) -> Self {
        let mut this = Self::new();
        this.attach(Box::new(navigation::NavigationSource), caps);
        this.attach(Box::new(paint::PaintSource), caps);
        this.attach(Box::new(lcp::LargestContentfulPaintSource), caps);
        this.attach(Box::new(input::InputDelaySource), caps);
        this.attach(Box::new(layout_shift::LayoutShiftSource), caps);
        this.attach(
            Box::new(resource::ResourceSource::new(&config.asset_prefix)),
            caps,
        );
        this.attach(Box::new(memory::MemorySource), caps);
        this
    }

    /// Attach one source if the host supports every entry kind it consumes.
    /// Returns whether it attached; an unsupported source is logged once and
    /// never observes.
    pub fn attach(&mut self, source: Box<dyn InstrumentSource>, caps: &dyn Capabilities) -> bool {
        let unsupported: Vec<_> = source
            .kinds()
            .iter()
            .filter(|k| !caps.supports(**k))
            .collect();
        if unsupported.is_empty() {
            self.active.push(source);
            true
        } else {
            tracing::warn!(
                source = source.name(),
                kinds = ?unsupported,
                "entry kind unsupported by host, source inactive"
            );
            self.inactive.push(source.name().to_string());
            false
        }
    }

    /// Route one entry to every attached source that consumes its kind,
    /// pushing the resulting metrics into the collector.
    pub fn dispatch(&mut self, entry: &PerformanceEntry, collector: &Arc<Collector>) {
        let kind = entry.kind();
        for source in &mut self.active {
            if !source.kinds().contains(&kind) {
                continue;
            }
            for metric in source.observe(entry) {
                collector.track(metric);
            }
        }
    }

    pub fn active_sources(&self) -> Vec<&str> {
        self.active.iter().map(|s| s.name()).collect()
    }

    pub fn inactive_sources(&self) -> &[String] {
        &self.inactive
    }

    pub fn detach_all(&mut self) {
        self.active.clear();
    }
}
