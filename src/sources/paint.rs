use crate::metric::{Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// Republishes `first-paint` / `first-contentful-paint` entries verbatim,
/// renamed with underscores.
pub struct PaintSource;

const KINDS: [EntryKind; 1] = [EntryKind::Paint];

impl InstrumentSource for PaintSource {
    fn name(&self) -> &str {
        "paint"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::Paint { name, start_ms } = entry else {
            return Vec::new();
        };
        vec![Metric::now(name.replace('-', "_"), *start_ms, MetricUnit::Ms)]
    }
}
