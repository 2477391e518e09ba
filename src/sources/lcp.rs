use serde_json::json;

use crate::metric::{Metadata, Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// Reports `largest_contentful_paint` for every firing.
///
/// The timeline emits a new candidate each time a larger element renders;
/// no dedup happens here — the last firing before a flush is authoritative
/// and the collector does not special-case LCP.
pub struct LargestContentfulPaintSource;

const KINDS: [EntryKind; 1] = [EntryKind::LargestContentfulPaint];

impl InstrumentSource for LargestContentfulPaintSource {
    fn name(&self) -> &str {
        "largest_contentful_paint"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::LargestContentfulPaint { start_ms, element } = entry else {
            return Vec::new();
        };
        let mut metric = Metric::now("largest_contentful_paint", *start_ms, MetricUnit::Ms);
        if let Some(tag) = element {
            metric.metadata = Metadata::from([("element".into(), json!(tag))]);
        }
        vec![metric]
    }
}
