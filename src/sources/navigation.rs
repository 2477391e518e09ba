use crate::metric::{Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, NavigationTiming, PerformanceEntry};

/// Decomposes a navigation-timing record into named phase metrics.
///
/// Phases with missing or non-monotonic milestones (e.g. no TLS handshake on
/// plain HTTP) are dropped, not reported as zero.
pub struct NavigationSource;

const KINDS: [EntryKind; 1] = [EntryKind::Navigation];

impl NavigationSource {
    fn phases(t: &NavigationTiming) -> Vec<(&'static str, Option<f64>)> {
        vec![
            ("dns_lookup", NavigationTiming::span(t.domain_lookup_start, t.domain_lookup_end)),
            ("tcp_connection", NavigationTiming::span(t.connect_start, t.connect_end)),
            ("tls_handshake", NavigationTiming::span(t.secure_connection_start, t.connect_end)),
            ("ttfb", NavigationTiming::span(t.request_start, t.response_start)),
            ("content_download", NavigationTiming::span(t.response_start, t.response_end)),
            ("dom_processing", NavigationTiming::span(t.dom_interactive, t.dom_complete)),
            // Origin-relative: total time until the load event finished
            ("page_load", (t.load_event_end > 0.0).then_some(t.load_event_end)),
        ]
    }
}

impl InstrumentSource for NavigationSource {
    fn name(&self) -> &str {
        "navigation"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::Navigation(timing) = entry else {
            return Vec::new();
        };
        Self::phases(timing)
            .into_iter()
            .filter_map(|(name, delta)| delta.map(|d| Metric::now(name, d, MetricUnit::Ms)))
            .collect()
    }
}
