use serde_json::json;

use crate::metric::{Metadata, Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// First-input delay / INP candidate: time from the user's interaction to
/// when the page started processing it.
pub struct InputDelaySource;

const KINDS: [EntryKind; 1] = [EntryKind::Input];

impl InstrumentSource for InputDelaySource {
    fn name(&self) -> &str {
        "input_delay"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::Input {
            event_type,
            start_ms,
            processing_start_ms,
        } = entry
        else {
            return Vec::new();
        };
        let delay = processing_start_ms - start_ms;
        if delay < 0.0 {
            // Non-monotonic pair from the host; drop it
            return Vec::new();
        }
        vec![
            Metric::now("first_input_delay", delay, MetricUnit::Ms).with_metadata(
                Metadata::from([("event_type".into(), json!(event_type))]),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_processing_start_minus_event_start() {
        let metrics = InputDelaySource.observe(&PerformanceEntry::Input {
            event_type: "pointerdown".into(),
            start_ms: 1200.0,
            processing_start_ms: 1245.0,
        });
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "first_input_delay");
        assert_eq!(metrics[0].value, 45.0);
        assert_eq!(metrics[0].metadata["event_type"], "pointerdown");
    }

    #[test]
    fn negative_delay_is_dropped() {
        let metrics = InputDelaySource.observe(&PerformanceEntry::Input {
            event_type: "keydown".into(),
            start_ms: 500.0,
            processing_start_ms: 480.0,
        });
        assert!(metrics.is_empty());
    }
}
