use crate::metric::{Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// Reports each qualifying layout shift individually.
///
/// Shifts with `had_recent_input` are excluded per the Web Vitals rule
/// (user-caused movement is expected movement). Summation is deferred to the
/// stats layer so raw shift events stay inspectable.
pub struct LayoutShiftSource;

const KINDS: [EntryKind; 1] = [EntryKind::LayoutShift];

impl InstrumentSource for LayoutShiftSource {
    fn name(&self) -> &str {
        "layout_shift"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::LayoutShift {
            value,
            had_recent_input,
        } = entry
        else {
            return Vec::new();
        };
        if *had_recent_input {
            return Vec::new();
        }
        vec![Metric::now("cumulative_layout_shift", *value, MetricUnit::Score)]
    }
}
