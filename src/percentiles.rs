use hdrhistogram::Histogram;
use serde::Serialize;

/// HdrHistogram range for on-demand percentile sets: 1 μs → 60 s at three
/// significant figures. Values are recorded in microseconds so sub-millisecond
/// timings keep their resolution.
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// A percentile breakdown for one metric name, in microseconds.
///
/// Always derived on demand from the current buffer contents — like the stats
/// map, it is a pure function of the buffer and carries no state of its own.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Build a percentile set from millisecond-valued observations.
    /// Returns the zeroed placeholder when there are none.
    pub fn from_values_ms(values: impl IntoIterator<Item = f64>) -> Self {
        let mut hist = Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
            .expect("histogram bounds are static and valid");

        let mut seen = false;
        for v in values {
            seen = true;
            let us = ((v * 1000.0).round() as u64).max(1);
            // Saturates at HIST_HIGH rather than erroring on outliers
            let _ = hist.record(us.min(HIST_HIGH));
        }
        if !seen {
            return Self::empty();
        }

        Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p95: hist.value_at_percentile(95.0),
            p99: hist.value_at_percentile(99.0),
            count: hist.len(),
        }
    }

    /// All-zero placeholder used before any samples are recorded.
    pub fn empty() -> Self {
        Self {
            min: 0,
            max: 0,
            mean: 0.0,
            p50: 0,
            p95: 0,
            p99: 0,
            count: 0,
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_placeholder() {
        let set = PercentileSet::from_values_ms(std::iter::empty());
        assert!(!set.has_data());
        assert_eq!(set.p99, 0);
    }

    #[test]
    fn percentiles_track_millisecond_inputs() {
        // 1ms..=100ms
        let set = PercentileSet::from_values_ms((1..=100).map(|v| v as f64));
        assert_eq!(set.count, 100);
        // Recorded in microseconds, 3 sig-figs of precision
        assert!(set.min >= 1_000 && set.min < 1_010);
        assert!(set.p50 >= 49_000 && set.p50 <= 51_000);
        assert!(set.max >= 99_000);
    }
}
