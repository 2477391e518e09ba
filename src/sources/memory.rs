use serde_json::json;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};

use crate::metric::{Metadata, Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// Translates heap/memory entries into `memory_usage` metrics with
/// `{total, limit, percentage}` context.
pub struct MemorySource;

const KINDS: [EntryKind; 1] = [EntryKind::Memory];

impl InstrumentSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::Memory {
            used_bytes,
            total_bytes,
            limit_bytes,
        } = entry
        else {
            return Vec::new();
        };
        let percentage = if *limit_bytes > 0 {
            (*used_bytes as f64 / *limit_bytes as f64) * 100.0
        } else {
            0.0
        };
        vec![
            Metric::now("memory_usage", *used_bytes as f64, MetricUnit::Bytes).with_metadata(
                Metadata::from([
                    ("total".into(), json!(total_bytes)),
                    ("limit".into(), json!(limit_bytes)),
                    ("percentage".into(), json!(percentage)),
                ]),
            ),
        ]
    }
}

/// Interval task that samples process-visible memory and feeds `Memory`
/// entries into the given sink — once immediately at start, then every
/// `sample_secs` for trend visibility.
///
/// The sink returns whether sampling should continue; a `false` ends the
/// task. Shutdown additionally aborts the returned handle so the timer
/// cannot outlive its consumer either way.
pub fn spawn_memory_sampler(
    sample_secs: u64,
    sink: impl Fn(PerformanceEntry) -> bool + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut system = System::new();
        let mut tick = interval(Duration::from_secs(sample_secs.max(1)));
        loop {
            // First tick fires immediately: one sample at mount
            tick.tick().await;
            system.refresh_memory();
            let keep_going = sink(PerformanceEntry::Memory {
                used_bytes: system.used_memory(),
                total_bytes: system.total_memory(),
                limit_bytes: system.total_memory() + system.total_swap(),
            });
            if !keep_going {
                break;
            }
        }
    })
}
