//! Bounded on-disk debug mirror.
//!
//! Independent of the delivery buffer: a developer-inspection side channel
//! holding the last 50 metrics under the `performance_metrics` key, plus a
//! one-flag `performance_visited` marker for first-visit detection. Every
//! failure path is a debug log; the mirror never interferes with tracking.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::metric::Metric;

/// Maximum mirrored entries. Deliberately far below buffer capacity — the
/// mirror is for eyeballing recent activity, not retention.
const MIRROR_CAP: usize = 50;

const METRICS_KEY: &str = "performance_metrics";
const VISITED_KEY: &str = "performance_visited";

pub struct DebugMirror {
    dir: PathBuf,
    /// Authoritative copy; the on-disk file is write-only after the initial
    /// load, so the hot track path never re-reads or re-parses it.
    entries: Mutex<Vec<Metric>>,
}

impl DebugMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::debug!(error = %e, dir = %dir.display(), "debug mirror dir unavailable");
        }
        // Pick up entries persisted by an earlier session; corrupt or
        // missing contents read as empty
        let entries = fs::read(dir.join(format!("{METRICS_KEY}.json")))
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default();
        Self {
            dir,
            entries: Mutex::new(entries),
        }
    }

    fn metrics_path(&self) -> PathBuf {
        self.dir.join(format!("{METRICS_KEY}.json"))
    }

    /// Append one metric, keeping only the newest [`MIRROR_CAP`] entries.
    pub fn record(&self, metric: &Metric) {
        let bytes = {
            let mut entries = self.entries.lock();
            entries.push(metric.clone());
            if entries.len() > MIRROR_CAP {
                let excess = entries.len() - MIRROR_CAP;
                entries.drain(..excess);
            }
            serde_json::to_vec(&*entries)
        };
        match bytes {
            Ok(bytes) => {
                if let Err(e) = fs::write(self.metrics_path(), bytes) {
                    tracing::debug!(error = %e, "debug mirror write failed");
                }
            }
            Err(e) => tracing::debug!(error = %e, "debug mirror encode failed"),
        }
    }

    /// Currently mirrored metrics, oldest first.
    pub fn entries(&self) -> Vec<Metric> {
        self.entries.lock().clone()
    }

    /// True exactly once per mirror directory: the first call creates the
    /// visited marker, later calls see it.
    pub fn first_visit(&self) -> bool {
        let marker = self.dir.join(VISITED_KEY);
        if marker.exists() {
            return false;
        }
        if let Err(e) = fs::write(&marker, b"1") {
            tracing::debug!(error = %e, "visited marker write failed");
        }
        true
    }
}
