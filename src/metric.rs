use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open key-value context attached to a metric (endpoint, method, status,
/// image dimensions, page path, ...). String keys, JSON values.
pub type Metadata = HashMap<String, Value>;

// ─── Units ───────────────────────────────────────────────────────

/// Unit of a metric value. Serialized as the bare string (`"ms"`, `"score"`,
/// ...); anything outside the well-known set round-trips as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricUnit {
    Ms,
    Score,
    Bytes,
    Boolean,
    Timestamp,
    Custom(String),
}

impl MetricUnit {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ms => "ms",
            Self::Score => "score",
            Self::Bytes => "bytes",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Custom(s) => s,
        }
    }
}

impl From<&str> for MetricUnit {
    fn from(s: &str) -> Self {
        match s {
            "ms" => Self::Ms,
            "score" => Self::Score,
            "bytes" => Self::Bytes,
            "boolean" => Self::Boolean,
            "timestamp" => Self::Timestamp,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricUnit {
    fn serialize<S: serde::Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricUnit {
    fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let s = String::deserialize(de)?;
        Ok(Self::from(s.as_str()))
    }
}

// ─── Metric ──────────────────────────────────────────────────────

/// A single measurement flowing through the collector.
///
/// Metrics are append-only records: once constructed they are never mutated —
/// an "update" is a new `Metric` pushed into the buffer. Names are freeform
/// lower-snake by convention (`lcp`, `api_response_time`, `image_load_time`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub unit: MetricUnit,
    /// Creation instant, epoch milliseconds.
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Metadata,
}

impl Metric {
    /// Build a metric stamped with the current wall clock.
    pub fn now(name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            timestamp_ms: Utc::now().timestamp_millis(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}
