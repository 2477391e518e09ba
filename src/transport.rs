//! Best-effort delivery of telemetry to the reporting endpoint.
//!
//! Two-tier strategy: a fire-and-forget beacon is preferred because it
//! survives page/process teardown without blocking; when no beacon is
//! available the batch falls back to an awaited keep-alive POST. Both paths
//! are injectable so flush semantics can be tested without a network.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::metric::Metric;
use crate::vitals::Vital;

// ─── Errors ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network-level failure (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered outside the 2xx range. Treated identically to a
    /// network failure by callers: the batch is retained for retry.
    #[error("endpoint returned status {0}")]
    Status(u16),

    /// Neither a beacon nor a fallback transport is configured.
    #[error("no transport available")]
    Unavailable,
}

// ─── Payloads ────────────────────────────────────────────────────

/// Bulk flush body: `{metrics, userAgent, url, timestamp}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushPayload<'a> {
    pub metrics: &'a [Metric],
    pub user_agent: &'a str,
    pub url: &'a str,
    /// Flush instant, epoch milliseconds.
    pub timestamp: i64,
}

/// Per-vital report body: `{sessionId, metric, analytics}` — the second,
/// independent delivery path used by the vitals bridge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReport<'a> {
    pub session_id: &'a str,
    pub metric: &'a Vital,
    /// Integer analytics value: CLS scaled x1000 to preserve precision,
    /// everything else rounded milliseconds.
    pub analytics: i64,
}

// ─── Traits ──────────────────────────────────────────────────────

/// Fire-and-forget delivery primitive. `send` returns whether the payload was
/// *accepted for queueing* — acceptance is the only confirmation a beacon
/// gives, and it counts as delivery success.
pub trait BeaconSender: Send + Sync {
    fn send(&self, body: &Value) -> bool;
}

/// Awaited delivery with a real success/failure answer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, body: Value) -> Result<(), TransportError>;
}

// ─── HTTP implementations ────────────────────────────────────────

/// Beacon over HTTP: spawns a detached POST on the current runtime and
/// reports acceptance immediately. Outside a runtime there is nothing to
/// spawn onto, so the beacon reports rejection and the caller falls back.
pub struct HttpBeacon {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBeacon {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl BeaconSender for HttpBeacon {
    fn send(&self, body: &Value) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = body.clone();
        handle.spawn(async move {
            if let Err(e) = client.post(&endpoint).json(&body).send().await {
                tracing::debug!(error = %e, "beacon delivery failed");
            }
        });
        true
    }
}

/// Keep-alive POST fallback. Non-2xx statuses and network errors are the
/// same outcome: the batch stays buffered for the next flush.
pub struct KeepaliveHttp {
    client: reqwest::Client,
    endpoint: String,
}

impl KeepaliveHttp {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .tcp_keepalive(Duration::from_secs(30))
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for KeepaliveHttp {
    async fn deliver(&self, body: Value) -> Result<(), TransportError> {
        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(resp.status().as_u16()))
        }
    }
}

// ─── Tiered strategy ─────────────────────────────────────────────

/// Beacon-first delivery with keep-alive fallback.
pub struct TieredTransport {
    beacon: Option<Box<dyn BeaconSender>>,
    fallback: Option<Box<dyn Transport>>,
}

impl TieredTransport {
    pub fn new(
        beacon: Option<Box<dyn BeaconSender>>,
        fallback: Option<Box<dyn Transport>>,
    ) -> Self {
        Self { beacon, fallback }
    }

    /// Standard HTTP stack against a single endpoint.
    pub fn http(endpoint: &str) -> Self {
        Self {
            beacon: Some(Box::new(HttpBeacon::new(endpoint))),
            fallback: Some(Box::new(KeepaliveHttp::new(endpoint))),
        }
    }
}

#[async_trait]
impl Transport for TieredTransport {
    async fn deliver(&self, body: Value) -> Result<(), TransportError> {
        if let Some(beacon) = &self.beacon {
            if beacon.send(&body) {
                return Ok(());
            }
            tracing::debug!("beacon rejected payload, falling back to keep-alive POST");
        }
        match &self.fallback {
            Some(t) => t.deliver(body).await,
            None => Err(TransportError::Unavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct RecordingBeacon {
        accept: bool,
        sent: Arc<Mutex<Vec<Value>>>,
    }

    impl BeaconSender for RecordingBeacon {
        fn send(&self, body: &Value) -> bool {
            if self.accept {
                self.sent.lock().push(body.clone());
            }
            self.accept
        }
    }

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, body: Value) -> Result<(), TransportError> {
            self.sent.lock().push(body);
            Ok(())
        }
    }

    #[tokio::test]
    async fn tiered_prefers_beacon() {
        let beacon_sent = Arc::new(Mutex::new(Vec::new()));
        let fallback_sent = Arc::new(Mutex::new(Vec::new()));
        let t = TieredTransport::new(
            Some(Box::new(RecordingBeacon {
                accept: true,
                sent: beacon_sent.clone(),
            })),
            Some(Box::new(RecordingTransport {
                sent: fallback_sent.clone(),
            })),
        );

        t.deliver(serde_json::json!({"n": 1})).await.unwrap();
        assert_eq!(beacon_sent.lock().len(), 1);
        assert!(fallback_sent.lock().is_empty());
    }

    #[tokio::test]
    async fn tiered_falls_back_when_beacon_rejects() {
        let beacon_sent = Arc::new(Mutex::new(Vec::new()));
        let fallback_sent = Arc::new(Mutex::new(Vec::new()));
        let t = TieredTransport::new(
            Some(Box::new(RecordingBeacon {
                accept: false,
                sent: beacon_sent.clone(),
            })),
            Some(Box::new(RecordingTransport {
                sent: fallback_sent.clone(),
            })),
        );

        t.deliver(serde_json::json!({"n": 2})).await.unwrap();
        assert!(beacon_sent.lock().is_empty());
        assert_eq!(fallback_sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn tiered_errors_with_nothing_configured() {
        let t = TieredTransport::new(None, None);
        let err = t.deliver(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Unavailable));
    }

    #[test]
    fn flush_payload_uses_wire_field_names() {
        use crate::metric::{Metric, MetricUnit};

        let metrics = vec![Metric::now("lcp", 1.0, MetricUnit::Ms)];
        let payload = FlushPayload {
            metrics: &metrics,
            user_agent: "ua",
            url: "/gallery",
            timestamp: 42,
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert!(v.get("userAgent").is_some());
        assert_eq!(v["metrics"].as_array().unwrap().len(), 1);
    }
}
