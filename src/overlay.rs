//! Developer overlay: read-only HTTP surface over the in-memory metrics.
//!
//! Exposes the collector's snapshot and stats plus an SSE stream for a live
//! debug view. No storage, no querying — the remote endpoint owns that.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;

use crate::collector::MetricStats;
use crate::metric::Metric;
use crate::PerformanceMonitor;

/// Everything the overlay pushes per SSE tick.
#[derive(Debug, Clone, Serialize)]
pub struct OverlaySnapshot {
    pub metrics: Vec<Metric>,
    pub stats: HashMap<String, MetricStats>,
    pub active_sources: Vec<String>,
    pub inactive_sources: Vec<String>,
}

fn snapshot(monitor: &PerformanceMonitor) -> OverlaySnapshot {
    OverlaySnapshot {
        metrics: monitor.metrics(),
        stats: monitor.stats(),
        active_sources: monitor.active_sources(),
        inactive_sources: monitor.inactive_sources(),
    }
}

/// Builds the overlay router. Mount it wherever the host app serves its
/// admin surface.
pub fn router(monitor: Arc<PerformanceMonitor>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .route("/metrics/stats", get(get_stats))
        .route("/metrics/stream", get(metrics_stream))
        .with_state(monitor)
        .layer(CorsLayer::permissive())
}

// ─── GET /metrics ────────────────────────────────────────────────

async fn get_metrics(State(monitor): State<Arc<PerformanceMonitor>>) -> Json<Vec<Metric>> {
    Json(monitor.metrics())
}

// ─── GET /metrics/stats ──────────────────────────────────────────

async fn get_stats(
    State(monitor): State<Arc<PerformanceMonitor>>,
) -> Json<HashMap<String, MetricStats>> {
    Json(monitor.stats())
}

// ─── GET /metrics/stream ─────────────────────────────────────────
/// Pushes a full [`OverlaySnapshot`] as JSON every 2 s.

async fn metrics_stream(
    State(monitor): State<Arc<PerformanceMonitor>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let ticks = tokio::time::interval(Duration::from_secs(2));

    let stream = IntervalStream::new(ticks).map(move |_| {
        let json = serde_json::to_string(&snapshot(&monitor)).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
