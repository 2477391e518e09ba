//! Single integration point with the Web Vitals measurement engine.
//!
//! Whatever drives the measurements (the browser library in the original
//! deployment, synthetic vitals in tests) invokes [`VitalsBridge::on_vital`];
//! the bridge records into the collector first, then fans out to the budget
//! monitor, the optional external analytics callback, and the optional
//! per-vital report path. Nothing downstream of the record step can prevent
//! the metric from landing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::budget::BudgetMonitor;
use crate::collector::Collector;
use crate::metric::{Metadata, MetricUnit};
use crate::transport::{Transport, VitalReport};

// ─── Vital model ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VitalKind {
    Cls,
    /// First-input delay / interaction-to-next-paint.
    Fid,
    Fcp,
    Lcp,
    Ttfb,
}

impl VitalKind {
    pub const ALL: [VitalKind; 5] = [Self::Cls, Self::Fid, Self::Fcp, Self::Lcp, Self::Ttfb];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cls => "cls",
            Self::Fid => "fid",
            Self::Fcp => "fcp",
            Self::Lcp => "lcp",
            Self::Ttfb => "ttfb",
        }
    }

    /// CLS is a unitless score; everything else is milliseconds.
    pub fn unit(&self) -> MetricUnit {
        match self {
            Self::Cls => MetricUnit::Score,
            _ => MetricUnit::Ms,
        }
    }
}

/// The measurement engine's own good/needs-improvement/poor classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::NeedsImprovement => "needs-improvement",
            Self::Poor => "poor",
        }
    }
}

/// One measurement from the engine. `id` identifies the measurement instance
/// — CLS and LCP report multiple times per page, and the id is what lets a
/// consumer collapse them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vital {
    #[serde(rename = "name")]
    pub kind: VitalKind,
    pub value: f64,
    pub rating: Rating,
    pub delta: f64,
    pub id: String,
}

impl Vital {
    /// Integer value for analytics events: CLS scaled x1000 to preserve
    /// precision, everything else rounded milliseconds.
    pub fn analytics_value(&self) -> i64 {
        match self.kind {
            VitalKind::Cls => (self.value * 1000.0).round() as i64,
            _ => self.value.round() as i64,
        }
    }
}

// ─── Bridge ──────────────────────────────────────────────────────

/// External analytics hook. An `Err` is logged and swallowed; it never
/// interrupts metric recording.
pub type VitalCallback = Box<dyn Fn(&Vital) -> anyhow::Result<()> + Send + Sync>;

pub struct VitalsBridge {
    collector: Arc<Collector>,
    budget: Option<BudgetMonitor>,
    callback: Option<VitalCallback>,
    reporter: Option<Arc<dyn Transport>>,
    session_id: String,
}

impl VitalsBridge {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            collector,
            budget: None,
            callback: None,
            reporter: None,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_budget_monitor(mut self, monitor: BudgetMonitor) -> Self {
        self.budget = Some(monitor);
        self
    }

    pub fn with_callback(mut self, callback: VitalCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Attach the independent per-vital reporting path.
    pub fn with_reporter(mut self, reporter: Arc<dyn Transport>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Entry point invoked by the measurement engine, once per reported
    /// vital (possibly several times per page for CLS/LCP).
    pub fn on_vital(&self, vital: Vital) {
        // Record first; everything after this is best-effort fan-out.
        self.collector.track_custom(
            vital.kind.name(),
            vital.value,
            vital.kind.unit(),
            Some(Metadata::from([
                ("rating".into(), json!(vital.rating.as_str())),
                ("delta".into(), json!(vital.delta)),
                ("id".into(), json!(vital.id)),
            ])),
        );

        if let Some(budget) = &self.budget {
            budget.check(&vital, &self.collector);
        }

        if let Some(callback) = &self.callback {
            if let Err(e) = callback(&vital) {
                tracing::warn!(
                    vital = vital.kind.name(),
                    error = %e,
                    "vitals callback failed"
                );
            }
        }

        if let Some(reporter) = &self.reporter {
            self.report(reporter, &vital);
        }
    }

    /// Fire-and-forget single-vital report: `{sessionId, metric, analytics}`.
    fn report(&self, reporter: &Arc<dyn Transport>, vital: &Vital) {
        let report = VitalReport {
            session_id: &self.session_id,
            metric: vital,
            analytics: vital.analytics_value(),
        };
        let body = match serde_json::to_value(&report) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(error = %e, "vital report encode failed");
                return;
            }
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime for vital report, skipping");
            return;
        };
        let reporter = Arc::clone(reporter);
        handle.spawn(async move {
            if let Err(e) = reporter.deliver(body).await {
                tracing::debug!(error = %e, "vital report delivery failed");
            }
        });
    }
}
