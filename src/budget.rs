//! Real-time guardrail over the Web Vitals stream.
//!
//! Values at or under budget are silence; a violation produces exactly one
//! warning and one `budget_violation` metric. Independent of dashboarding.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::collector::Collector;
use crate::metric::Metadata;
use crate::vitals::{Vital, VitalKind};

/// Per-vital thresholds (ms, except the unitless CLS score).
#[derive(Debug, Clone, Deserialize)]
pub struct VitalBudgets {
    #[serde(default = "default_lcp")]
    pub lcp_ms: f64,
    #[serde(default = "default_fid")]
    pub fid_ms: f64,
    #[serde(default = "default_cls")]
    pub cls: f64,
    #[serde(default = "default_fcp")]
    pub fcp_ms: f64,
    #[serde(default = "default_ttfb")]
    pub ttfb_ms: f64,
}

fn default_lcp() -> f64 {
    2500.0
}

fn default_fid() -> f64 {
    100.0
}

fn default_cls() -> f64 {
    0.1
}

fn default_fcp() -> f64 {
    1800.0
}

fn default_ttfb() -> f64 {
    800.0
}

impl Default for VitalBudgets {
    fn default() -> Self {
        Self {
            lcp_ms: default_lcp(),
            fid_ms: default_fid(),
            cls: default_cls(),
            fcp_ms: default_fcp(),
            ttfb_ms: default_ttfb(),
        }
    }
}

impl VitalBudgets {
    /// Stricter profile with the 600 ms TTFB target.
    pub fn strict() -> Self {
        Self {
            ttfb_ms: 600.0,
            ..Self::default()
        }
    }

    pub fn budget_for(&self, kind: VitalKind) -> f64 {
        match kind {
            VitalKind::Lcp => self.lcp_ms,
            VitalKind::Fid => self.fid_ms,
            VitalKind::Cls => self.cls,
            VitalKind::Fcp => self.fcp_ms,
            VitalKind::Ttfb => self.ttfb_ms,
        }
    }
}

pub struct BudgetMonitor {
    budgets: VitalBudgets,
}

impl BudgetMonitor {
    pub fn new(budgets: VitalBudgets) -> Self {
        Self { budgets }
    }

    /// Compare one vital against its budget; emit a warning plus a
    /// `budget_violation` metric when it is strictly over.
    pub fn check(&self, vital: &Vital, collector: &Arc<Collector>) {
        let budget = self.budgets.budget_for(vital.kind);
        if vital.value <= budget {
            return;
        }
        let violation = vital.value - budget;
        tracing::warn!(
            metric = vital.kind.name(),
            value = vital.value,
            budget,
            "performance budget exceeded"
        );
        collector.track_custom(
            "budget_violation",
            violation,
            vital.kind.unit(),
            Some(Metadata::from([
                ("metric".into(), json!(vital.kind.name())),
                ("budget".into(), json!(budget)),
                ("violation".into(), json!(violation)),
            ])),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::vitals::Rating;

    fn collector() -> Arc<Collector> {
        Arc::new(Collector::new(&MonitorConfig::default(), None, None))
    }

    fn vital(kind: VitalKind, value: f64) -> Vital {
        Vital {
            kind,
            value,
            rating: Rating::Good,
            delta: value,
            id: "v-1".into(),
        }
    }

    #[test]
    fn within_budget_is_silent() {
        let monitor = BudgetMonitor::new(VitalBudgets::default());
        let c = collector();
        monitor.check(&vital(VitalKind::Lcp, 2000.0), &c);
        // At budget is still within budget
        monitor.check(&vital(VitalKind::Lcp, 2500.0), &c);
        assert!(c.is_empty());
    }

    #[test]
    fn violation_emits_exactly_one_metric_with_overshoot() {
        let monitor = BudgetMonitor::new(VitalBudgets::default());
        let c = collector();
        monitor.check(&vital(VitalKind::Lcp, 3100.0), &c);

        let metrics = c.metrics();
        assert_eq!(metrics.len(), 1);
        let m = &metrics[0];
        assert_eq!(m.name, "budget_violation");
        assert_eq!(m.value, 600.0);
        assert_eq!(m.metadata["metric"], "lcp");
        assert_eq!(m.metadata["budget"], 2500.0);
        assert_eq!(m.metadata["violation"], 600.0);
    }

    #[test]
    fn cls_uses_score_budget() {
        let monitor = BudgetMonitor::new(VitalBudgets::default());
        let c = collector();
        monitor.check(&vital(VitalKind::Cls, 0.09), &c);
        assert!(c.is_empty());
        monitor.check(&vital(VitalKind::Cls, 0.35), &c);
        let metrics = c.metrics();
        assert_eq!(metrics.len(), 1);
        assert!((metrics[0].value - 0.25).abs() < 1e-9);
    }

    #[test]
    fn strict_profile_lowers_ttfb_target() {
        let monitor = BudgetMonitor::new(VitalBudgets::strict());
        let c = collector();
        monitor.check(&vital(VitalKind::Ttfb, 700.0), &c);
        assert_eq!(c.len(), 1);
    }
}
