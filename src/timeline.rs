//! Normalized performance events as delivered by the host environment.
//!
//! The collector never talks to a performance timeline directly; the embedding
//! application translates whatever facility it has (browser observers in the
//! original deployment, synthetic entries in tests) into [`PerformanceEntry`]
//! values and pushes them through [`crate::PerformanceMonitor::observe`].

use serde::{Deserialize, Serialize};

// ─── Entry kinds ─────────────────────────────────────────────────

/// The category of a timeline entry. Sources declare which kinds they
/// consume, and [`Capabilities`] declares which kinds the host can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Navigation,
    Paint,
    LargestContentfulPaint,
    Input,
    LayoutShift,
    Resource,
    Memory,
}

// ─── Navigation timing ───────────────────────────────────────────

/// Raw navigation-timing milestones, origin-relative milliseconds.
///
/// A milestone of `0.0` means the phase did not occur (the convention the
/// browser timeline itself uses, e.g. `secure_connection_start` on plain
/// HTTP); phase deltas derived from such milestones are dropped, not
/// reported as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationTiming {
    pub domain_lookup_start: f64,
    pub domain_lookup_end: f64,
    pub connect_start: f64,
    pub connect_end: f64,
    pub secure_connection_start: f64,
    pub request_start: f64,
    pub response_start: f64,
    pub response_end: f64,
    pub dom_interactive: f64,
    pub dom_complete: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    /// Delta between two milestones, or `None` when either milestone is
    /// missing or the pair is non-monotonic. Browsers report non-monotonic
    /// values for unsupported phases; those are silently dropped.
    pub fn span(start: f64, end: f64) -> Option<f64> {
        if start <= 0.0 || end <= 0.0 || end < start {
            None
        } else {
            Some(end - start)
        }
    }
}

// ─── Entries ─────────────────────────────────────────────────────

/// One normalized event from the host's performance timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PerformanceEntry {
    Navigation(NavigationTiming),
    /// `first-paint` / `first-contentful-paint`, hyphenated as the timeline
    /// reports them.
    Paint { name: String, start_ms: f64 },
    /// May fire multiple times before the page settles; every firing is
    /// delivered.
    LargestContentfulPaint {
        start_ms: f64,
        element: Option<String>,
    },
    /// A discrete user interaction (first-input / INP candidate).
    Input {
        event_type: String,
        start_ms: f64,
        processing_start_ms: f64,
    },
    LayoutShift {
        value: f64,
        had_recent_input: bool,
    },
    Resource {
        name: String,
        transfer_size: u64,
        initiator: String,
        duration_ms: f64,
    },
    Memory {
        used_bytes: u64,
        total_bytes: u64,
        limit_bytes: u64,
    },
}

impl PerformanceEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Navigation(_) => EntryKind::Navigation,
            Self::Paint { .. } => EntryKind::Paint,
            Self::LargestContentfulPaint { .. } => EntryKind::LargestContentfulPaint,
            Self::Input { .. } => EntryKind::Input,
            Self::LayoutShift { .. } => EntryKind::LayoutShift,
            Self::Resource { .. } => EntryKind::Resource,
            Self::Memory { .. } => EntryKind::Memory,
        }
    }
}

// ─── Capability negotiation ──────────────────────────────────────

/// What the host timeline can actually deliver.
///
/// Queried once, at source-attach time: a source whose entry kinds are not
/// supported is left inactive (logged once) instead of silently no-opping
/// from inside its observe path.
pub trait Capabilities: Send + Sync {
    fn supports(&self, kind: EntryKind) -> bool;
}

/// A host that supports every entry kind. Useful default for full-featured
/// environments and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullCapabilities;

impl Capabilities for FullCapabilities {
    fn supports(&self, _kind: EntryKind) -> bool {
        true
    }
}

/// Capability set backed by an explicit list of supported kinds.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    supported: Vec<EntryKind>,
}

impl StaticCapabilities {
    pub fn new(supported: impl Into<Vec<EntryKind>>) -> Self {
        Self {
            supported: supported.into(),
        }
    }
}

impl Capabilities for StaticCapabilities {
    fn supports(&self, kind: EntryKind) -> bool {
        self.supported.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_drops_missing_and_non_monotonic_pairs() {
        assert_eq!(NavigationTiming::span(10.0, 25.0), Some(15.0));
        assert_eq!(NavigationTiming::span(10.0, 10.0), Some(0.0));
        // Missing milestone (0.0 convention)
        assert_eq!(NavigationTiming::span(0.0, 25.0), None);
        assert_eq!(NavigationTiming::span(10.0, 0.0), None);
        // Non-monotonic
        assert_eq!(NavigationTiming::span(30.0, 25.0), None);
    }

    #[test]
    fn static_capabilities_reject_unlisted_kinds() {
        let caps = StaticCapabilities::new(vec![EntryKind::Paint, EntryKind::Navigation]);
        assert!(caps.supports(EntryKind::Paint));
        assert!(!caps.supports(EntryKind::LayoutShift));
    }
}
