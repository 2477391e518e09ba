use serde_json::json;

use crate::metric::{Metadata, Metric, MetricUnit};
use crate::sources::InstrumentSource;
use crate::timeline::{EntryKind, PerformanceEntry};

/// Reports `static_resource_load` for the application's own assets.
///
/// Only resources whose URL contains the configured asset prefix are
/// reported — third-party and CDN entries would otherwise dominate the
/// buffer.
pub struct ResourceSource {
    asset_prefix: String,
}

const KINDS: [EntryKind; 1] = [EntryKind::Resource];

impl ResourceSource {
    pub fn new(asset_prefix: &str) -> Self {
        Self {
            asset_prefix: asset_prefix.to_string(),
        }
    }
}

impl InstrumentSource for ResourceSource {
    fn name(&self) -> &str {
        "resource"
    }

    fn kinds(&self) -> &[EntryKind] {
        &KINDS
    }

    fn observe(&mut self, entry: &PerformanceEntry) -> Vec<Metric> {
        let PerformanceEntry::Resource {
            name,
            transfer_size,
            initiator,
            duration_ms,
        } = entry
        else {
            return Vec::new();
        };
        if !name.contains(&self.asset_prefix) {
            return Vec::new();
        }
        vec![
            Metric::now("static_resource_load", *duration_ms, MetricUnit::Ms).with_metadata(
                Metadata::from([
                    ("name".into(), json!(name)),
                    ("size".into(), json!(transfer_size)),
                    ("type".into(), json!(initiator)),
                ]),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str) -> PerformanceEntry {
        PerformanceEntry::Resource {
            name: name.into(),
            transfer_size: 34_000,
            initiator: "img".into(),
            duration_ms: 88.0,
        }
    }

    #[test]
    fn only_own_assets_are_reported() {
        let mut source = ResourceSource::new("/static/");

        let metrics = source.observe(&resource("https://example.org/static/artwork.webp"));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name, "static_resource_load");
        assert_eq!(metrics[0].metadata["size"], 34_000);
        assert_eq!(metrics[0].metadata["type"], "img");

        // Third-party / CDN noise is filtered out
        assert!(source
            .observe(&resource("https://cdn.analytics.example/tag.js"))
            .is_empty());
    }
}
