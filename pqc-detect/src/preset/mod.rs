//! Preset resolution
//!
//! Turns an arbitrary, possibly partial or malformed preset JSON value into a
//! fully populated [`ResolvedPreset`]. Every catalog filter, metric and
//! detector is present in the result; unknown keys are ignored; invalid
//! values fall back to catalog defaults.
//!
//! Resolution is pure and idempotent: resolving the JSON form of a resolved
//! preset yields the same preset.

pub mod detectors;

pub use detectors::{
    BlackDetectParams, DetectorConfig, DetectorParams, FreezeDetectParams, OverlayTextParams,
    SilenceDetectParams,
};

use crate::threshold::{detection_bounds, MetricThreshold};
use pqc_common::catalog::{Catalog, DetectorKind, FilterSpec, MetricSpec};
use pqc_common::{Severity, SeverityRules, ThresholdBounds};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Panel layout used when a preset names none
pub const DEFAULT_PANELS: [&str; 1] = ["Tiled Center Column"];

/// Which tracks of a kind the analysis tools should inspect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSelection {
    #[default]
    First,
    All,
}

impl TrackSelection {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("all") => TrackSelection::All,
            _ => TrackSelection::First,
        }
    }
}

/// Resolved configuration of one metric filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterConfig {
    pub id: String,
    pub enabled: bool,
    /// Keyed by metric tag key
    pub metrics: BTreeMap<String, MetricThreshold>,
}

/// A preset with every known filter, metric and detector filled in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPreset {
    pub video_tracks: TrackSelection,
    pub audio_tracks: TrackSelection,
    pub panels: Vec<String>,
    pub filters: Vec<FilterConfig>,
    #[serde(rename = "ffmpeg")]
    pub detectors: Vec<DetectorConfig>,
}

impl ResolvedPreset {
    pub fn filter(&self, id: &str) -> Option<&FilterConfig> {
        self.filters.iter().find(|f| f.id == id)
    }

    pub fn enabled_filters(&self) -> impl Iterator<Item = &FilterConfig> {
        self.filters.iter().filter(|f| f.enabled)
    }

    pub fn detector(&self, kind: DetectorKind) -> Option<&DetectorConfig> {
        self.detectors.iter().find(|d| d.id == kind)
    }

    /// The detector's config if it is present and enabled
    pub fn enabled_detector(&self, kind: DetectorKind) -> Option<&DetectorConfig> {
        self.detector(kind).filter(|d| d.enabled)
    }

    /// JSON form, accepted back by [`resolve`]
    pub fn to_value(&self) -> pqc_common::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// The catalog defaults, as resolved from an empty preset
pub fn default_preset(catalog: &Catalog) -> ResolvedPreset {
    resolve(&Value::Null, catalog)
}

/// Resolve `raw` against `catalog`
///
/// Never fails: a non-object input resolves to [`default_preset`].
pub fn resolve(raw: &Value, catalog: &Catalog) -> ResolvedPreset {
    let root = raw.as_object();
    let field = |key: &str| root.and_then(|m| m.get(key));

    let filter_entries = index_by_id(field("filters"));
    let detector_entries = index_by_id(field("ffmpeg"));

    ResolvedPreset {
        video_tracks: TrackSelection::from_value(field("video_tracks")),
        audio_tracks: TrackSelection::from_value(field("audio_tracks")),
        panels: resolve_panels(field("panels")),
        filters: catalog
            .filters
            .iter()
            .map(|spec| resolve_filter(spec, filter_entries.get(spec.id).copied()))
            .collect(),
        detectors: catalog
            .detectors
            .iter()
            .map(|spec| {
                let entry = detector_entries.get(spec.kind.id()).copied();
                DetectorConfig {
                    id: spec.kind,
                    enabled: resolve_enabled(entry, spec.default_enabled),
                    params: detectors::resolve_params(
                        spec,
                        entry.and_then(|e| e.get("params")).and_then(Value::as_object),
                    ),
                    default_severity: Severity::detector_tier_or_default(
                        entry.and_then(|e| e.get("default_severity")).and_then(Value::as_str),
                    ),
                }
            })
            .collect(),
    }
}

fn resolve_filter(spec: &FilterSpec, entry: Option<&Map<String, Value>>) -> FilterConfig {
    let metrics_cfg = entry.and_then(|e| e.get("metrics")).and_then(Value::as_object);

    FilterConfig {
        id: spec.id.to_string(),
        enabled: resolve_enabled(entry, spec.default_enabled),
        metrics: spec
            .metrics
            .iter()
            .map(|metric| {
                let raw = metrics_cfg.and_then(|m| m.get(metric.key));
                (metric.key.to_string(), resolve_metric(metric, raw))
            })
            .collect(),
    }
}

/// Resolve one metric entry
///
/// Two entry shapes are accepted: the structured form
/// (`{threshold, severity, default_severity}`) and the legacy form where the
/// entry itself is the base bounds (`{min, max}`).
pub fn resolve_metric(metric: &MetricSpec, raw: Option<&Value>) -> MetricThreshold {
    let entry = raw.and_then(Value::as_object);
    let structured = entry.is_some_and(|e| {
        e.contains_key("threshold") || e.contains_key("severity") || e.contains_key("default_severity")
    });

    let (threshold_src, severity_src, severity_label) = match entry {
        Some(e) if structured => (
            e.get("threshold"),
            e.get("severity").and_then(Value::as_object),
            e.get("default_severity").and_then(Value::as_str),
        ),
        Some(_) => (raw, None, None),
        None => (None, None, None),
    };

    let base = merge_bounds(threshold_src, &metric.default);
    let tier_src = |tier: &str| severity_src.and_then(|s| s.get(tier));
    let severity = SeverityRules {
        critical: merge_bounds(tier_src("critical"), &ThresholdBounds::default()),
        non_critical: merge_bounds(tier_src("non_critical"), &base),
    };

    MetricThreshold {
        threshold: detection_bounds(&base, &severity, &metric.default),
        severity,
        default_severity: Severity::rule_tier_or_default(severity_label),
    }
}

/// Overlay `source` bounds on `fallback`
///
/// A side present in `source` always wins, even when its value is unusable;
/// an unusable value clears that side.
fn merge_bounds(source: Option<&Value>, fallback: &ThresholdBounds) -> ThresholdBounds {
    let Some(source) = source.and_then(Value::as_object) else {
        return *fallback;
    };

    let side = |key: &str, fallback: Option<f64>| match source.get(key) {
        Some(value) => coerce_f64(value),
        None => fallback,
    };

    ThresholdBounds {
        min: side("min", fallback.min),
        max: side("max", fallback.max),
    }
}

fn resolve_panels(value: Option<&Value>) -> Vec<String> {
    let panels: Vec<String> = value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if panels.is_empty() {
        DEFAULT_PANELS.iter().map(|p| p.to_string()).collect()
    } else {
        panels
    }
}

fn resolve_enabled(entry: Option<&Map<String, Value>>, default: bool) -> bool {
    match entry.and_then(|e| e.get("enabled")) {
        Some(value) => is_truthy(value),
        None => default,
    }
}

/// Index an array of `{id, ...}` objects by id; later duplicates win
fn index_by_id(value: Option<&Value>) -> HashMap<&str, &Map<String, Value>> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(|entry| Some((entry.get("id")?.as_str()?, entry)))
        .collect()
}

/// Loose JSON truthiness for `enabled` flags
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Finite number from a JSON number or numeric string
pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> &'static Catalog {
        Catalog::builtin()
    }

    fn metric(filter: &str, key: &str) -> &'static MetricSpec {
        catalog().filter(filter).unwrap().metric(key).unwrap()
    }

    #[test]
    fn test_non_object_resolves_to_defaults() {
        let preset = resolve(&json!([1, 2, 3]), catalog());
        assert_eq!(preset, default_preset(catalog()));
        assert_eq!(preset.video_tracks, TrackSelection::First);
        assert_eq!(preset.panels, vec!["Tiled Center Column".to_string()]);
        assert_eq!(preset.filters.len(), catalog().filters.len());
        assert_eq!(preset.detectors.len(), catalog().detectors.len());
    }

    #[test]
    fn test_default_metric_threshold() {
        let resolved = resolve_metric(metric("signalstats", "lavfi.signalstats.YAVG"), None);
        assert_eq!(resolved.threshold, ThresholdBounds::range(16.0, 235.0));
        assert_eq!(resolved.severity.non_critical, ThresholdBounds::range(16.0, 235.0));
        assert!(resolved.severity.critical.is_empty());
        assert_eq!(resolved.default_severity, Severity::NonCritical);
    }

    #[test]
    fn test_track_selection_collapses() {
        let preset = resolve(&json!({ "video_tracks": "ALL", "audio_tracks": "second" }), catalog());
        assert_eq!(preset.video_tracks, TrackSelection::All);
        assert_eq!(preset.audio_tracks, TrackSelection::First);

        let preset = resolve(&json!({ "video_tracks": 3 }), catalog());
        assert_eq!(preset.video_tracks, TrackSelection::First);
    }

    #[test]
    fn test_legacy_metric_entry_is_base_bounds() {
        let raw = json!({ "min": "10", "max": 200 });
        let resolved = resolve_metric(metric("signalstats", "lavfi.signalstats.YAVG"), Some(&raw));

        // Defaults (16..235) still tighten detection on the min side
        assert_eq!(resolved.threshold, ThresholdBounds::range(16.0, 200.0));
        assert_eq!(resolved.severity.non_critical, ThresholdBounds::range(10.0, 200.0));
    }

    #[test]
    fn test_structured_entry_with_tiers() {
        let raw = json!({
            "threshold": { "max": 240 },
            "severity": {
                "critical": { "max": 250 },
                "non_critical": { "max": 238 }
            },
            "default_severity": "critical"
        });
        let resolved = resolve_metric(metric("signalstats", "lavfi.signalstats.YMAX"), Some(&raw));

        assert_eq!(resolved.threshold, ThresholdBounds::max(235.0));
        assert_eq!(resolved.severity.critical, ThresholdBounds::max(250.0));
        assert_eq!(resolved.severity.non_critical, ThresholdBounds::max(238.0));
        assert_eq!(resolved.default_severity, Severity::Critical);
    }

    #[test]
    fn test_invalid_default_severity_is_corrected() {
        let raw = json!({ "default_severity": "catastrophic" });
        let resolved = resolve_metric(metric("entropy", "lavfi.entropy.Y"), Some(&raw));
        assert_eq!(resolved.default_severity, Severity::NonCritical);

        let raw = json!({ "default_severity": "informational" });
        let resolved = resolve_metric(metric("entropy", "lavfi.entropy.Y"), Some(&raw));
        assert_eq!(resolved.default_severity, Severity::NonCritical);
    }

    #[test]
    fn test_present_but_unusable_side_clears_it() {
        let raw = json!({ "threshold": { "min": null } });
        let resolved = resolve_metric(metric("signalstats", "lavfi.signalstats.YAVG"), Some(&raw));

        // Base lost its min, but the compiled default still applies to detection
        assert_eq!(resolved.severity.non_critical, ThresholdBounds::max(235.0));
        assert_eq!(resolved.threshold, ThresholdBounds::range(16.0, 235.0));
    }

    #[test]
    fn test_enabled_flags_use_truthiness() {
        let preset = resolve(
            &json!({
                "filters": [
                    { "id": "blockdetect", "enabled": 1 },
                    { "id": "signalstats", "enabled": null },
                    "not-an-object",
                    { "id": "unknown-filter", "enabled": true }
                ],
                "ffmpeg": [
                    { "id": "overlaytext", "enabled": false, "default_severity": "informational" }
                ]
            }),
            catalog(),
        );

        assert!(preset.filter("blockdetect").unwrap().enabled);
        assert!(!preset.filter("signalstats").unwrap().enabled);
        // Catalog default untouched
        assert!(preset.filter("entropy").unwrap().enabled);
        assert!(preset.filter("unknown-filter").is_none());

        let overlay = preset.detector(DetectorKind::OverlayText).unwrap();
        assert!(!overlay.enabled);
        assert_eq!(overlay.default_severity, Severity::Informational);
        assert!(preset.enabled_detector(DetectorKind::OverlayText).is_none());
    }

    #[test]
    fn test_later_duplicate_entries_win() {
        let preset = resolve(
            &json!({
                "filters": [
                    { "id": "blurdetect", "enabled": true },
                    { "id": "blurdetect", "enabled": false }
                ]
            }),
            catalog(),
        );
        assert!(!preset.filter("blurdetect").unwrap().enabled);
    }

    #[test]
    fn test_panels_fall_back_when_empty() {
        let preset = resolve(&json!({ "panels": [] }), catalog());
        assert_eq!(preset.panels, vec!["Tiled Center Column".to_string()]);

        let preset = resolve(&json!({ "panels": ["Luma", 7, "Audio"] }), catalog());
        assert_eq!(preset.panels, vec!["Luma".to_string(), "Audio".to_string()]);
    }

    #[test]
    fn test_coerce_rejects_non_finite() {
        assert_eq!(coerce_f64(&json!("NaN")), None);
        assert_eq!(coerce_f64(&json!("inf")), None);
        assert_eq!(coerce_f64(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(coerce_f64(&json!(true)), None);
    }
}
