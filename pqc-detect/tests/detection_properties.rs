//! Behavioral properties of the detection core
//!
//! Covers the invariants every producer must hold regardless of input:
//! violation merging, severity tiers, peak tracking, idempotent preset
//! resolution, overlay clustering, marker pairing and stream-end closing.

use pqc_common::catalog::MetricSpec;
use pqc_common::{Catalog, DetectorKind, Issue, IssueDetails, Severity, SeverityRules, ThresholdBounds};
use pqc_detect::preset::{default_preset, resolve, resolve_metric};
use pqc_detect::services::line_protocol::parse_log;
use pqc_detect::services::overlay_tracker::{self, OcrBatch, OcrDetection};
use pqc_detect::services::stream_tracker::{Sample, ViolationTracker};
use pqc_detect::threshold::MetricThreshold;
use serde_json::{json, Value};

fn metric_spec() -> MetricSpec {
    MetricSpec {
        key: "lavfi.signalstats.YMAX",
        label: "Luma Maximum (Y)",
        unit: "code value",
        default: ThresholdBounds::default(),
        hint: "",
    }
}

fn tracker(threshold: MetricThreshold) -> ViolationTracker {
    ViolationTracker::new("signalstats", &metric_spec(), threshold)
}

fn simple_tracker(bounds: ThresholdBounds) -> ViolationTracker {
    tracker(MetricThreshold {
        threshold: bounds,
        severity: SeverityRules::default(),
        default_severity: Severity::NonCritical,
    })
}

/// Feed `values` at 1 s spacing with 0.5 s frame durations, then close the stream
fn run(tracker: &mut ViolationTracker, values: &[f64]) -> Vec<Issue> {
    let mut issues: Vec<Issue> = values
        .iter()
        .enumerate()
        .filter_map(|(i, &value)| {
            tracker.observe(&Sample {
                timestamp: i as f64,
                duration: 0.5,
                value,
            })
        })
        .collect();
    issues.extend(tracker.finish());
    issues
}

fn peak(issue: &Issue) -> f64 {
    match &issue.details {
        IssueDetails::Threshold { peak, .. } => *peak,
        other => panic!("expected threshold details, got {other:?}"),
    }
}

// ============================================================================
// Merging invariant
// ============================================================================

#[test]
fn test_continuous_violation_yields_single_issue() {
    let mut t = simple_tracker(ThresholdBounds::max(100.0));
    let issues = run(&mut t, &[50.0, 150.0, 160.0, 170.0, 180.0, 50.0]);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].start_time, 1.0);
    assert_eq!(issues[0].end_time, 4.0);
    assert_eq!(issues[0].duration, 2.0);
}

#[test]
fn test_separate_runs_yield_separate_issues() {
    let mut t = simple_tracker(ThresholdBounds::max(100.0));
    let issues = run(&mut t, &[150.0, 50.0, 150.0]);

    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].start_time, 0.0);
    assert_eq!(issues[1].start_time, 2.0);
}

// ============================================================================
// Severity tiers
// ============================================================================

/// non_critical.max < critical.max < base.max: the non-critical band sits
/// between the two tier ceilings and detection uses the tightest maximum.
#[test]
fn test_severity_bands_above_max() {
    let raw = json!({
        "threshold": { "max": 250 },
        "severity": {
            "critical": { "max": 240 },
            "non_critical": { "max": 220 }
        }
    });
    let threshold = resolve_metric(&metric_spec(), Some(&raw));
    assert_eq!(threshold.threshold.max, Some(220.0));

    let classify = |value: f64| {
        let mut t = tracker(threshold);
        let issues = run(&mut t, &[value]);
        issues.first().map(|issue| issue.severity)
    };

    assert_eq!(classify(245.0), Some(Severity::Critical));
    assert_eq!(classify(230.0), Some(Severity::NonCritical));
    assert_eq!(classify(240.0), Some(Severity::NonCritical));
    assert_eq!(classify(220.0), None);
    assert_eq!(classify(200.0), None);
}

/// With the critical ceiling below the non-critical one, every violation is
/// already above the critical ceiling.
#[test]
fn test_inverted_tier_ceilings_classify_critical() {
    let raw = json!({
        "threshold": { "max": 250 },
        "severity": {
            "critical": { "max": 220 },
            "non_critical": { "max": 240 }
        }
    });
    let threshold = resolve_metric(&metric_spec(), Some(&raw));
    assert_eq!(threshold.threshold.max, Some(220.0));

    for value in [221.0, 235.0, 245.0] {
        let mut t = tracker(threshold);
        let issues = run(&mut t, &[value]);
        assert_eq!(issues[0].severity, Severity::Critical, "value {value}");
    }
}

#[test]
fn test_default_severity_applies_when_no_tier_matches() {
    let raw = json!({
        "threshold": { "min": 10 },
        "severity": { "critical": { "min": 0 } },
        "default_severity": "critical"
    });
    let threshold = resolve_metric(&metric_spec(), Some(&raw));
    assert_eq!(threshold.default_severity, Severity::Critical);

    // non_critical inherits the base minimum and matches before the default
    let mut t = tracker(threshold);
    let issues = run(&mut t, &[5.0]);
    assert_eq!(issues[0].severity, Severity::NonCritical);

    let mut t = tracker(MetricThreshold {
        severity: SeverityRules::default(),
        ..threshold
    });
    let issues = run(&mut t, &[5.0]);
    assert_eq!(issues[0].severity, Severity::Critical);
}

// ============================================================================
// Peak tracking
// ============================================================================

#[test]
fn test_peak_above_max() {
    let mut t = simple_tracker(ThresholdBounds::max(5.0));
    let issues = run(&mut t, &[10.0, 15.0, 12.0]);
    assert_eq!(peak(&issues[0]), 15.0);
}

#[test]
fn test_peak_below_min() {
    let mut t = simple_tracker(ThresholdBounds::min(0.0));
    let issues = run(&mut t, &[-5.0, -20.0, -1.0]);
    assert_eq!(peak(&issues[0]), -20.0);
}

// ============================================================================
// Idempotent resolution
// ============================================================================

fn assert_idempotent(raw: Value) {
    let catalog = Catalog::builtin();
    let once = resolve(&raw, catalog);
    let twice = resolve(&once.to_value().unwrap(), catalog);
    assert_eq!(once, twice, "resolution not idempotent for {raw}");
}

#[test]
fn test_resolution_is_idempotent() {
    assert_idempotent(Value::Null);
    assert_idempotent(json!("not a preset"));
    assert_idempotent(json!({
        "video_tracks": "all",
        "panels": ["Luma"],
        "filters": [
            { "id": "signalstats", "metrics": {
                "lavfi.signalstats.YAVG": { "min": "10", "max": 200 },
                "lavfi.signalstats.YMAX": {
                    "threshold": { "max": null },
                    "severity": { "critical": { "max": 250 }, "non_critical": { "min": "abc" } },
                    "default_severity": "informational"
                }
            }},
            { "id": "blockdetect", "enabled": "yes" }
        ],
        "ffmpeg": [
            { "id": "blackdetect", "params": { "duration": 0 } },
            { "id": "freezedetect", "params": { "noise": -2, "duration": "3" } },
            { "id": "overlaytext", "enabled": 0, "default_severity": "informational",
              "params": { "sample_interval": 0.01, "flag_keywords": ["Alert", "Press"], "min_chars": 2.9 } }
        ]
    }));
}

#[test]
fn test_default_preset_round_trips() {
    let preset = default_preset(Catalog::builtin());
    let json = preset.to_value().unwrap();

    assert_eq!(json["video_tracks"], "first");
    assert_eq!(json["ffmpeg"][0]["id"], "blackdetect");
    assert_eq!(resolve(&json, Catalog::builtin()), preset);
}

// ============================================================================
// Overlay clustering
// ============================================================================

fn ocr(timestamp: f64, text: Option<&str>) -> OcrBatch {
    OcrBatch {
        timestamp,
        detections: text
            .map(|text| {
                vec![OcrDetection {
                    text: text.to_string(),
                    confidence: 88.0,
                    left: 40,
                    top: 600,
                    width: 300,
                    height: 36,
                }]
            })
            .unwrap_or_default(),
    }
}

#[test]
fn test_overlay_gap_splits_tracks() {
    let preset = default_preset(Catalog::builtin());
    let config = preset.detector(DetectorKind::OverlayText).unwrap();
    let params = config.overlay_params().unwrap();

    let batches = vec![
        ocr(0.0, Some("LOW BATTERY")),
        ocr(1.0, Some("LOW BATTERY")),
        ocr(2.0, Some("LOW BATTERY")),
        ocr(3.0, None),
        ocr(4.0, None),
        ocr(5.0, Some("LOW BATTERY")),
        ocr(6.0, Some("LOW BATTERY")),
    ];
    let issues = overlay_tracker::track(params, config.default_severity, &batches);

    assert_eq!(issues.len(), 2);
    assert_eq!((issues[0].start_time, issues[0].end_time), (0.0, 3.0));
    assert_eq!((issues[1].start_time, issues[1].end_time), (5.0, 7.0));
    for issue in &issues {
        assert!(issue.duration >= params.min_duration);
        assert_eq!(issue.severity, Severity::NonCritical);
    }
}

#[test]
fn test_overlay_single_missed_sample_does_not_split() {
    let preset = default_preset(Catalog::builtin());
    let config = preset.detector(DetectorKind::OverlayText).unwrap();

    let batches = vec![
        ocr(0.0, Some("LOW BATTERY")),
        ocr(1.0, Some("LOW BATTERY")),
        ocr(2.0, None),
        ocr(3.0, Some("LOW BATTERY")),
    ];
    let issues = overlay_tracker::track(config.overlay_params().unwrap(), config.default_severity, &batches);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].end_time, 4.0);
}

// ============================================================================
// Line pairing
// ============================================================================

#[test]
fn test_black_markers_pair_end_to_end() {
    let preset = default_preset(Catalog::builtin());
    let config = preset.detector(DetectorKind::BlackDetect).unwrap();
    let log = "\
Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':
[blackdetect @ 0x5581] black_start: 2.0
[blackdetect @ 0x5581] black_end: 5.0
[blackdetect @ 0x5581] black_duration: 3.0
frame= 250 fps=0.0 q=-0.0 Lsize=N/A time=00:00:10.00
";
    let issues = parse_log(config, log);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].start_time, 2.0);
    assert_eq!(issues[0].end_time, 5.0);
    assert_eq!(issues[0].duration, 3.0);
    assert_eq!(issues[0].event, "Black frame segment");
}

#[test]
fn test_freeze_markers_carry_detector_severity() {
    let preset = resolve(
        &json!({ "ffmpeg": [{ "id": "freezedetect", "default_severity": "critical" }] }),
        Catalog::builtin(),
    );
    let config = preset.detector(DetectorKind::FreezeDetect).unwrap();
    let log = "\
[freezedetect @ 0x1] lavfi.freezedetect.freeze_start: 10
[freezedetect @ 0x1] lavfi.freezedetect.freeze_duration: 4
[freezedetect @ 0x1] lavfi.freezedetect.freeze_end: 14
";
    let issues = parse_log(config, log);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Critical);
    assert_eq!(issues[0].end_time, 14.0);
    assert_eq!(
        issues[0].details,
        IssueDetails::Freeze {
            noise: 0.003,
            duration_threshold: 2.0
        }
    );
}

// ============================================================================
// Stream-end boundary
// ============================================================================

#[test]
fn test_violation_on_last_sample_is_closed() {
    let mut t = simple_tracker(ThresholdBounds::max(100.0));
    let issues = run(&mut t, &[50.0, 50.0, 150.0]);

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].start_time, 2.0);
    assert_eq!(issues[0].end_time, 2.0);
    assert!(!t.is_open());
}
