//! Per-frame metric violation tracking
//!
//! Each (filter, metric) pair owns a [`ViolationTracker`], a small state
//! machine that merges consecutive violating samples into one issue.
//! [`StreamEventTracker`] drives a whole frame stream through the trackers
//! of every enabled filter and collects per-metric statistics on the way.

use crate::preset::ResolvedPreset;
use crate::threshold::MetricThreshold;
use pqc_common::catalog::{Catalog, FilterSpec, MetricSpec};
use pqc_common::{
    Issue, IssueDetails, IssueSource, Severity, SeverityRules, ThresholdBounds, ViolationReason,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// One metric reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds from the start of the media
    pub timestamp: f64,
    /// Frame duration in seconds
    pub duration: f64,
    pub value: f64,
}

/// One frame of the analyzer's tag stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub duration: f64,
    /// Metric tag key → raw textual value
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Open violation run
#[derive(Debug, Clone, Copy)]
struct OpenViolation {
    /// Reason observed when the run opened; drives classification
    reason: ViolationReason,
    start: f64,
    end: f64,
    duration: f64,
    peak: f64,
}

/// Violation state machine for a single metric
#[derive(Debug, Clone)]
pub struct ViolationTracker {
    filter_id: String,
    metric_key: String,
    label: String,
    threshold: MetricThreshold,
    open: Option<OpenViolation>,
}

impl ViolationTracker {
    pub fn new(filter_id: &str, metric: &MetricSpec, threshold: MetricThreshold) -> Self {
        Self {
            filter_id: filter_id.to_string(),
            metric_key: metric.key.to_string(),
            label: metric.label.to_string(),
            threshold,
            open: None,
        }
    }

    pub fn threshold(&self) -> &MetricThreshold {
        &self.threshold
    }

    /// Whether a violation run is currently open
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Feed one sample; returns an issue when a violation run closes
    ///
    /// Samples with a non-finite value or timestamp are ignored and do not
    /// close an open run.
    pub fn observe(&mut self, sample: &Sample) -> Option<Issue> {
        if !sample.value.is_finite() || !sample.timestamp.is_finite() {
            return None;
        }
        let frame_duration = if sample.duration.is_finite() {
            sample.duration
        } else {
            0.0
        };

        let Some(reason) = self.threshold.evaluate(sample.value) else {
            return self.close();
        };

        if let Some(open) = self.open.as_mut() {
            open.end = sample.timestamp;
            open.duration += frame_duration;
            // Peak comparison follows the current sample's reason, even if
            // the run opened on the other side of the range. A run that
            // flips sides keeps its opening reason for classification,
            // which can pair a low peak with an above-max rule.
            if reason.is_more_extreme(sample.value, open.peak) {
                open.peak = sample.value;
            }
        } else {
            self.open = Some(OpenViolation {
                reason,
                start: sample.timestamp,
                end: sample.timestamp,
                duration: frame_duration,
                peak: sample.value,
            });
        }
        None
    }

    /// Force-close any open run at end of stream
    pub fn finish(&mut self) -> Option<Issue> {
        self.close()
    }

    fn close(&mut self) -> Option<Issue> {
        let run = self.open.take()?;
        let severity = self.threshold.classify(Some(run.peak), run.reason);

        Some(Issue {
            event: format!("{} {}", self.label, run.reason.label()),
            source: IssueSource::QcTools,
            filter: Some(self.filter_id.clone()),
            metric_key: Some(self.metric_key.clone()),
            start_time: run.start,
            end_time: run.end,
            duration: run.duration.max(0.0),
            severity,
            details: IssueDetails::Threshold {
                peak: run.peak,
                condition: self.threshold.condition(),
                severity_bounds: self.threshold.severity,
                severity_rule: self.threshold.severity_rule(severity, run.reason),
            },
        })
    }
}

/// Running min/max/mean over accepted values
#[derive(Debug, Clone, Copy, Default)]
struct MetricStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl MetricStats {
    fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.sum += value;
        self.count += 1;
    }

    fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Statistics and effective configuration of one metric after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub key: String,
    pub label: String,
    pub unit: String,
    pub hint: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
    pub threshold: ThresholdBounds,
    pub severity: SeverityRules,
    pub default_severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub metrics: Vec<MetricSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStatistics {
    pub frames: u64,
    pub filters_run: Vec<String>,
}

/// Output of a frame stream run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamOutput {
    pub issues: Vec<Issue>,
    pub filters: Vec<FilterSummary>,
    pub statistics: StreamStatistics,
}

struct MetricSlot {
    spec: MetricSpec,
    tracker: ViolationTracker,
    stats: MetricStats,
}

struct FilterSlot {
    spec: FilterSpec,
    metrics: Vec<MetricSlot>,
}

/// Drives a frame stream through every enabled filter's metric trackers
pub struct StreamEventTracker {
    filters: Vec<FilterSlot>,
    frames: u64,
    issues: Vec<Issue>,
}

impl StreamEventTracker {
    /// Build trackers for the filters `preset` enables, in catalog order
    pub fn new(preset: &ResolvedPreset, catalog: &Catalog) -> Self {
        let filters = catalog
            .filters
            .iter()
            .filter_map(|spec| {
                let config = preset.filter(spec.id).filter(|f| f.enabled)?;
                let metrics = spec
                    .metrics
                    .iter()
                    .filter_map(|metric| {
                        let threshold = *config.metrics.get(metric.key)?;
                        Some(MetricSlot {
                            spec: metric.clone(),
                            tracker: ViolationTracker::new(spec.id, metric, threshold),
                            stats: MetricStats::default(),
                        })
                    })
                    .collect();
                Some(FilterSlot {
                    spec: spec.clone(),
                    metrics,
                })
            })
            .collect();

        Self {
            filters,
            frames: 0,
            issues: Vec::new(),
        }
    }

    /// Feed one frame; missing or unparsable tag values are skipped
    ///
    /// A frame without a finite timestamp is dropped whole, so it counts
    /// towards neither violation tracking nor statistics.
    pub fn observe(&mut self, frame: &FrameRecord) {
        if !frame.timestamp.is_finite() {
            debug!(timestamp = frame.timestamp, "Skipping frame with non-finite timestamp");
            return;
        }
        for filter in &mut self.filters {
            for slot in &mut filter.metrics {
                let Some(raw) = frame.tags.get(slot.spec.key) else {
                    continue;
                };
                let value = match raw.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => {
                        debug!(
                            metric = slot.spec.key,
                            timestamp = frame.timestamp,
                            "Skipping non-numeric metric value {:?}",
                            raw
                        );
                        continue;
                    }
                };

                slot.stats.record(value);
                let sample = Sample {
                    timestamp: frame.timestamp,
                    duration: frame.duration,
                    value,
                };
                if let Some(issue) = slot.tracker.observe(&sample) {
                    self.issues.push(issue);
                }
            }
        }
        self.frames += 1;
    }

    /// Close open runs and summarize
    pub fn finish(mut self) -> StreamOutput {
        for filter in &mut self.filters {
            for slot in &mut filter.metrics {
                if let Some(issue) = slot.tracker.finish() {
                    self.issues.push(issue);
                }
            }
        }

        self.issues
            .sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        let statistics = StreamStatistics {
            frames: self.frames,
            filters_run: self.filters.iter().map(|f| f.spec.id.to_string()).collect(),
        };

        let filters = self
            .filters
            .into_iter()
            .map(|filter| FilterSummary {
                id: filter.spec.id.to_string(),
                name: filter.spec.name.to_string(),
                category: filter.spec.category.to_string(),
                description: filter.spec.description.to_string(),
                metrics: filter
                    .metrics
                    .iter()
                    .map(|slot| {
                        let threshold = slot.tracker.threshold();
                        MetricSummary {
                            key: slot.spec.key.to_string(),
                            label: slot.spec.label.to_string(),
                            unit: slot.spec.unit.to_string(),
                            hint: slot.spec.hint.to_string(),
                            min: slot.stats.min(),
                            max: slot.stats.max(),
                            average: slot.stats.average(),
                            threshold: threshold.threshold,
                            severity: threshold.severity,
                            default_severity: threshold.default_severity,
                        }
                    })
                    .collect(),
            })
            .collect();

        info!(
            frames = statistics.frames,
            filters = statistics.filters_run.len(),
            issues = self.issues.len(),
            "Frame stream analysis complete"
        );

        StreamOutput {
            issues: self.issues,
            filters,
            statistics,
        }
    }

    /// Run a whole frame stream
    pub fn run<'a, I>(preset: &ResolvedPreset, catalog: &Catalog, frames: I) -> StreamOutput
    where
        I: IntoIterator<Item = &'a FrameRecord>,
    {
        let mut tracker = Self::new(preset, catalog);
        for frame in frames {
            tracker.observe(frame);
        }
        tracker.finish()
    }
}
