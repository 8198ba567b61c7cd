//! Marker-pair parsing of detector log text
//!
//! The line-based detectors (black frames, frozen video, silence) report
//! segments as `<label>_start:`, `<label>_end:` and `<label>_duration:`
//! markers, either on separate lines or several on one line. A
//! [`MarkerPairer`] pairs them into segments; a [`LineDetector`] turns the
//! segments into issues carrying the detector's configuration.

use crate::preset::{DetectorConfig, DetectorParams};
use pqc_common::{DetectorKind, Issue, IssueDetails, IssueSource, Severity};
use tracing::debug;

/// A closed start/end/duration triple
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Start,
    End,
    Duration,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    start: f64,
    end: Option<f64>,
}

/// Start/end/duration state machine for one marker label
#[derive(Debug, Clone)]
pub struct MarkerPairer {
    label: String,
    markers: [(Marker, String); 3],
    pending: Option<Pending>,
}

impl MarkerPairer {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            markers: [
                (Marker::Start, format!("{label}_start:")),
                (Marker::End, format!("{label}_end:")),
                (Marker::Duration, format!("{label}_duration:")),
            ],
            pending: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether a start marker is waiting for its duration
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one log line, returning the segments it completes
    ///
    /// Markers are applied in the order they appear in the line. A marker
    /// whose value does not parse is ignored; the rest of the line is still
    /// scanned.
    pub fn observe_line(&mut self, line: &str) -> Vec<Segment> {
        let mut found: Vec<(usize, Marker, &str)> = Vec::new();
        for (marker, needle) in &self.markers {
            for (pos, _) in line.match_indices(needle.as_str()) {
                found.push((pos, *marker, &line[pos + needle.len()..]));
            }
        }
        found.sort_by_key(|(pos, _, _)| *pos);

        let mut segments = Vec::new();
        for (_, marker, rest) in found {
            let Some(value) = marker_value(rest) else {
                debug!(label = %self.label, ?marker, "Ignoring unparsable marker value in {:?}", line);
                continue;
            };

            match marker {
                Marker::Start => {
                    if let Some(previous) = self.pending.replace(Pending { start: value, end: None }) {
                        debug!(label = %self.label, start = previous.start, "Dropping unfinished segment");
                    }
                }
                Marker::End => {
                    if let Some(pending) = self.pending.as_mut() {
                        pending.end = Some(value);
                    }
                }
                Marker::Duration => match self.pending.take() {
                    Some(pending) => segments.push(Segment {
                        start: pending.start,
                        end: pending.end.unwrap_or(pending.start + value),
                        duration: value,
                    }),
                    None => {
                        debug!(label = %self.label, duration = value, "Skipping duration marker without a start");
                    }
                },
            }
        }
        segments
    }
}

/// First whitespace-delimited token after a marker, as a finite number
fn marker_value(rest: &str) -> Option<f64> {
    let token = rest.split_whitespace().next()?;
    let token = token.trim_end_matches([',', ';', '|']);
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Issue producer for one line-based detector
#[derive(Debug, Clone)]
pub struct LineDetector {
    kind: DetectorKind,
    event: &'static str,
    source: IssueSource,
    severity: Severity,
    details: IssueDetails,
    pairer: MarkerPairer,
}

impl LineDetector {
    /// `None` for detectors that are not driven by log lines
    pub fn new(config: &DetectorConfig) -> Option<Self> {
        let (event, source, details) = match &config.params {
            DetectorParams::Black(p) => (
                "Black frame segment",
                IssueSource::BlackDetect,
                IssueDetails::BlackFrames {
                    picture_threshold: p.picture_threshold,
                    pixel_threshold: p.pixel_threshold,
                },
            ),
            DetectorParams::Freeze(p) => (
                "Frozen video segment",
                IssueSource::FreezeDetect,
                IssueDetails::Freeze {
                    noise: p.noise,
                    duration_threshold: p.duration,
                },
            ),
            DetectorParams::Silence(p) => (
                "Audio silence segment",
                IssueSource::SilenceDetect,
                IssueDetails::Silence {
                    noise_threshold: p.noise,
                    duration_threshold: p.duration,
                },
            ),
            DetectorParams::Overlay(_) => return None,
        };

        Some(Self {
            kind: config.id,
            event,
            source,
            severity: config.default_severity,
            details,
            pairer: MarkerPairer::new(config.id.marker_label()?),
        })
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    pub fn observe_line(&mut self, line: &str) -> Vec<Issue> {
        self.pairer
            .observe_line(line)
            .into_iter()
            .map(|segment| Issue {
                event: self.event.to_string(),
                source: self.source,
                filter: None,
                metric_key: None,
                start_time: segment.start,
                end_time: segment.end,
                duration: segment.duration,
                severity: self.severity,
                details: self.details.clone(),
            })
            .collect()
    }

    /// Parse a whole log; a segment still pending at the end is dropped
    pub fn parse(&mut self, text: &str) -> Vec<Issue> {
        let issues: Vec<Issue> = text.lines().flat_map(|line| self.observe_line(line)).collect();

        if self.pairer.has_pending() {
            debug!(detector = %self.kind, "Log ended with an unfinished segment");
        }
        debug!(detector = %self.kind, issues = issues.len(), "Parsed detector log");
        issues
    }
}

/// Parse a detector log with a fresh [`LineDetector`]
pub fn parse_log(config: &DetectorConfig, text: &str) -> Vec<Issue> {
    match LineDetector::new(config) {
        Some(mut detector) => detector.parse(text),
        None => Vec::new(),
    }
}
