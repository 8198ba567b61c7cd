//! Overlay text tracking over sampled OCR detections
//!
//! OCR is run on frames sampled every `sample_interval` seconds. Detections
//! whose normalized text matches are clustered into tracks; a track that has
//! not been refreshed for more than one sample interval closes. Closed
//! tracks persisting at least `min_duration` become issues.

use crate::cache::{cache_key, CachedOverlay, OverlayCache};
use crate::preset::OverlayTextParams;
use pqc_common::{BoundingBox, Issue, IssueDetails, IssueSource, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One OCR text box
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrDetection {
    #[serde(default)]
    pub text: String,
    /// OCR confidence, 0-100
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub left: i64,
    #[serde(default)]
    pub top: i64,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

/// All detections of one sampled frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrBatch {
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<OcrDetection>,
}

/// A provisional, still-open overlay observation
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayTrack {
    /// Whitespace-collapsed text of the first sighting
    pub text: String,
    pub start: f64,
    pub last_seen: f64,
    pub samples: u32,
    pub confidence_sum: f64,
    pub keyword_hits: u32,
    pub boxes: Vec<BoundingBox>,
}

/// Overlay track state machine
#[derive(Debug, Clone)]
pub struct OverlayTrackTracker {
    params: OverlayTextParams,
    allowlist: Vec<String>,
    keywords: Vec<String>,
    default_severity: Severity,
    /// Keyed by normalized text
    tracks: BTreeMap<String, OverlayTrack>,
}

impl OverlayTrackTracker {
    pub fn new(params: &OverlayTextParams, default_severity: Severity) -> Self {
        Self {
            allowlist: params.allowlist(),
            keywords: params.keywords(),
            params: params.clone(),
            default_severity,
            tracks: BTreeMap::new(),
        }
    }

    pub fn open_tracks(&self) -> impl Iterator<Item = &OverlayTrack> {
        self.tracks.values()
    }

    /// Feed one sampled frame; returns issues for tracks that closed
    pub fn observe(&mut self, batch: &OcrBatch) -> Vec<Issue> {
        let t = batch.timestamp;
        if !t.is_finite() {
            debug!("Skipping OCR batch with non-finite timestamp");
            return Vec::new();
        }

        let mut seen: Vec<String> = Vec::new();
        for detection in &batch.detections {
            let Some(cleaned) = self.accept(detection) else {
                continue;
            };
            let normalized = cleaned.to_lowercase();
            let hits = self
                .keywords
                .iter()
                .filter(|k| normalized.contains(k.as_str()))
                .count() as u32;
            let bbox = BoundingBox {
                left: detection.left,
                top: detection.top,
                width: detection.width,
                height: detection.height,
            };

            match self.tracks.get_mut(&normalized) {
                Some(track) => {
                    track.last_seen = t;
                    track.samples += 1;
                    track.confidence_sum += detection.confidence;
                    track.keyword_hits += hits;
                    track.boxes.push(bbox);
                }
                None => {
                    self.tracks.insert(
                        normalized.clone(),
                        OverlayTrack {
                            text: cleaned,
                            start: t,
                            last_seen: t,
                            samples: 1,
                            confidence_sum: detection.confidence,
                            keyword_hits: hits,
                            boxes: vec![bbox],
                        },
                    );
                }
            }
            seen.push(normalized);
        }

        let interval = self.params.sample_interval;
        let stale: Vec<String> = self
            .tracks
            .iter()
            .filter(|(key, track)| !seen.contains(key) && t - track.last_seen > interval)
            .map(|(key, _)| key.clone())
            .collect();

        let closed: Vec<OverlayTrack> = stale.iter().filter_map(|key| self.tracks.remove(key)).collect();
        let mut issues: Vec<Issue> = closed.into_iter().filter_map(|track| self.close(track)).collect();
        issues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        issues
    }

    /// Flush every open track at end of stream
    pub fn finish(&mut self) -> Vec<Issue> {
        let tracks = std::mem::take(&mut self.tracks);
        let mut issues: Vec<Issue> = tracks
            .into_values()
            .filter_map(|track| self.close(track))
            .collect();
        issues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        issues
    }

    /// Cleaned text of an accepted detection
    fn accept(&self, detection: &OcrDetection) -> Option<String> {
        if detection.text.trim().is_empty() {
            return None;
        }
        if !detection.confidence.is_finite() || detection.confidence < self.params.min_confidence {
            return None;
        }

        let cleaned = detection.text.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.chars().count() < self.params.min_chars as usize {
            return None;
        }
        if detection.height < i64::from(self.params.min_box_height) {
            return None;
        }

        let normalized = cleaned.to_lowercase();
        if self.allowlist.iter().any(|phrase| normalized.contains(phrase.as_str())) {
            return None;
        }
        Some(cleaned)
    }

    fn close(&self, track: OverlayTrack) -> Option<Issue> {
        let interval = self.params.sample_interval;
        let end = track.last_seen + interval;
        let span = (end - track.start).max(interval);

        if span < self.params.min_duration {
            debug!(text = %track.text, span, "Discarding short-lived overlay track");
            return None;
        }

        let average = track.confidence_sum / f64::from(track.samples.max(1));
        let severity = if track.keyword_hits > 0 {
            Severity::Critical
        } else {
            self.default_severity
        };

        Some(Issue {
            event: "Overlay text detected".to_string(),
            source: IssueSource::OcrOverlay,
            filter: None,
            metric_key: None,
            start_time: track.start,
            end_time: end,
            duration: span,
            severity,
            details: IssueDetails::OverlayText {
                text: track.text,
                average_confidence: (average * 100.0).round() / 100.0,
                samples: track.samples,
                bounding_boxes: track.boxes,
            },
        })
    }
}

/// Track a whole batch sequence, ordered by timestamp
pub fn track(params: &OverlayTextParams, default_severity: Severity, batches: &[OcrBatch]) -> Vec<Issue> {
    let mut ordered: Vec<&OcrBatch> = batches.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let mut tracker = OverlayTrackTracker::new(params, default_severity);
    let mut issues: Vec<Issue> = ordered.into_iter().flat_map(|b| tracker.observe(b)).collect();
    issues.extend(tracker.finish());
    issues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    info!(batches = batches.len(), issues = issues.len(), "Overlay text tracking complete");
    issues
}

/// [`track`], consulting `cache` first and storing the result on a miss
pub fn track_with_cache(
    cache: &dyn OverlayCache,
    source_id: &str,
    params: &OverlayTextParams,
    default_severity: Severity,
    batches: &[OcrBatch],
) -> Vec<Issue> {
    let key = cache_key(source_id, params, default_severity);
    if let Some(entry) = cache.load(&key) {
        info!(source = source_id, issues = entry.issues.len(), "Using cached overlay results");
        return entry.issues;
    }

    let issues = track(params, default_severity, batches);
    cache.store(
        &key,
        &CachedOverlay {
            issues: issues.clone(),
            sample_interval: params.sample_interval,
        },
    );
    issues
}
