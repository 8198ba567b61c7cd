//! Issue events: the unit of output of every detector
//!
//! An [`Issue`] is created exactly once, when a violation run, a detector
//! marker pair or an overlay track closes, and is never mutated afterwards.

use crate::bounds::{SeverityRules, ViolationReason};
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Producer that emitted an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueSource {
    #[serde(rename = "qctools")]
    QcTools,
    #[serde(rename = "ffmpeg-blackdetect")]
    BlackDetect,
    #[serde(rename = "ffmpeg-freezedetect")]
    FreezeDetect,
    #[serde(rename = "ffmpeg-silencedetect")]
    SilenceDetect,
    #[serde(rename = "ocr-overlay")]
    OcrOverlay,
}

impl IssueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSource::QcTools => "qctools",
            IssueSource::BlackDetect => "ffmpeg-blackdetect",
            IssueSource::FreezeDetect => "ffmpeg-freezedetect",
            IssueSource::SilenceDetect => "ffmpeg-silencedetect",
            IssueSource::OcrOverlay => "ocr-overlay",
        }
    }
}

impl fmt::Display for IssueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier boundary that decided an issue's severity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityRule {
    #[serde(rename = "type")]
    pub reason: ViolationReason,
    pub boundary: f64,
}

/// Pixel-space bounding box of an OCR detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
}

/// Evidence attached to an issue, one variant per producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueDetails {
    /// Per-frame metric left its configured range
    Threshold {
        /// Most extreme value observed during the run
        peak: f64,
        /// Human-readable detection condition, e.g. `>= 5 and <= 235`
        condition: String,
        severity_bounds: SeverityRules,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        severity_rule: Option<SeverityRule>,
    },
    BlackFrames {
        picture_threshold: f64,
        pixel_threshold: f64,
    },
    Freeze {
        noise: f64,
        duration_threshold: f64,
    },
    Silence {
        noise_threshold: f64,
        duration_threshold: f64,
    },
    OverlayText {
        text: String,
        average_confidence: f64,
        samples: u32,
        bounding_boxes: Vec<BoundingBox>,
    },
}

/// A closed, time-bounded, severity-tagged finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Short label, e.g. `Luma Minimum (Y) below minimum`
    pub event: String,
    pub source: IssueSource,
    /// Filter id for metric issues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_key: Option<String>,
    /// Seconds from the start of the media
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub severity: Severity,
    pub details: IssueDetails,
}

impl Issue {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}
