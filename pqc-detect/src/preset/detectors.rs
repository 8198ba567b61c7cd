//! Typed detector parameter sets
//!
//! Each detector's raw parameter bag is coerced and clamped into its valid
//! domain once, when the preset is resolved. Producers read these structs
//! directly and never re-validate.

use pqc_common::catalog::{DetectorKind, DetectorSpec};
use pqc_common::Severity;
use serde::Serialize;
use serde_json::{Map, Value};

use super::coerce_f64;

/// Keywords used when the configured keyword list is empty
pub const DEFAULT_FLAG_KEYWORDS: [&str; 5] = ["click", "press", "error", "warning", "analyze"];

/// Black frame detector knobs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlackDetectParams {
    /// Minimum black segment duration (seconds)
    pub duration: f64,
    pub picture_threshold: f64,
    pub pixel_threshold: f64,
}

/// Freeze detector knobs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreezeDetectParams {
    pub noise: f64,
    /// Hold duration before a freeze is reported (seconds)
    pub duration: f64,
}

/// Silence detector knobs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SilenceDetectParams {
    /// Noise floor in dB
    pub noise: f64,
    pub duration: f64,
}

/// Overlay text OCR knobs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayTextParams {
    /// Seconds between OCR samples (>= 0.2)
    pub sample_interval: f64,
    /// OCR confidence floor, 0-100
    pub min_confidence: f64,
    pub min_chars: u32,
    /// Minimum persistence before a track is reported (>= 0.2 s)
    pub min_duration: f64,
    /// Minimum box height in pixels
    pub min_box_height: u32,
    /// Comma-separated phrases to ignore
    pub allowlist_phrases: String,
    /// Comma-separated keywords escalating a track to critical
    pub flag_keywords: String,
}

impl OverlayTextParams {
    /// Lower-cased allow-listed phrases
    pub fn allowlist(&self) -> Vec<String> {
        parse_csv_list(&self.allowlist_phrases)
    }

    /// Lower-cased escalation keywords, never empty
    pub fn keywords(&self) -> Vec<String> {
        let keywords = parse_csv_list(&self.flag_keywords);
        if keywords.is_empty() {
            DEFAULT_FLAG_KEYWORDS.iter().map(|k| k.to_string()).collect()
        } else {
            keywords
        }
    }
}

/// Parameters of one detector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectorParams {
    Black(BlackDetectParams),
    Freeze(FreezeDetectParams),
    Silence(SilenceDetectParams),
    Overlay(OverlayTextParams),
}

/// Resolved configuration of one detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorConfig {
    pub id: DetectorKind,
    pub enabled: bool,
    pub params: DetectorParams,
    /// Severity attached to every issue the detector emits
    pub default_severity: Severity,
}

impl DetectorConfig {
    /// FFmpeg filter graph argument for line-based detectors
    pub fn filter_expression(&self) -> Option<String> {
        match &self.params {
            DetectorParams::Black(p) => Some(format!(
                "blackdetect=d={}:pic_th={}:pix_th={}",
                p.duration, p.picture_threshold, p.pixel_threshold
            )),
            DetectorParams::Freeze(p) => Some(format!("freezedetect=n={}:d={}", p.noise, p.duration)),
            DetectorParams::Silence(p) => {
                Some(format!("silencedetect=noise={}dB:d={}", p.noise, p.duration))
            }
            DetectorParams::Overlay(_) => None,
        }
    }

    pub fn overlay_params(&self) -> Option<&OverlayTextParams> {
        match &self.params {
            DetectorParams::Overlay(p) => Some(p),
            _ => None,
        }
    }
}

/// Raw parameter reader backed by the catalog defaults
struct ParamReader<'a> {
    spec: &'a DetectorSpec,
    raw: Option<&'a Map<String, Value>>,
}

impl<'a> ParamReader<'a> {
    fn number(&self, key: &str) -> f64 {
        let default = self.spec.number_default(key, 0.0);
        match self.raw.and_then(|m| m.get(key)) {
            None | Some(Value::Null) => default,
            Some(value) => coerce_f64(value).unwrap_or(default),
        }
    }

    fn text(&self, key: &str) -> String {
        match self.raw.and_then(|m| m.get(key)) {
            None | Some(Value::Null) => self.spec.text_default(key).to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => other.to_string(),
        }
    }

    /// Numeric value where zero means "use the default"
    fn nonzero(&self, key: &str) -> f64 {
        let value = self.number(key);
        if value == 0.0 {
            self.spec.number_default(key, 0.0)
        } else {
            value
        }
    }
}

/// Coerce a raw parameter bag into the detector's typed parameters
pub(crate) fn resolve_params(spec: &DetectorSpec, raw: Option<&Map<String, Value>>) -> DetectorParams {
    let reader = ParamReader { spec, raw };

    match spec.kind {
        DetectorKind::BlackDetect => DetectorParams::Black(BlackDetectParams {
            duration: reader.nonzero("duration"),
            picture_threshold: reader.nonzero("picture_threshold"),
            pixel_threshold: reader.nonzero("pixel_threshold"),
        }),
        DetectorKind::FreezeDetect => {
            let noise = reader.number("noise");
            let duration = reader.number("duration");
            DetectorParams::Freeze(FreezeDetectParams {
                noise: if noise <= 0.0 {
                    spec.number_default("noise", 0.003)
                } else {
                    noise
                },
                duration: if duration < 0.0 {
                    spec.number_default("duration", 2.0)
                } else {
                    duration
                },
            })
        }
        DetectorKind::SilenceDetect => DetectorParams::Silence(SilenceDetectParams {
            noise: reader.nonzero("noise"),
            duration: reader.nonzero("duration"),
        }),
        DetectorKind::OverlayText => DetectorParams::Overlay(OverlayTextParams {
            sample_interval: reader.nonzero("sample_interval").max(0.2),
            min_confidence: reader.nonzero("min_confidence").clamp(0.0, 100.0),
            min_chars: clamp_count(reader.nonzero("min_chars")),
            min_duration: reader.nonzero("min_duration").max(0.2),
            min_box_height: clamp_count(reader.nonzero("min_box_height")),
            allowlist_phrases: reader.text("allowlist_phrases"),
            flag_keywords: reader.text("flag_keywords"),
        }),
    }
}

/// Truncate to an integer count of at least one
fn clamp_count(value: f64) -> u32 {
    value.max(1.0).min(u32::MAX as f64) as u32
}

/// Split a comma-separated list, trimming and lower-casing entries
pub fn parse_csv_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}
