//! Compiled-in catalog of metric filters and line/OCR detectors
//!
//! The catalog is a process-wide, read-only registry built once on first
//! access. Resolvers and engines borrow it as `&'static Catalog`; nothing
//! mutates it after construction.

use crate::bounds::ThresholdBounds;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A per-frame signal reported by a metric filter
#[derive(Debug, Clone, Serialize)]
pub struct MetricSpec {
    /// Tag key in the frame stream, e.g. `lavfi.signalstats.YMIN`
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    /// Compiled-in detection bound
    pub default: ThresholdBounds,
    pub hint: &'static str,
}

/// A named group of metrics enabled together
#[derive(Debug, Clone, Serialize)]
pub struct FilterSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
    pub metrics: Vec<MetricSpec>,
}

impl FilterSpec {
    pub fn metric(&self, key: &str) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.key == key)
    }
}

/// Event-producing detectors fed by tool logs or OCR samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    BlackDetect,
    FreezeDetect,
    SilenceDetect,
    OverlayText,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::BlackDetect,
        DetectorKind::FreezeDetect,
        DetectorKind::SilenceDetect,
        DetectorKind::OverlayText,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            DetectorKind::BlackDetect => "blackdetect",
            DetectorKind::FreezeDetect => "freezedetect",
            DetectorKind::SilenceDetect => "silencedetect",
            DetectorKind::OverlayText => "overlaytext",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        DetectorKind::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// Marker prefix used in the tool's log lines, for line-based detectors
    pub fn marker_label(&self) -> Option<&'static str> {
        match self {
            DetectorKind::BlackDetect => Some("black"),
            DetectorKind::FreezeDetect => Some("freeze"),
            DetectorKind::SilenceDetect => Some("silence"),
            DetectorKind::OverlayText => None,
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Compiled-in default of a detector parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamDefault {
    Number(f64),
    Text(&'static str),
}

#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub default: ParamDefault,
    pub hint: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectorSpec {
    pub kind: DetectorKind,
    pub name: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
    pub params: Vec<ParamSpec>,
}

impl DetectorSpec {
    pub fn param(&self, key: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.key == key)
    }

    /// Numeric default for `key`, or `fallback` when the key is unknown or textual
    pub fn number_default(&self, key: &str, fallback: f64) -> f64 {
        match self.param(key).map(|p| p.default) {
            Some(ParamDefault::Number(value)) => value,
            _ => fallback,
        }
    }

    /// Text default for `key`, or the empty string
    pub fn text_default(&self, key: &str) -> &'static str {
        match self.param(key).map(|p| p.default) {
            Some(ParamDefault::Text(value)) => value,
            _ => "",
        }
    }
}

/// Registry of every known filter and detector
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub filters: Vec<FilterSpec>,
    pub detectors: Vec<DetectorSpec>,
}

static BUILTIN: Lazy<Catalog> = Lazy::new(Catalog::build);

impl Catalog {
    /// The process-wide compiled-in catalog
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    pub fn filter(&self, id: &str) -> Option<&FilterSpec> {
        self.filters.iter().find(|f| f.id == id)
    }

    pub fn detector(&self, kind: DetectorKind) -> Option<&DetectorSpec> {
        self.detectors.iter().find(|d| d.kind == kind)
    }

    fn build() -> Self {
        Self {
            filters: vec![
                FilterSpec {
                    id: "signalstats",
                    name: "Signal Stats",
                    category: "Video",
                    description: "Broadcast compliance statistics. Enables black frame detection and luma excursions.",
                    default_enabled: true,
                    metrics: vec![
                        MetricSpec {
                            key: "lavfi.signalstats.YMIN",
                            label: "Luma Minimum (Y)",
                            unit: "code value",
                            default: ThresholdBounds::min(5.0),
                            hint: "Set the minimum value to ~5 to flag pure black or near-black frames.",
                        },
                        MetricSpec {
                            key: "lavfi.signalstats.YMAX",
                            label: "Luma Maximum (Y)",
                            unit: "code value",
                            default: ThresholdBounds::max(235.0),
                            hint: "Keep max below 235 to catch illegal super-whites.",
                        },
                        MetricSpec {
                            key: "lavfi.signalstats.YAVG",
                            label: "Luma Average (Y)",
                            unit: "code value",
                            default: ThresholdBounds::range(16.0, 235.0),
                            hint: "Average luma outside broadcast range can indicate lighting or grading issues.",
                        },
                    ],
                },
                FilterSpec {
                    id: "entropy",
                    name: "Entropy",
                    category: "Video",
                    description: "Detects low-information frames (slates, color bars, hold frames).",
                    default_enabled: true,
                    metrics: vec![MetricSpec {
                        key: "lavfi.entropy.Y",
                        label: "Entropy (Y)",
                        unit: "bits",
                        default: ThresholdBounds::min(0.20),
                        hint: "Values below ~0.20 highlight static frames, slates, or color bars.",
                    }],
                },
                FilterSpec {
                    id: "ssim",
                    name: "SSIM Similarity",
                    category: "Video",
                    description: "Flags high similarity between consecutive frames, useful for freeze detection.",
                    default_enabled: true,
                    metrics: vec![
                        MetricSpec {
                            key: "lavfi.ssim.All",
                            label: "SSIM (All)",
                            unit: "ratio",
                            default: ThresholdBounds::max(0.999),
                            hint: "A max near 1.0 indicates identical frames for extended periods (freeze/long slate).",
                        },
                        MetricSpec {
                            key: "lavfi.ssim.Y",
                            label: "SSIM (Y)",
                            unit: "ratio",
                            default: ThresholdBounds::max(0.999),
                            hint: "Y-channel SSIM close to 1.0 corroborates freeze detection.",
                        },
                    ],
                },
                FilterSpec {
                    id: "blockdetect",
                    name: "Blockiness",
                    category: "Video",
                    description: "Highlights macro-block artifacts from encoding or processing defects.",
                    default_enabled: false,
                    metrics: vec![MetricSpec {
                        key: "lavfi.block",
                        label: "Blockiness Score",
                        unit: "score",
                        default: ThresholdBounds::max(0.35),
                        hint: "Lower thresholds catch subtle macro-blocking; raise if you only want severe cases.",
                    }],
                },
                FilterSpec {
                    id: "blurdetect",
                    name: "Blur Detection",
                    category: "Video",
                    description: "Detects unexpected loss of focus or soft frames.",
                    default_enabled: false,
                    metrics: vec![MetricSpec {
                        key: "lavfi.blur",
                        label: "Blur Score",
                        unit: "score",
                        default: ThresholdBounds::max(0.30),
                        hint: "Set closer to 0.2 for very sharp content; raise if you get false positives.",
                    }],
                },
                FilterSpec {
                    id: "astats",
                    name: "Audio Statistics",
                    category: "Audio",
                    description: "Per-channel level analysis to catch mutes, clipping, or imbalances.",
                    default_enabled: true,
                    metrics: vec![
                        MetricSpec {
                            key: "lavfi.astats.Overall.Peak_level",
                            label: "Peak Level",
                            unit: "dBFS",
                            default: ThresholdBounds::max(0.0),
                            hint: "Peaks above 0 dBFS indicate clipping; tighten the ceiling for more headroom.",
                        },
                        MetricSpec {
                            key: "lavfi.astats.1.Min_level",
                            label: "Channel 1 Min",
                            unit: "dBFS",
                            default: ThresholdBounds::min(-80.0),
                            hint: "Floor near -80 dBFS is typical for silence; adjust for noisier captures.",
                        },
                        MetricSpec {
                            key: "lavfi.astats.1.Max_level",
                            label: "Channel 1 Max",
                            unit: "dBFS",
                            default: ThresholdBounds::max(0.0),
                            hint: "Limit ensures each channel stays below clipping.",
                        },
                    ],
                },
                FilterSpec {
                    id: "ebur128",
                    name: "EBU R128 Loudness",
                    category: "Audio",
                    description: "Checks momentary loudness against broadcast specs.",
                    default_enabled: true,
                    metrics: vec![MetricSpec {
                        key: "lavfi.r128.M",
                        label: "Momentary Loudness",
                        unit: "LUFS",
                        default: ThresholdBounds::range(-23.0, -5.0),
                        hint: "Keep momentary loudness within typical R128 comfort range (-23 to -5 LUFS).",
                    }],
                },
            ],
            detectors: vec![
                DetectorSpec {
                    kind: DetectorKind::BlackDetect,
                    name: "Black Frame Detector",
                    description: "FFmpeg's blackdetect filter excels at catching true black frames and lead-ins.",
                    default_enabled: true,
                    params: vec![
                        ParamSpec {
                            key: "duration",
                            label: "Minimum duration (s)",
                            default: ParamDefault::Number(0.5),
                            hint: "Ignore flashes shorter than this duration.",
                        },
                        ParamSpec {
                            key: "picture_threshold",
                            label: "Picture threshold",
                            default: ParamDefault::Number(0.98),
                            hint: "Higher values demand darker frames to be considered black.",
                        },
                        ParamSpec {
                            key: "pixel_threshold",
                            label: "Pixel threshold",
                            default: ParamDefault::Number(0.10),
                            hint: "Fraction of pixels allowed to diverge from pure black.",
                        },
                    ],
                },
                DetectorSpec {
                    kind: DetectorKind::FreezeDetect,
                    name: "Freeze Frame Detector",
                    description: "Detects frozen video using FFmpeg's freezedetect filter (good for static slates).",
                    default_enabled: true,
                    params: vec![
                        ParamSpec {
                            key: "noise",
                            label: "Noise tolerance",
                            default: ParamDefault::Number(0.003),
                            hint: "Lower values treat subtle motion as a freeze; raise to avoid false positives.",
                        },
                        ParamSpec {
                            key: "duration",
                            label: "Minimum duration (s)",
                            default: ParamDefault::Number(2.0),
                            hint: "Hold duration before a freeze event is reported.",
                        },
                    ],
                },
                DetectorSpec {
                    kind: DetectorKind::SilenceDetect,
                    name: "Silence Detector",
                    description: "Audio silence detector for mutes and dropouts (FFmpeg silencedetect).",
                    default_enabled: true,
                    params: vec![
                        ParamSpec {
                            key: "noise",
                            label: "Noise floor (dB)",
                            default: ParamDefault::Number(-30.0),
                            hint: "Everything below this level is considered silence.",
                        },
                        ParamSpec {
                            key: "duration",
                            label: "Minimum duration (s)",
                            default: ParamDefault::Number(2.0),
                            hint: "Ignore short gaps shorter than this duration.",
                        },
                    ],
                },
                DetectorSpec {
                    kind: DetectorKind::OverlayText,
                    name: "Overlay Text OCR",
                    description: "Samples frames and flags persistent on-screen text (burned-in captions, UI overlays).",
                    default_enabled: true,
                    params: vec![
                        ParamSpec {
                            key: "sample_interval",
                            label: "Sample interval (s)",
                            default: ParamDefault::Number(1.0),
                            hint: "How often to OCR frames. Lower values increase accuracy at the cost of speed.",
                        },
                        ParamSpec {
                            key: "min_confidence",
                            label: "Minimum OCR confidence",
                            default: ParamDefault::Number(70.0),
                            hint: "Discard detections below this confidence score (0-100).",
                        },
                        ParamSpec {
                            key: "min_chars",
                            label: "Minimum characters",
                            default: ParamDefault::Number(5.0),
                            hint: "Ignore very short strings to reduce false positives.",
                        },
                        ParamSpec {
                            key: "min_duration",
                            label: "Minimum duration (s)",
                            default: ParamDefault::Number(1.5),
                            hint: "Require text to persist at least this long before flagging.",
                        },
                        ParamSpec {
                            key: "min_box_height",
                            label: "Minimum box height (px)",
                            default: ParamDefault::Number(24.0),
                            hint: "Ignore overlays smaller than this height to reduce noise.",
                        },
                        ParamSpec {
                            key: "allowlist_phrases",
                            label: "Allowed phrases (comma separated)",
                            default: ParamDefault::Text(""),
                            hint: "Known text (e.g., permanent bugs) to ignore.",
                        },
                        ParamSpec {
                            key: "flag_keywords",
                            label: "Critical keywords (comma separated)",
                            default: ParamDefault::Text("click,press,error,warning,analyze"),
                            hint: "Keywords that escalate severity to critical when present.",
                        },
                    ],
                },
            ],
        }
    }
}
