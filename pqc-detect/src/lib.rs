//! pqc-detect library interface
//!
//! Resolves QC presets and turns per-frame metrics, detector logs and OCR
//! samples into a single ordered, severity-classified issue stream.

pub mod analysis;
pub mod cache;
pub mod input;
pub mod preset;
pub mod services;
pub mod threshold;

pub use analysis::{analyze, analyze_concurrently, AnalysisInput, AnalysisReport, DetectorReport};
pub use cache::{cache_key, CachedOverlay, JsonFileCache, MemoryCache, OverlayCache};
pub use preset::{default_preset, resolve, ResolvedPreset};
