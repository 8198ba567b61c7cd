//! Input file loading
//!
//! Producers are total over well-typed input; malformed files are rejected
//! here, at the boundary, with a [`pqc_common::Error`].

use crate::services::overlay_tracker::OcrBatch;
use crate::services::stream_tracker::FrameRecord;
use pqc_common::{Error, Issue, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Accepts either a bare array or an object wrapping it
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Frames { frames: Vec<T> },
    Batches { batches: Vec<T> },
    Issues { issues: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items)
            | Listing::Frames { frames: items }
            | Listing::Batches { batches: items }
            | Listing::Issues { issues: items } => items,
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })
}

fn parse_listing<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = read(path)?;
    let listing: Listing<T> = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;
    Ok(listing.into_vec())
}

/// Frame tag stream: `[{timestamp, duration, tags}]` or `{"frames": [...]}`
pub fn load_frames(path: &Path) -> Result<Vec<FrameRecord>> {
    let frames: Vec<FrameRecord> = parse_listing(path)?;
    debug!(path = %path.display(), frames = frames.len(), "Loaded frame stream");
    Ok(frames)
}

/// OCR samples: `[{timestamp, detections}]` or `{"batches": [...]}`
pub fn load_ocr_batches(path: &Path) -> Result<Vec<OcrBatch>> {
    let batches: Vec<OcrBatch> = parse_listing(path)?;
    debug!(path = %path.display(), batches = batches.len(), "Loaded OCR samples");
    Ok(batches)
}

/// Issues recorded outside the core: `[{...}]` or `{"issues": [...]}`
///
/// Severity labels are normalized while decoding (`high` → critical,
/// `info`/`notice` → informational, unknown → non-critical).
pub fn load_issues(path: &Path) -> Result<Vec<Issue>> {
    let issues: Vec<Issue> = parse_listing(path)?;
    debug!(path = %path.display(), issues = issues.len(), "Loaded external issues");
    Ok(issues)
}

/// Raw detector log text
pub fn load_log(path: &Path) -> Result<String> {
    read(path)
}

/// Raw preset JSON; any JSON value is accepted and resolved leniently
pub fn load_preset_value(path: &Path) -> Result<Value> {
    let content = read(path)?;
    Ok(serde_json::from_str(&content)?)
}
