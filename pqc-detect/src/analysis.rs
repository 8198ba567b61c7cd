//! Analysis pipeline
//!
//! Runs every enabled producer over the materialized inputs of one source
//! and aggregates the result into an [`AnalysisReport`]. Producers share
//! nothing but the read-only preset, so [`analyze_concurrently`] can run
//! them on blocking worker threads; the final sort restores the same order
//! the sequential [`analyze`] produces.

use crate::cache::OverlayCache;
use crate::preset::{DetectorConfig, ResolvedPreset};
use crate::services::aggregator::{aggregate, SeveritySummary};
use crate::services::line_protocol::parse_log;
use crate::services::overlay_tracker::{self, OcrBatch};
use crate::services::stream_tracker::{
    FilterSummary, FrameRecord, StreamEventTracker, StreamOutput, StreamStatistics,
};
use chrono::{DateTime, Utc};
use pqc_common::{Catalog, DetectorKind, Error, Issue, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Materialized inputs for one source
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    /// Identity of the analyzed media, used for overlay caching
    pub source_id: String,
    pub frames: Vec<FrameRecord>,
    /// Raw log text per line-based detector
    pub detector_logs: HashMap<DetectorKind, String>,
    /// OCR samples; `None` when overlay sampling was not performed
    pub ocr_batches: Option<Vec<OcrBatch>>,
    /// Issues recorded by collaborators outside the core, merged as-is
    pub external_issues: Vec<Issue>,
}

impl AnalysisInput {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Default::default()
        }
    }

    pub fn with_frames(mut self, frames: Vec<FrameRecord>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_detector_log(mut self, kind: DetectorKind, text: impl Into<String>) -> Self {
        self.detector_logs.insert(kind, text.into());
        self
    }

    pub fn with_ocr_batches(mut self, batches: Vec<OcrBatch>) -> Self {
        self.ocr_batches = Some(batches);
        self
    }

    pub fn with_external_issues(mut self, issues: Vec<Issue>) -> Self {
        self.external_issues = issues;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorReport {
    pub id: DetectorKind,
    pub name: String,
    pub issues_found: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QcToolsReport {
    pub filters: Vec<FilterSummary>,
    pub statistics: StreamStatistics,
}

/// Result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub source_id: String,
    pub issues: Vec<Issue>,
    pub severity_summary: SeveritySummary,
    pub qctools: QcToolsReport,
    pub detectors: Vec<DetectorReport>,
}

/// Output of one event detector
struct DetectorOutput {
    report: DetectorReport,
    issues: Vec<Issue>,
}

fn detector_name(kind: DetectorKind) -> String {
    Catalog::builtin()
        .detector(kind)
        .map(|spec| spec.name.to_string())
        .unwrap_or_else(|| kind.id().to_string())
}

fn detector_output(config: &DetectorConfig, issues: Vec<Issue>) -> DetectorOutput {
    debug!(detector = %config.id, issues = issues.len(), "Detector finished");
    DetectorOutput {
        report: DetectorReport {
            id: config.id,
            name: detector_name(config.id),
            issues_found: issues.len(),
        },
        issues,
    }
}

fn run_stream(preset: &ResolvedPreset, frames: &[FrameRecord]) -> StreamOutput {
    StreamEventTracker::run(preset, Catalog::builtin(), frames)
}

fn run_overlay(
    config: &DetectorConfig,
    source_id: &str,
    batches: &[OcrBatch],
    cache: Option<&dyn OverlayCache>,
) -> Vec<Issue> {
    let Some(params) = config.overlay_params() else {
        return Vec::new();
    };
    match cache {
        Some(cache) => overlay_tracker::track_with_cache(cache, source_id, params, config.default_severity, batches),
        None => overlay_tracker::track(params, config.default_severity, batches),
    }
}

/// Enabled line-based detectors that have a log to parse, in catalog order
fn line_jobs<'a>(preset: &'a ResolvedPreset, input: &'a AnalysisInput) -> Vec<(&'a DetectorConfig, &'a str)> {
    preset
        .detectors
        .iter()
        .filter(|d| d.enabled && d.id.marker_label().is_some())
        .filter_map(|d| match input.detector_logs.get(&d.id) {
            Some(text) => Some((d, text.as_str())),
            None => {
                debug!(detector = %d.id, "No log supplied, detector skipped");
                None
            }
        })
        .collect()
}

/// The enabled overlay detector together with its OCR samples
fn overlay_job<'a>(
    preset: &'a ResolvedPreset,
    input: &'a AnalysisInput,
) -> Option<(&'a DetectorConfig, &'a [OcrBatch])> {
    let config = preset.enabled_detector(DetectorKind::OverlayText)?;
    match input.ocr_batches.as_deref() {
        Some(batches) => Some((config, batches)),
        None => {
            debug!("No OCR samples supplied, overlay detection skipped");
            None
        }
    }
}

fn assemble(input: &AnalysisInput, stream: StreamOutput, detectors: Vec<DetectorOutput>) -> AnalysisReport {
    let mut streams = Vec::with_capacity(detectors.len() + 2);
    streams.push(stream.issues);
    if !input.external_issues.is_empty() {
        debug!(issues = input.external_issues.len(), "Merging external issues");
        streams.push(input.external_issues.clone());
    }
    let mut reports = Vec::with_capacity(detectors.len());
    for output in detectors {
        reports.push(output.report);
        streams.push(output.issues);
    }

    let aggregated = aggregate(streams);
    let report = AnalysisReport {
        run_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        source_id: input.source_id.clone(),
        issues: aggregated.issues,
        severity_summary: aggregated.severity_summary,
        qctools: QcToolsReport {
            filters: stream.filters,
            statistics: stream.statistics,
        },
        detectors: reports,
    };

    info!(
        run_id = %report.run_id,
        source = %report.source_id,
        issues = report.severity_summary.total,
        critical = report.severity_summary.counts.critical,
        "Analysis complete"
    );
    report
}

/// Run every enabled producer sequentially
pub fn analyze(
    preset: &ResolvedPreset,
    input: &AnalysisInput,
    cache: Option<&dyn OverlayCache>,
) -> AnalysisReport {
    let stream = run_stream(preset, &input.frames);

    let mut detectors: Vec<DetectorOutput> = line_jobs(preset, input)
        .into_iter()
        .map(|(config, text)| detector_output(config, parse_log(config, text)))
        .collect();

    if let Some((config, batches)) = overlay_job(preset, input) {
        let issues = run_overlay(config, &input.source_id, batches, cache);
        detectors.push(detector_output(config, issues));
    }

    assemble(input, stream, detectors)
}

/// Run every enabled producer on its own blocking worker
///
/// Produces the same issues, in the same order, as [`analyze`].
pub async fn analyze_concurrently(
    preset: Arc<ResolvedPreset>,
    input: Arc<AnalysisInput>,
    cache: Option<Arc<dyn OverlayCache>>,
) -> Result<AnalysisReport> {
    let stream_task = {
        let preset = Arc::clone(&preset);
        let input = Arc::clone(&input);
        tokio::task::spawn_blocking(move || run_stream(&preset, &input.frames))
    };

    let line_tasks: Vec<_> = line_jobs(&preset, &input)
        .into_iter()
        .map(|(config, text)| {
            let config = config.clone();
            let text = text.to_string();
            tokio::task::spawn_blocking(move || {
                let issues = parse_log(&config, &text);
                detector_output(&config, issues)
            })
        })
        .collect();

    let overlay_task = overlay_job(&preset, &input).map(|(config, _)| {
        let config = config.clone();
        let input = Arc::clone(&input);
        let cache = cache.clone();
        tokio::task::spawn_blocking(move || {
            let batches = input.ocr_batches.as_deref().unwrap_or_default();
            let issues = run_overlay(&config, &input.source_id, batches, cache.as_deref());
            detector_output(&config, issues)
        })
    });

    let stream = stream_task
        .await
        .map_err(|e| Error::Internal(format!("Frame stream task failed: {}", e)))?;

    let mut detectors = Vec::with_capacity(line_tasks.len() + 1);
    for task in line_tasks {
        detectors.push(
            task.await
                .map_err(|e| Error::Internal(format!("Detector task failed: {}", e)))?,
        );
    }
    if let Some(task) = overlay_task {
        detectors.push(
            task.await
                .map_err(|e| Error::Internal(format!("Overlay task failed: {}", e)))?,
        );
    }

    Ok(assemble(&input, stream, detectors))
}
