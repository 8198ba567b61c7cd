//! Issue producers and the aggregator
//!
//! Each producer is a single-threaded state machine over materialized input:
//! - [`stream_tracker`]: per-frame metric violations
//! - [`line_protocol`]: start/end/duration markers from detector logs
//! - [`overlay_tracker`]: persistent on-screen text from OCR samples

pub mod aggregator;
pub mod line_protocol;
pub mod overlay_tracker;
pub mod stream_tracker;

pub use aggregator::{aggregate, AggregatedIssues, OverallStatus, SeverityCounts, SeveritySummary};
pub use line_protocol::{parse_log, LineDetector, MarkerPairer, Segment};
pub use overlay_tracker::{OcrBatch, OcrDetection, OverlayTrack, OverlayTrackTracker};
pub use stream_tracker::{FrameRecord, Sample, StreamEventTracker, StreamOutput, ViolationTracker};
