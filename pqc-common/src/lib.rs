//! # PepperQC Common Library
//!
//! Shared code for the PepperQC detection crates:
//! - Severity tiers and threshold bounds
//! - Issue event records
//! - The compiled-in metric/detector catalog
//! - Configuration loading
//! - Error types

pub mod bounds;
pub mod catalog;
pub mod config;
pub mod error;
pub mod issue;
pub mod severity;

pub use bounds::{SeverityRules, ThresholdBounds, ViolationReason};
pub use catalog::{Catalog, DetectorKind};
pub use error::{Error, Result};
pub use issue::{BoundingBox, Issue, IssueDetails, IssueSource, SeverityRule};
pub use severity::Severity;
