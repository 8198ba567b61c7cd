//! Threshold bounds and per-tier severity rules

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One- or two-sided numeric range
///
/// An absent side places no constraint on values in that direction. Absent
/// sides serialize as explicit `null` so a resolved preset fed back into the
/// resolver cannot pick up a fallback for a side that was cleared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl ThresholdBounds {
    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub const fn min(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub const fn max(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub const fn range(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    /// No constraint on either side
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Bounds for each rule-carrying severity tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeverityRules {
    #[serde(default)]
    pub critical: ThresholdBounds,
    #[serde(default)]
    pub non_critical: ThresholdBounds,
}

impl SeverityRules {
    /// Bounds configured for `tier`, if the tier carries rules at all
    pub fn tier(&self, tier: Severity) -> Option<&ThresholdBounds> {
        match tier {
            Severity::Critical => Some(&self.critical),
            Severity::NonCritical => Some(&self.non_critical),
            Severity::Informational => None,
        }
    }

    /// Tiers with their bounds, in classification priority order
    pub fn tiers(&self) -> [(Severity, &ThresholdBounds); 2] {
        [
            (Severity::Critical, &self.critical),
            (Severity::NonCritical, &self.non_critical),
        ]
    }
}

/// Side of the range a violating value fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    BelowMin,
    AboveMax,
}

impl ViolationReason {
    /// Phrase used in issue event labels
    pub fn label(&self) -> &'static str {
        match self {
            ViolationReason::BelowMin => "below minimum",
            ViolationReason::AboveMax => "above maximum",
        }
    }

    /// Whether `candidate` is further out of range than `current`
    pub fn is_more_extreme(&self, candidate: f64, current: f64) -> bool {
        match self {
            ViolationReason::BelowMin => candidate < current,
            ViolationReason::AboveMax => candidate > current,
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::BelowMin => f.write_str("below_min"),
            ViolationReason::AboveMax => f.write_str("above_max"),
        }
    }
}
