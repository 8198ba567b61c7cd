//! Severity tiers for issue events
//!
//! Threshold rules only ever classify into [`Severity::Critical`] or
//! [`Severity::NonCritical`]; [`Severity::Informational`] exists for
//! detectors configured to report without an intrinsic severity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity classification of an issue
///
/// Serializes as the snake_case wire label. Deserialization goes through
/// [`Severity::from_label`], so issues recorded by other tools with legacy
/// labels are normalized on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Severity {
    /// Must be fixed before delivery
    Critical,
    /// Worth reviewing, not blocking
    NonCritical,
    /// Display-only finding
    Informational,
}

impl Severity {
    /// Tiers that carry threshold rules, in classification priority order.
    pub const RULE_TIERS: [Severity; 2] = [Severity::Critical, Severity::NonCritical];

    /// Fallback tier for absent or invalid configuration.
    pub const DEFAULT: Severity = Severity::NonCritical;

    /// Wire label (`critical`, `non_critical`, `informational`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::NonCritical => "non_critical",
            Severity::Informational => "informational",
        }
    }

    /// Parse a configured tier label strictly.
    ///
    /// Returns `None` for anything that is not one of the three wire labels.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "critical" => Some(Severity::Critical),
            "non_critical" => Some(Severity::NonCritical),
            "informational" => Some(Severity::Informational),
            _ => None,
        }
    }

    /// Parse a tier label that may be used by a threshold rule.
    ///
    /// Invalid or missing labels, including `informational`, resolve to
    /// [`Severity::DEFAULT`].
    pub fn rule_tier_or_default(label: Option<&str>) -> Self {
        match label.and_then(Severity::parse) {
            Some(tier) if Severity::RULE_TIERS.contains(&tier) => tier,
            _ => Severity::DEFAULT,
        }
    }

    /// Parse a tier label that may be used as a detector default.
    ///
    /// All three tiers are accepted; anything else resolves to
    /// [`Severity::DEFAULT`].
    pub fn detector_tier_or_default(label: Option<&str>) -> Self {
        label.and_then(Severity::parse).unwrap_or(Severity::DEFAULT)
    }

    /// Lenient normalization for labels produced outside the core.
    ///
    /// Accepts legacy aliases (`high`, `info`, `notice`) and hyphenated
    /// spellings; everything unrecognized counts as non-critical.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "critical" | "high" => Severity::Critical,
            "informational" | "info" | "notice" => Severity::Informational,
            _ => Severity::NonCritical,
        }
    }
}

impl From<String> for Severity {
    fn from(label: String) -> Self {
        Severity::from_label(&label)
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::DEFAULT
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
