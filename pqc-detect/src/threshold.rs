//! Threshold engine
//!
//! Decides whether a single metric value violates its resolved bounds and,
//! once a violation run closes, which severity tier it belongs to.
//!
//! Detection and classification use different bounds on purpose:
//! - **Detection** uses the tightest bound across the base threshold, both
//!   severity tiers and the compiled default. Any value outside it is a
//!   violation.
//! - **Classification** scans the tiers in priority order (`critical` before
//!   `non_critical`) and picks the first one whose boundary is breached.

use pqc_common::{Severity, SeverityRule, SeverityRules, ThresholdBounds, ViolationReason};
use serde::{Deserialize, Serialize};

/// Check `value` against `bounds`
///
/// The low side is checked first, so a degenerate range where both sides
/// fire reports [`ViolationReason::BelowMin`].
pub fn evaluate(value: f64, bounds: &ThresholdBounds) -> Option<ViolationReason> {
    if let Some(min) = bounds.min {
        if value < min {
            return Some(ViolationReason::BelowMin);
        }
    }
    if let Some(max) = bounds.max {
        if value > max {
            return Some(ViolationReason::AboveMax);
        }
    }
    None
}

/// Classify a violating value into a severity tier
///
/// Returns `default_severity` when `value` is absent or when no tier's
/// boundary is breached in the direction of `reason`.
pub fn classify_severity(
    value: Option<f64>,
    reason: ViolationReason,
    rules: &SeverityRules,
    default_severity: Severity,
) -> Severity {
    let Some(value) = value else {
        return default_severity;
    };

    for (tier, bounds) in rules.tiers() {
        let breached = match reason {
            ViolationReason::AboveMax => bounds.max.is_some_and(|max| value > max),
            ViolationReason::BelowMin => bounds.min.is_some_and(|min| value < min),
        };
        if breached {
            return tier;
        }
    }

    default_severity
}

/// Tightest bounds across base, both tiers and the compiled defaults
///
/// The `min` side is the largest configured minimum and the `max` side the
/// smallest configured maximum, so tiers can only narrow detection.
pub fn detection_bounds(
    base: &ThresholdBounds,
    rules: &SeverityRules,
    defaults: &ThresholdBounds,
) -> ThresholdBounds {
    let candidates = [base, &rules.critical, &rules.non_critical, defaults];

    let min = candidates
        .iter()
        .filter_map(|b| b.min)
        .reduce(f64::max);
    let max = candidates
        .iter()
        .filter_map(|b| b.max)
        .reduce(f64::min);

    ThresholdBounds { min, max }
}

/// Fully resolved threshold configuration for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricThreshold {
    /// Detection threshold (already the tightest bound)
    pub threshold: ThresholdBounds,
    pub severity: SeverityRules,
    pub default_severity: Severity,
}

impl MetricThreshold {
    pub fn evaluate(&self, value: f64) -> Option<ViolationReason> {
        evaluate(value, &self.threshold)
    }

    pub fn classify(&self, value: Option<f64>, reason: ViolationReason) -> Severity {
        classify_severity(value, reason, &self.severity, self.default_severity)
    }

    /// Human-readable acceptance condition, e.g. `>= 5 and <= 235`
    pub fn condition(&self) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(min) = self.threshold.min {
            parts.push(format!(">= {}", min));
        }
        if let Some(max) = self.threshold.max {
            parts.push(format!("<= {}", max));
        }
        parts.join(" and ")
    }

    /// Boundary of `severity`'s tier on the side named by `reason`, if configured
    pub fn severity_rule(&self, severity: Severity, reason: ViolationReason) -> Option<SeverityRule> {
        let bounds = self.severity.tier(severity)?;
        let boundary = match reason {
            ViolationReason::AboveMax => bounds.max,
            ViolationReason::BelowMin => bounds.min,
        }?;
        Some(SeverityRule { reason, boundary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(critical: ThresholdBounds, non_critical: ThresholdBounds) -> SeverityRules {
        SeverityRules {
            critical,
            non_critical,
        }
    }

    #[test]
    fn test_evaluate_respects_open_sides() {
        assert_eq!(evaluate(4.0, &ThresholdBounds::min(5.0)), Some(ViolationReason::BelowMin));
        assert_eq!(evaluate(5.0, &ThresholdBounds::min(5.0)), None);
        assert_eq!(evaluate(1e9, &ThresholdBounds::min(5.0)), None);
        assert_eq!(evaluate(236.0, &ThresholdBounds::max(235.0)), Some(ViolationReason::AboveMax));
        assert_eq!(evaluate(235.0, &ThresholdBounds::max(235.0)), None);
        assert_eq!(evaluate(0.0, &ThresholdBounds::default()), None);
    }

    #[test]
    fn test_evaluate_checks_min_first() {
        // Inverted range: every value violates both sides
        let bounds = ThresholdBounds::range(10.0, 0.0);
        assert_eq!(evaluate(5.0, &bounds), Some(ViolationReason::BelowMin));
    }

    #[test]
    fn test_classify_absent_value_uses_default() {
        let rules = rules(ThresholdBounds::max(1.0), ThresholdBounds::max(0.5));
        assert_eq!(
            classify_severity(None, ViolationReason::AboveMax, &rules, Severity::Critical),
            Severity::Critical
        );
    }

    #[test]
    fn test_classify_critical_takes_precedence() {
        let rules = rules(ThresholdBounds::max(10.0), ThresholdBounds::max(5.0));
        let classify = |v| classify_severity(Some(v), ViolationReason::AboveMax, &rules, Severity::NonCritical);

        assert_eq!(classify(11.0), Severity::Critical);
        assert_eq!(classify(7.0), Severity::NonCritical);
        // Nothing breached: default tier
        assert_eq!(classify(5.0), Severity::NonCritical);
    }

    #[test]
    fn test_classify_below_min_only_looks_at_min() {
        let rules = rules(ThresholdBounds::min(-60.0), ThresholdBounds::max(0.0));
        assert_eq!(
            classify_severity(Some(-70.0), ViolationReason::BelowMin, &rules, Severity::Informational),
            Severity::Critical
        );
        // non_critical has no min, so a mild low value falls back to the default
        assert_eq!(
            classify_severity(Some(-50.0), ViolationReason::BelowMin, &rules, Severity::Informational),
            Severity::Informational
        );
    }

    #[test]
    fn test_detection_bounds_take_tightest() {
        let base = ThresholdBounds::range(10.0, 200.0);
        let tiers = rules(ThresholdBounds::range(5.0, 220.0), ThresholdBounds::range(12.0, 190.0));
        let defaults = ThresholdBounds::range(16.0, 235.0);

        let detection = detection_bounds(&base, &tiers, &defaults);

        assert_eq!(detection, ThresholdBounds::range(16.0, 190.0));
    }

    #[test]
    fn test_detection_bounds_empty_when_nothing_configured() {
        let detection = detection_bounds(
            &ThresholdBounds::default(),
            &SeverityRules::default(),
            &ThresholdBounds::default(),
        );
        assert!(detection.is_empty());
    }

    #[test]
    fn test_condition_and_severity_rule() {
        let metric = MetricThreshold {
            threshold: ThresholdBounds::range(16.0, 235.0),
            severity: rules(ThresholdBounds::max(250.0), ThresholdBounds::range(16.0, 235.0)),
            default_severity: Severity::NonCritical,
        };

        assert_eq!(metric.condition(), ">= 16 and <= 235");
        assert_eq!(
            metric.severity_rule(Severity::Critical, ViolationReason::AboveMax),
            Some(SeverityRule {
                reason: ViolationReason::AboveMax,
                boundary: 250.0
            })
        );
        assert_eq!(metric.severity_rule(Severity::Critical, ViolationReason::BelowMin), None);
        assert_eq!(metric.severity_rule(Severity::Informational, ViolationReason::AboveMax), None);
    }
}
