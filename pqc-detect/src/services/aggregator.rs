//! Issue aggregation and severity roll-up

use pqc_common::{Issue, Severity};
use serde::{Deserialize, Serialize};

/// Worst tier present in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Critical,
    NonCritical,
    #[default]
    Clear,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub non_critical: usize,
    pub informational: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub overall: OverallStatus,
    pub counts: SeverityCounts,
    pub total: usize,
}

impl SeveritySummary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut counts = SeverityCounts::default();
        for issue in issues {
            match issue.severity {
                Severity::Critical => counts.critical += 1,
                Severity::NonCritical => counts.non_critical += 1,
                Severity::Informational => counts.informational += 1,
            }
        }

        // Informational issues still make the run non-clear
        let overall = if counts.critical > 0 {
            OverallStatus::Critical
        } else if !issues.is_empty() {
            OverallStatus::NonCritical
        } else {
            OverallStatus::Clear
        };

        Self {
            overall,
            counts,
            total: issues.len(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedIssues {
    pub issues: Vec<Issue>,
    pub severity_summary: SeveritySummary,
}

/// Merge producer outputs into one stream ordered by start time
///
/// The sort is stable, so issues with equal start times keep producer order.
pub fn aggregate<I>(streams: I) -> AggregatedIssues
where
    I: IntoIterator<Item = Vec<Issue>>,
{
    let mut issues: Vec<Issue> = streams.into_iter().flatten().collect();
    issues.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    AggregatedIssues {
        severity_summary: SeveritySummary::from_issues(&issues),
        issues,
    }
}
