//! Suite and scenario outcomes.
//!
//! Reports are plain serde values so the CLI can print them as text or JSON,
//! and so two runs can be compared outcome by outcome.

use crate::result::{HarnessError, HarnessResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;

/// Scenario result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// Every expectation held
    Passed,
    /// Setup, selection, assertion, or timeout failure
    Failed,
}

impl ScenarioStatus {
    /// Short label used in text output
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
        }
    }
}

/// Result of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    /// Scenario description
    pub description: String,
    /// Pass or fail
    pub status: ScenarioStatus,
    /// Wall time spent in the scenario body
    pub duration_ms: u64,
    /// Machine-readable error kind (see [`HarnessError::kind`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioOutcome {
    /// A passing outcome
    #[must_use]
    pub fn passed(description: impl Into<String>, duration: Duration) -> Self {
        Self {
            description: description.into(),
            status: ScenarioStatus::Passed,
            duration_ms: millis(duration),
            error_kind: None,
            error: None,
        }
    }

    /// A failing outcome caused by `error`
    #[must_use]
    pub fn failed(
        description: impl Into<String>,
        duration: Duration,
        error: &HarnessError,
    ) -> Self {
        Self::failed_with(description, duration, error.kind(), error.to_string())
    }

    /// A failing outcome with an explicit kind and message
    #[must_use]
    pub fn failed_with(
        description: impl Into<String>,
        duration: Duration,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            status: ScenarioStatus::Failed,
            duration_ms: millis(duration),
            error_kind: Some(kind.into()),
            error: Some(message.into()),
        }
    }

    /// Whether the scenario passed
    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

/// Result of one suite run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    /// Suite name
    pub suite: String,
    /// URL loaded by the suite's setup
    pub url: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Total wall time, setup and teardown included
    pub duration_ms: u64,
    /// Setup (`load_app`) failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    /// Scenario outcomes in declaration order
    pub scenarios: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Start an empty report
    #[must_use]
    pub fn new(suite: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            url: url.into(),
            started_at: Utc::now(),
            duration_ms: 0,
            setup_error: None,
            scenarios: Vec::new(),
        }
    }

    /// Set the total duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = millis(duration);
        self
    }

    /// Whether setup succeeded and every scenario passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.setup_error.is_none() && self.scenarios.iter().all(ScenarioOutcome::is_passed)
    }

    /// Number of passing scenarios
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.scenarios.iter().filter(|s| s.is_passed()).count()
    }

    /// Number of failing scenarios
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.scenarios.len() - self.passed_count()
    }

    /// Description and status of each scenario, ignoring timings
    #[must_use]
    pub fn signature(&self) -> Vec<(String, ScenarioStatus)> {
        self.scenarios
            .iter()
            .map(|s| (s.description.clone(), s.status))
            .collect()
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Json`] if serialization fails
    pub fn to_json(&self) -> HarnessResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report produced by [`SuiteReport::to_json`]
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Json`] for malformed input
    pub fn from_json(raw: &str) -> HarnessResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Unstyled multi-line summary
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = format!("{} ({})\n", self.suite, self.url);
        if let Some(ref err) = self.setup_error {
            let _ = writeln!(out, "  before: {err}");
        }
        for s in &self.scenarios {
            let _ = writeln!(
                out,
                "  {} {} ({}ms)",
                s.status.label(),
                s.description,
                s.duration_ms
            );
            if let Some(ref err) = s.error {
                let _ = writeln!(out, "       {err}");
            }
        }
        let _ = write!(
            out,
            "  {} passed, {} failed in {}ms",
            self.passed_count(),
            self.failed_count(),
            self.duration_ms
        );
        out
    }
}

/// Whether every report passed
#[must_use]
pub fn all_passed(reports: &[SuiteReport]) -> bool {
    reports.iter().all(SuiteReport::all_passed)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> SuiteReport {
        let mut report = SuiteReport::new("st_json", "http://localhost:3000/")
            .with_duration(Duration::from_millis(1500));
        report.scenarios.push(ScenarioOutcome::passed(
            "displays expanded json",
            Duration::from_millis(12),
        ));
        report.scenarios.push(ScenarioOutcome::failed(
            "displays collapsed json",
            Duration::from_millis(4000),
            &HarnessError::NotFound {
                selector: "[data-testid=\"stJson\"]".to_string(),
                index: 1,
                found: 1,
            },
        ));
        report
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.passed_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.all_passed());
        assert!(!all_passed(&[report]));
    }

    #[test]
    fn test_setup_error_fails_suite() {
        let mut report = SuiteReport::new("s", "http://x/");
        assert!(report.all_passed());
        report.setup_error = Some("unreachable".to_string());
        assert!(!report.all_passed());
    }

    #[test]
    fn test_json_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["suite"], "st_json");
        assert_eq!(value["scenarios"][0]["status"], "passed");
        assert!(value["scenarios"][0].get("error").is_none());
        assert_eq!(value["scenarios"][1]["error_kind"], "not_found");
        let parsed = SuiteReport::from_json(&json).unwrap();
        assert_eq!(parsed.signature(), sample().signature());
        assert_eq!(parsed.duration_ms, 1500);
    }

    #[test]
    fn test_signature_ignores_timing() {
        let a = sample();
        let mut b = sample();
        b.scenarios[0].duration_ms = 999;
        b.duration_ms = 1;
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_render_text() {
        let text = sample().render_text();
        assert!(text.starts_with("st_json (http://localhost:3000/)"));
        assert!(text.contains("PASS displays expanded json"));
        assert!(text.contains("FAIL displays collapsed json"));
        assert!(text.contains("1 passed, 1 failed"));
    }
}
