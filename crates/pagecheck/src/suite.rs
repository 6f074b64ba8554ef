//! Suite runner.
//!
//! A [`Suite`] is a `before` hook that loads the app once, followed by
//! scenarios run one at a time in declaration order against the same
//! [`Session`]. The browser context is always closed at the end, whether the
//! run passed, failed, or timed out.

use crate::config::HarnessConfig;
use crate::driver::DomDriver;
use crate::reporter::{ScenarioOutcome, SuiteReport};
use crate::result::{HarnessError, HarnessResult};
use crate::session::Session;
use futures::future::{join_all, BoxFuture};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Future returned by a scenario body
pub type ScenarioFuture<'a> = BoxFuture<'a, HarnessResult<()>>;

type ScenarioBody = Arc<dyn for<'a> Fn(&'a Session) -> ScenarioFuture<'a> + Send + Sync>;

/// One named check run against the loaded app
#[derive(Clone)]
pub struct Scenario {
    description: String,
    timeout: Option<Duration>,
    body: ScenarioBody,
}

impl Scenario {
    /// Create a scenario
    #[must_use]
    pub fn new<F>(description: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a Session) -> ScenarioFuture<'a> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            timeout: None,
            body: Arc::new(body),
        }
    }

    /// Override the configured per-scenario timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// A `before` load plus ordered scenarios
#[derive(Debug, Clone)]
pub struct Suite {
    name: String,
    url: Option<String>,
    scenarios: Vec<Scenario>,
}

impl Suite {
    /// Create an empty suite that loads the configured base URL
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            scenarios: Vec::new(),
        }
    }

    /// Load `url` in the `before` hook instead of the configured base URL
    #[must_use]
    pub fn before_load(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Append a scenario
    #[must_use]
    pub fn scenario<F>(self, description: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a Session) -> ScenarioFuture<'a> + Send + Sync + 'static,
    {
        self.with_scenario(Scenario::new(description, body))
    }

    /// Append a prepared scenario
    #[must_use]
    pub fn with_scenario(mut self, scenario: Scenario) -> Self {
        self.scenarios.push(scenario);
        self
    }

    /// Get the suite name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL the `before` hook loads under `config`
    #[must_use]
    pub fn url<'a>(&'a self, config: &'a HarnessConfig) -> &'a str {
        self.url.as_deref().unwrap_or(&config.base_url)
    }

    /// Scenarios in declaration order
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Run the suite on `driver`, which the suite closes before returning
    pub async fn run(&self, driver: Box<dyn DomDriver>, config: &HarnessConfig) -> SuiteReport {
        let started = Instant::now();
        let url = self.url(config).to_string();
        let suite_budget = config.timeouts.suite();
        let mut report = SuiteReport::new(&self.name, &url);
        let mut session = Session::new(driver, config.clone());

        info!(suite = %self.name, %url, scenarios = self.scenarios.len(), "suite started");

        let setup = match tokio::time::timeout(suite_budget, session.load_app(&url)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(suite_timeout(config)),
        };

        match setup {
            Ok(()) => {
                for scenario in &self.scenarios {
                    let outcome = self
                        .run_scenario(scenario, &session, config, started + suite_budget)
                        .await;
                    report.scenarios.push(outcome);
                }
            }
            Err(e) => {
                warn!(suite = %self.name, error = %e, "before hook failed");
                report = self.setup_failure(report, &e);
            }
        }

        let teardown = config.timeouts.teardown();
        match tokio::time::timeout(teardown, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(suite = %self.name, error = %e, "teardown failed"),
            Err(_) => warn!(
                suite = %self.name,
                timeout_ms = config.timeouts.teardown_ms,
                "teardown timed out, abandoning browser context"
            ),
        }

        let report = report.with_duration(started.elapsed());
        info!(
            suite = %self.name,
            passed = report.passed_count(),
            failed = report.failed_count(),
            duration_ms = report.duration_ms,
            "suite finished"
        );
        report
    }

    /// Report every scenario failed because no driver could be created
    #[must_use]
    pub fn report_setup_failure(
        &self,
        config: &HarnessConfig,
        error: &HarnessError,
    ) -> SuiteReport {
        self.setup_failure(SuiteReport::new(&self.name, self.url(config)), error)
    }

    fn setup_failure(&self, mut report: SuiteReport, error: &HarnessError) -> SuiteReport {
        let message = format!("before hook failed: {error}");
        report.setup_error = Some(error.to_string());
        report.scenarios = self
            .scenarios
            .iter()
            .map(|s| {
                ScenarioOutcome::failed_with(&s.description, Duration::ZERO, error.kind(), &message)
            })
            .collect();
        report
    }

    async fn run_scenario(
        &self,
        scenario: &Scenario,
        session: &Session,
        config: &HarnessConfig,
        deadline: Instant,
    ) -> ScenarioOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ScenarioOutcome::failed(
                &scenario.description,
                Duration::ZERO,
                &suite_timeout(config),
            );
        }

        let limit = scenario
            .timeout
            .unwrap_or_else(|| config.timeouts.scenario())
            .min(remaining);
        let started = Instant::now();
        let outcome = match tokio::time::timeout(limit, (scenario.body)(session)).await {
            Ok(Ok(())) => ScenarioOutcome::passed(&scenario.description, started.elapsed()),
            Ok(Err(e)) => ScenarioOutcome::failed(&scenario.description, started.elapsed(), &e),
            Err(_) => ScenarioOutcome::failed(
                &scenario.description,
                started.elapsed(),
                &HarnessError::Timeout {
                    ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    waited_for: format!("scenario {:?}", scenario.description),
                },
            ),
        };

        if outcome.is_passed() {
            info!(suite = %self.name, scenario = %scenario.description, "passed");
        } else {
            warn!(
                suite = %self.name,
                scenario = %scenario.description,
                error = outcome.error.as_deref().unwrap_or_default(),
                "failed"
            );
        }
        outcome
    }
}

fn suite_timeout(config: &HarnessConfig) -> HarnessError {
    HarnessError::Timeout {
        ms: config.timeouts.suite_ms,
        waited_for: "suite".to_string(),
    }
}

/// Run suites one after another, each on a fresh driver
pub async fn run_suites<F, Fut>(
    suites: &[Suite],
    config: &HarnessConfig,
    make_driver: F,
) -> Vec<SuiteReport>
where
    F: Fn() -> Fut,
    Fut: Future<Output = HarnessResult<Box<dyn DomDriver>>>,
{
    let mut reports = Vec::with_capacity(suites.len());
    for suite in suites {
        reports.push(run_one(suite, config, make_driver()).await);
    }
    reports
}

/// Run suites concurrently, each on its own driver, and join the reports
/// (returned in the order of `suites`)
pub async fn run_suites_parallel<F, Fut>(
    suites: &[Suite],
    config: &HarnessConfig,
    make_driver: F,
) -> Vec<SuiteReport>
where
    F: Fn() -> Fut,
    Fut: Future<Output = HarnessResult<Box<dyn DomDriver>>>,
{
    join_all(
        suites
            .iter()
            .map(|suite| run_one(suite, config, make_driver())),
    )
    .await
}

async fn run_one<Fut>(suite: &Suite, config: &HarnessConfig, driver: Fut) -> SuiteReport
where
    Fut: Future<Output = HarnessResult<Box<dyn DomDriver>>>,
{
    match driver.await {
        Ok(driver) => suite.run(driver, config).await,
        Err(e) => {
            warn!(suite = %suite.name, error = %e, "no driver");
            suite.report_setup_failure(config, &e)
        }
    }
}
