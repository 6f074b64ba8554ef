//! Bounded polling and the app ready signal.
//!
//! Every suspension point in the harness goes through [`PollLoop`]: attempt,
//! then sleep with capped exponential backoff until the deadline. Nothing
//! here retries forever.

use crate::config::PollSettings;
use crate::driver::DomDriver;
use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default interval cap (500ms)
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 500;

/// Root marker every rendered app view carries
pub const DEFAULT_ROOT_MARKER: &str = "[data-testid=\"stAppViewContainer\"]";

/// Indicator present while the app is still running its script
pub const DEFAULT_BUSY_INDICATOR: &str = "[data-testid=\"stStatusWidget\"]";

// =============================================================================
// DOCUMENT STATE
// =============================================================================

/// `document.readyState` of the loaded page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Still parsing
    #[default]
    Loading,
    /// Parsed, subresources pending
    Interactive,
    /// `load` has fired
    Complete,
}

impl DocumentState {
    /// Parse a `document.readyState` value. Unknown values count as loading.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "complete" => Self::Complete,
            "interactive" => Self::Interactive,
            _ => Self::Loading,
        }
    }

    /// The `document.readyState` string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Interactive => "interactive",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// First polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Polling interval cap in milliseconds
    pub max_poll_interval_ms: u64,
    /// Interval multiplier after each miss
    pub backoff_factor: f64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_interval_ms: DEFAULT_MAX_POLL_INTERVAL_MS,
            backoff_factor: 2.0,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured poll settings and a timeout
    #[must_use]
    pub fn from_settings(settings: &PollSettings, timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms: settings.interval_ms,
            max_poll_interval_ms: settings.max_interval_ms,
            backoff_factor: settings.backoff_factor,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        if self.max_poll_interval_ms < poll_interval_ms {
            self.max_poll_interval_ms = poll_interval_ms;
        }
        self
    }

    /// Set the interval cap in milliseconds
    #[must_use]
    pub const fn with_max_poll_interval(mut self, max_ms: u64) -> Self {
        self.max_poll_interval_ms = max_ms;
        self
    }

    /// Set the backoff multiplier
    #[must_use]
    pub const fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Start a poll loop; the clock starts now
    #[must_use]
    pub fn start(&self) -> PollLoop {
        PollLoop {
            started: Instant::now(),
            timeout: self.timeout(),
            next_interval: self.poll_interval(),
            max_interval: Duration::from_millis(
                self.max_poll_interval_ms.max(self.poll_interval_ms),
            ),
            factor: self.backoff_factor.max(1.0),
            attempts: 1,
        }
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

/// Deadline-bounded retry clock.
///
/// The caller makes an attempt, and on a miss calls [`PollLoop::next_attempt`],
/// which sleeps and returns `false` once the deadline has passed. The last
/// sleep is clipped so a final attempt always lands at the deadline.
#[derive(Debug, Clone)]
pub struct PollLoop {
    started: Instant,
    timeout: Duration,
    next_interval: Duration,
    max_interval: Duration,
    factor: f64,
    attempts: u32,
}

impl PollLoop {
    /// Attempts made so far, counting the one in progress
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time since the loop started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.timeout
    }

    /// Sleep until the next attempt is due.
    ///
    /// Returns `false` without sleeping once the deadline has passed.
    pub async fn next_attempt(&mut self) -> bool {
        let elapsed = self.elapsed();
        if elapsed >= self.timeout {
            return false;
        }
        let remaining = self.timeout - elapsed;
        sleep(self.next_interval.min(remaining)).await;
        // An infinite or overflowing product saturates at the cap
        self.next_interval =
            Duration::try_from_secs_f64(self.next_interval.as_secs_f64() * self.factor)
                .map_or(self.max_interval, |next| next.min(self.max_interval));
        self.attempts += 1;
        true
    }
}

// =============================================================================
// READY SIGNAL
// =============================================================================

/// What "the app finished its initial render" means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadySignal {
    /// CSS selector that must match at least once
    pub root_marker: String,
    /// CSS selector that must match nothing (app still busy while present)
    pub busy_indicator: Option<String>,
    /// Require `document.readyState == "complete"`
    pub require_complete: bool,
    /// Consecutive satisfied polls with an unchanged root count
    pub settle_polls: u32,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self {
            root_marker: DEFAULT_ROOT_MARKER.to_string(),
            busy_indicator: Some(DEFAULT_BUSY_INDICATOR.to_string()),
            require_complete: true,
            settle_polls: 2,
        }
    }
}

impl ReadySignal {
    /// Ready as soon as `root_marker` is present
    #[must_use]
    pub fn marker(root_marker: impl Into<String>) -> Self {
        Self {
            root_marker: root_marker.into(),
            busy_indicator: None,
            require_complete: true,
            settle_polls: 1,
        }
    }

    /// Set the busy indicator
    #[must_use]
    pub fn with_busy_indicator(mut self, selector: impl Into<String>) -> Self {
        self.busy_indicator = Some(selector.into());
        self
    }

    /// Set the number of settle polls
    #[must_use]
    pub const fn with_settle_polls(mut self, polls: u32) -> Self {
        self.settle_polls = polls;
        self
    }

    /// Take one observation of the page
    ///
    /// # Errors
    ///
    /// Propagates driver errors
    pub async fn observe(&self, driver: &dyn DomDriver) -> HarnessResult<ReadyObservation> {
        let state = driver.document_state().await?;
        let roots = driver.query_all(&Selector::css(&self.root_marker)).await?.len();
        let busy = match self.busy_indicator {
            Some(ref css) => driver.query_all(&Selector::css(css)).await?.len(),
            None => 0,
        };
        Ok(ReadyObservation { state, roots, busy })
    }

    /// Whether one observation satisfies the signal (settling aside)
    #[must_use]
    pub fn accepts(&self, observation: &ReadyObservation) -> bool {
        let state_ok = !self.require_complete || observation.state == DocumentState::Complete;
        state_ok && observation.roots > 0 && observation.busy == 0
    }
}

/// One look at the page while waiting for readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyObservation {
    /// Document ready state
    pub state: DocumentState,
    /// Root marker matches
    pub roots: usize,
    /// Busy indicator matches
    pub busy: usize,
}

impl fmt::Display for ReadyObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "readyState={}, root markers={}, busy indicators={}",
            self.state, self.roots, self.busy
        )
    }
}

/// Outcome of a successful ready wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyReport {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Observations taken
    pub attempts: u32,
    /// Root marker count at the settled observation
    pub root_count: usize,
}

/// Poll until `signal` holds for `settle_polls` consecutive observations.
///
/// # Errors
///
/// Returns [`HarnessError::Timeout`] with the last observation if the
/// deadline passes first, or any driver error immediately.
pub async fn wait_for_ready(
    driver: &dyn DomDriver,
    signal: &ReadySignal,
    options: &WaitOptions,
) -> HarnessResult<ReadyReport> {
    let settle = signal.settle_polls.max(1);
    let mut poll = options.start();
    let mut stable = 0_u32;
    let mut last_roots: Option<usize> = None;

    loop {
        let observation = signal.observe(driver).await?;
        if signal.accepts(&observation) {
            stable = if last_roots == Some(observation.roots) {
                stable + 1
            } else {
                1
            };
            last_roots = Some(observation.roots);
            if stable >= settle {
                return Ok(ReadyReport {
                    elapsed: poll.elapsed(),
                    attempts: poll.attempts(),
                    root_count: observation.roots,
                });
            }
        } else {
            stable = 0;
            last_roots = None;
        }
        debug!(attempt = poll.attempts(), %observation, "app not ready");

        if !poll.next_attempt().await {
            return Err(HarnessError::Timeout {
                ms: options.timeout_ms,
                waited_for: format!("ready signal ({observation})"),
            });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::{MockDocument, MockDriver, MockElement};

    mod document_state_tests {
        use super::*;

        #[test]
        fn test_parse() {
            assert_eq!(DocumentState::parse("complete"), DocumentState::Complete);
            assert_eq!(DocumentState::parse("interactive"), DocumentState::Interactive);
            assert_eq!(DocumentState::parse("loading"), DocumentState::Loading);
            assert_eq!(DocumentState::parse("bogus"), DocumentState::Loading);
        }

        #[test]
        fn test_display() {
            assert_eq!(DocumentState::Complete.to_string(), "complete");
        }
    }

    mod wait_options_tests {
        use super::*;

        #[test]
        fn test_wait_options_default() {
            let opts = WaitOptions::default();
            assert_eq!(opts.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(opts.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
            assert_eq!(opts.max_poll_interval_ms, DEFAULT_MAX_POLL_INTERVAL_MS);
        }

        #[test]
        fn test_poll_interval_raises_cap() {
            let opts = WaitOptions::new()
                .with_max_poll_interval(10)
                .with_poll_interval(100);
            assert_eq!(opts.max_poll_interval_ms, 100);
        }

        #[test]
        fn test_from_settings() {
            let settings = PollSettings {
                interval_ms: 20,
                max_interval_ms: 80,
                backoff_factor: 1.5,
            };
            let opts = WaitOptions::from_settings(&settings, 1234);
            assert_eq!(opts.timeout_ms, 1234);
            assert_eq!(opts.poll_interval(), Duration::from_millis(20));
            assert_eq!(opts.max_poll_interval_ms, 80);
        }
    }

    mod poll_loop_tests {
        use super::*;

        #[tokio::test]
        async fn test_poll_loop_expires() {
            let mut poll = WaitOptions::new()
                .with_timeout(60)
                .with_poll_interval(10)
                .start();
            let mut extra = 0;
            while poll.next_attempt().await {
                extra += 1;
                assert!(extra < 100, "poll loop never expired");
            }
            assert!(poll.is_expired());
            assert!(poll.elapsed() >= Duration::from_millis(60));
            assert_eq!(poll.attempts(), extra + 1);
        }

        #[tokio::test]
        async fn test_backoff_is_capped() {
            let mut poll = WaitOptions::new()
                .with_timeout(1_000)
                .with_poll_interval(5)
                .with_max_poll_interval(20)
                .with_backoff(4.0)
                .start();
            for _ in 0..3 {
                assert!(poll.next_attempt().await);
            }
            assert_eq!(poll.next_interval, Duration::from_millis(20));
        }

        #[tokio::test]
        async fn test_unbounded_backoff_saturates_at_cap() {
            let mut poll = WaitOptions::new()
                .with_timeout(200)
                .with_poll_interval(5)
                .with_max_poll_interval(15)
                .with_backoff(f64::INFINITY)
                .start();
            assert!(poll.next_attempt().await);
            assert_eq!(poll.next_interval, Duration::from_millis(15));
            assert!(poll.next_attempt().await);
            assert_eq!(poll.next_interval, Duration::from_millis(15));
        }

        #[tokio::test]
        async fn test_nan_backoff_does_not_grow() {
            let mut poll = WaitOptions::new()
                .with_timeout(200)
                .with_poll_interval(5)
                .with_max_poll_interval(15)
                .with_backoff(f64::NAN)
                .start();
            assert!(poll.next_attempt().await);
            assert_eq!(poll.next_interval, Duration::from_millis(5));
        }

        #[tokio::test]
        async fn test_zero_timeout_never_sleeps() {
            let mut poll = WaitOptions::new().with_timeout(0).start();
            assert!(!poll.next_attempt().await);
            assert_eq!(poll.attempts(), 1);
        }
    }

    mod ready_signal_tests {
        use super::*;

        fn fast() -> WaitOptions {
            WaitOptions::new().with_timeout(500).with_poll_interval(5)
        }

        fn app_root() -> MockElement {
            MockElement::new("div").with_test_id("stAppViewContainer")
        }

        #[test]
        fn test_accepts_requires_all_conditions() {
            let signal = ReadySignal::default();
            let ok = ReadyObservation {
                state: DocumentState::Complete,
                roots: 1,
                busy: 0,
            };
            assert!(signal.accepts(&ok));
            assert!(!signal.accepts(&ReadyObservation { roots: 0, ..ok }));
            assert!(!signal.accepts(&ReadyObservation { busy: 1, ..ok }));
            assert!(!signal.accepts(&ReadyObservation {
                state: DocumentState::Interactive,
                ..ok
            }));
        }

        #[tokio::test]
        async fn test_ready_immediately() {
            let doc = MockDocument::new().with_element(app_root());
            let mut driver = MockDriver::serving("http://app/", doc);
            driver.navigate("http://app/").await.unwrap();

            let report = wait_for_ready(&driver, &ReadySignal::default(), &fast())
                .await
                .unwrap();
            assert_eq!(report.root_count, 1);
            assert_eq!(report.attempts, 2, "two polls needed to settle");
        }

        #[tokio::test]
        async fn test_waits_for_busy_indicator_to_clear() {
            let doc = MockDocument::new().with_element(app_root()).with_element(
                MockElement::new("div")
                    .with_test_id("stStatusWidget")
                    .removed_after(Duration::from_millis(40)),
            );
            let mut driver = MockDriver::serving("http://app/", doc);
            driver.navigate("http://app/").await.unwrap();

            let report = wait_for_ready(&driver, &ReadySignal::default(), &fast())
                .await
                .unwrap();
            assert!(report.elapsed >= Duration::from_millis(40));
        }

        #[tokio::test]
        async fn test_waits_for_document_complete() {
            let doc = MockDocument::new()
                .with_element(app_root())
                .complete_after(Duration::from_millis(30));
            let mut driver = MockDriver::serving("http://app/", doc);
            driver.navigate("http://app/").await.unwrap();

            let signal = ReadySignal::marker("[data-testid=\"stAppViewContainer\"]");
            let report = wait_for_ready(&driver, &signal, &fast()).await.unwrap();
            assert!(report.elapsed >= Duration::from_millis(30));
        }

        #[tokio::test]
        async fn test_times_out_without_marker() {
            let mut driver = MockDriver::serving("http://app/", MockDocument::new());
            driver.navigate("http://app/").await.unwrap();

            let options = WaitOptions::new().with_timeout(50).with_poll_interval(5);
            let err = wait_for_ready(&driver, &ReadySignal::default(), &options)
                .await
                .unwrap_err();
            match err {
                HarnessError::Timeout { ms, waited_for } => {
                    assert_eq!(ms, 50);
                    assert!(waited_for.contains("root markers=0"));
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }
    }
}
