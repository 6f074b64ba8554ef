//! Harness configuration.
//!
//! Loaded from YAML, then overridden from the environment and finally by
//! the caller (the CLI applies its flags last).

use crate::result::{HarnessError, HarnessResult};
use crate::wait::{ReadySignal, WaitOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default base URL of the application under test
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

/// Environment variable overriding [`HarnessConfig::base_url`]
pub const BASE_URL_ENV: &str = "PAGECHECK_BASE_URL";

/// Environment variable overriding [`BrowserConfig::chromium_path`]
pub const CHROMIUM_PATH_ENV: &str = "CHROMIUM_PATH";

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 800,
            chromium_path: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Upper bounds for every suspension point, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Navigation plus ready-wait
    pub load_ms: u64,
    /// Element presence polling
    pub select_ms: u64,
    /// One scenario body
    pub scenario_ms: u64,
    /// A whole suite: the app load and every scenario
    pub suite_ms: u64,
    /// HTTP reachability check
    pub preflight_ms: u64,
    /// Closing the browser context after the last scenario
    pub teardown_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            load_ms: 30_000,
            select_ms: 4_000,
            scenario_ms: 60_000,
            suite_ms: 300_000,
            preflight_ms: 5_000,
            teardown_ms: 10_000,
        }
    }
}

impl Timeouts {
    /// Scenario timeout as a `Duration`
    #[must_use]
    pub const fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }

    /// Suite timeout as a `Duration`
    #[must_use]
    pub const fn suite(&self) -> Duration {
        Duration::from_millis(self.suite_ms)
    }

    /// Preflight timeout as a `Duration`
    #[must_use]
    pub const fn preflight(&self) -> Duration {
        Duration::from_millis(self.preflight_ms)
    }

    /// Teardown timeout as a `Duration`
    #[must_use]
    pub const fn teardown(&self) -> Duration {
        Duration::from_millis(self.teardown_ms)
    }

    /// Load timeout as a `Duration`
    #[must_use]
    pub const fn load(&self) -> Duration {
        Duration::from_millis(self.load_ms)
    }
}

/// Polling cadence shared by loading and selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// First interval between attempts
    pub interval_ms: u64,
    /// Interval cap after backoff
    pub max_interval_ms: u64,
    /// Multiplier applied to the interval after each miss
    pub backoff_factor: f64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            max_interval_ms: 500,
            backoff_factor: 2.0,
        }
    }
}

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the application under test
    pub base_url: String,
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Suspension-point timeouts
    pub timeouts: Timeouts,
    /// Polling cadence
    pub polling: PollSettings,
    /// What "the app finished rendering" means
    pub ready: ReadySignal,
    /// Check the URL over plain HTTP before navigating
    pub preflight: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            browser: BrowserConfig::default(),
            timeouts: Timeouts::default(),
            polling: PollSettings::default(),
            ready: ReadySignal::default(),
            preflight: true,
        }
    }
}

impl HarnessConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a YAML file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> HarnessResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&raw)
    }

    /// Parse a config from YAML text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid config
    pub fn from_yaml(raw: &str) -> HarnessResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(raw)?)
    }

    /// Apply `PAGECHECK_BASE_URL` and `CHROMIUM_PATH` if set
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (tests pass a map)
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.base_url = url;
        }
        if let Some(path) = lookup(CHROMIUM_PATH_ENV).filter(|v| !v.is_empty()) {
            self.browser.chromium_path = Some(path);
        }
        self
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set browser settings
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    /// Set timeouts
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set polling cadence
    #[must_use]
    pub const fn with_polling(mut self, polling: PollSettings) -> Self {
        self.polling = polling;
        self
    }

    /// Set the ready signal
    #[must_use]
    pub fn with_ready_signal(mut self, ready: ReadySignal) -> Self {
        self.ready = ready;
        self
    }

    /// Enable or disable the HTTP preflight check
    #[must_use]
    pub const fn with_preflight(mut self, preflight: bool) -> Self {
        self.preflight = preflight;
        self
    }

    /// Wait options for the app loader
    #[must_use]
    pub fn load_wait(&self) -> WaitOptions {
        WaitOptions::from_settings(&self.polling, self.timeouts.load_ms)
    }

    /// Wait options for element selection
    #[must_use]
    pub fn select_wait(&self) -> WaitOptions {
        WaitOptions::from_settings(&self.polling, self.timeouts.select_ms)
    }

    /// Check the config is usable
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] describing the first problem found
    pub fn validate(&self) -> HarnessResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(HarnessError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        let t = &self.timeouts;
        if [t.load_ms, t.select_ms, t.scenario_ms, t.suite_ms, t.teardown_ms].contains(&0) {
            return Err(HarnessError::config("timeouts must be non-zero"));
        }
        if self.polling.interval_ms == 0 {
            return Err(HarnessError::config("polling.interval_ms must be non-zero"));
        }
        if self.polling.max_interval_ms < self.polling.interval_ms {
            return Err(HarnessError::config(
                "polling.max_interval_ms must be >= polling.interval_ms",
            ));
        }
        let factor = self.polling.backoff_factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(HarnessError::config(
                "polling.backoff_factor must be a finite number >= 1.0",
            ));
        }
        if self.ready.root_marker.trim().is_empty() {
            return Err(HarnessError::config("ready.root_marker must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_default_config_is_valid() {
            let config = HarnessConfig::default();
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert!(config.preflight);
            assert!(config.browser.headless);
            config.validate().unwrap();
        }

        #[test]
        fn test_browser_builder() {
            let browser = BrowserConfig::default()
                .with_viewport(800, 600)
                .with_headless(false)
                .with_chromium_path("/usr/bin/chromium")
                .with_no_sandbox();
            assert_eq!(browser.viewport_width, 800);
            assert!(!browser.headless);
            assert!(!browser.sandbox);
            assert_eq!(browser.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        }

        #[test]
        fn test_wait_options_follow_timeouts() {
            let config = HarnessConfig::default();
            assert_eq!(config.load_wait().timeout_ms, 30_000);
            assert_eq!(config.select_wait().timeout_ms, 4_000);
            assert_eq!(config.select_wait().poll_interval_ms, 50);
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HarnessConfig::from_yaml(
                "base_url: http://127.0.0.1:8501/\ntimeouts:\n  select_ms: 9000\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "http://127.0.0.1:8501/");
            assert_eq!(config.timeouts.select_ms, 9000);
            assert_eq!(config.timeouts.load_ms, 30_000);
            assert!(config.preflight);
        }

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(HarnessConfig::from_yaml("  \n").unwrap(), HarnessConfig::default());
        }

        #[test]
        fn test_load_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "preflight: false").unwrap();
            writeln!(file, "ready:").unwrap();
            writeln!(file, "  root_marker: \"#root\"").unwrap();
            let config = HarnessConfig::load(file.path()).unwrap();
            assert!(!config.preflight);
            assert_eq!(config.ready.root_marker, "#root");
        }

        #[test]
        fn test_malformed_yaml_is_error() {
            let err = HarnessConfig::from_yaml("timeouts: [1, 2").unwrap_err();
            assert!(matches!(err, HarnessError::Yaml(_)));
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = HarnessConfig::load("/definitely/not/here.yaml").unwrap_err();
            assert!(matches!(err, HarnessError::Io(_)));
        }
    }

    mod override_tests {
        use super::*;

        #[test]
        fn test_overrides_apply() {
            let env: HashMap<&str, &str> = [
                (BASE_URL_ENV, "http://app:8080/"),
                (CHROMIUM_PATH_ENV, "/opt/chrome"),
            ]
            .into_iter()
            .collect();
            let config = HarnessConfig::default()
                .with_overrides_from(|k| env.get(k).map(|v| (*v).to_string()));
            assert_eq!(config.base_url, "http://app:8080/");
            assert_eq!(config.browser.chromium_path.as_deref(), Some("/opt/chrome"));
        }

        #[test]
        fn test_empty_override_ignored() {
            let config = HarnessConfig::default().with_overrides_from(|_| Some(String::new()));
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_non_http_url() {
            let err = HarnessConfig::default()
                .with_base_url("ftp://example.com")
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("base_url"));
        }

        #[test]
        fn test_rejects_zero_timeout() {
            let timeouts = Timeouts {
                select_ms: 0,
                ..Timeouts::default()
            };
            assert!(HarnessConfig::default()
                .with_timeouts(timeouts)
                .validate()
                .is_err());
        }

        #[test]
        fn test_rejects_inverted_poll_bounds() {
            let polling = PollSettings {
                interval_ms: 100,
                max_interval_ms: 10,
                backoff_factor: 2.0,
            };
            assert!(HarnessConfig::default()
                .with_polling(polling)
                .validate()
                .is_err());
        }

        #[test]
        fn test_rejects_non_finite_backoff_from_yaml() {
            for raw in [".inf", ".nan", "0.5"] {
                let yaml = format!("polling:\n  backoff_factor: {raw}\n");
                let config = HarnessConfig::from_yaml(&yaml).unwrap();
                let err = config.validate().unwrap_err();
                assert!(err.to_string().contains("backoff_factor"), "{raw}");
            }
        }
    }
}
