//! Result and error types for pagecheck.

use thiserror::Error;

/// Result type for pagecheck operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors that can occur while driving an application under test
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunchError {
        /// Error message
        message: String,
    },

    /// Page-level driver error (script evaluation, closed target)
    #[error("Page error: {message}")]
    PageError {
        /// Error message
        message: String,
    },

    /// Target unreachable, or the app never reached its ready signal
    #[error("Navigation to {url} failed: {message}")]
    NavigationError {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Fewer matching elements than the requested occurrence index needs
    #[error("No element at index {index} for {selector} (found {found})")]
    NotFound {
        /// Selector that was queried
        selector: String,
        /// Requested zero-based occurrence index
        index: usize,
        /// Number of matches present when polling gave up
        found: usize,
    },

    /// Located element did not meet an expectation
    #[error("Assertion failed: expected {expectation} ({expected:?}), actual {actual:?}")]
    AssertionFailure {
        /// Human-readable expectation kind
        expectation: String,
        /// Expected value
        expected: String,
        /// Observed value
        actual: String,
    },

    /// Operation timed out
    #[error("Timed out after {ms}ms waiting for {waited_for}")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
        /// What was being waited for
        waited_for: String,
    },

    /// Operation called in the wrong session state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Caller passed an unusable argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid expectation pattern
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),
}

impl HarnessError {
    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NavigationError {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BrowserLaunchError { .. } => "browser_launch",
            Self::PageError { .. } => "page",
            Self::NavigationError { .. } => "navigation",
            Self::NotFound { .. } => "not_found",
            Self::AssertionFailure { .. } => "assertion",
            Self::Timeout { .. } => "timeout",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
            Self::Regex(_) => "regex",
        }
    }
}
