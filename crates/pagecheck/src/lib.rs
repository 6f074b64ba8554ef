//! Pagecheck: browser-driven end-to-end checks for a rendered web app.
//!
//! A suite loads the app once, waits for its ready signal, then runs
//! scenarios that pick elements by `data-testid` and occurrence index and
//! assert on their text or attributes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐    ┌───────────┐    ┌───────────┐    ┌─────────────┐
//! │  Suite   │───►│  Session  │───►│  Locator  │───►│  DomDriver  │
//! │ (before, │    │ load_app, │    │ nth match │    │ CDP / mock  │
//! │ scenarios│    │ select_*) │    │ auto-wait │    │             │
//! └──────────┘    └───────────┘    └───────────┘    └─────────────┘
//!       │                                 │
//!       ▼                                 ▼
//! ┌──────────┐                     ┌─────────────┐
//! │ Reporter │                     │ Expectation │
//! └──────────┘                     └─────────────┘
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod assertion;
#[cfg(feature = "browser")]
mod browser;
mod config;
mod driver;
mod fingerprint;
mod locator;
mod preflight;
mod reporter;
mod result;
mod session;
mod suite;

/// Bounded polling and the app ready signal
pub mod wait;

/// Built-in suites
pub mod specs;

pub use assertion::{evaluate_all, expect, AttributeExpect, Expect, Expectation, ABSENT};
#[cfg(feature = "browser")]
pub use browser::CdpDriver;
pub use config::{
    BrowserConfig, HarnessConfig, PollSettings, Timeouts, BASE_URL_ENV, CHROMIUM_PATH_ENV,
    DEFAULT_BASE_URL,
};
pub use driver::{
    DomDriver, ElementHandle, MockDocument, MockDriver, MockElement, TEST_ID_ATTRIBUTE,
};
pub use fingerprint::{AssetFingerprint, DIGEST_HEX_LEN};
pub use locator::{pick_nth, Locator, Selector};
pub use preflight::check_reachable;
pub use reporter::{all_passed, ScenarioOutcome, ScenarioStatus, SuiteReport};
pub use result::{HarnessError, HarnessResult};
pub use session::{LoadedApp, Session};
pub use suite::{run_suites, run_suites_parallel, Scenario, ScenarioFuture, Suite};
pub use wait::{wait_for_ready, DocumentState, ReadySignal, WaitOptions};

/// Launch the default driver for `config`
///
/// # Errors
///
/// Returns [`HarnessError::BrowserLaunchError`] if the browser cannot start
#[cfg(feature = "browser")]
pub async fn launch_driver(config: &BrowserConfig) -> HarnessResult<Box<dyn DomDriver>> {
    Ok(Box::new(CdpDriver::launch(config).await?))
}

/// Prelude for convenient imports
pub mod prelude {
    pub use super::assertion::*;
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::fingerprint::*;
    pub use super::locator::*;
    pub use super::reporter::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::suite::*;
    pub use super::wait::*;
    #[cfg(feature = "browser")]
    pub use super::CdpDriver;
}
