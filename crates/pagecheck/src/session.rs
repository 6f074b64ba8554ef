//! Session - one browser context driving one app under test.
//!
//! A [`Session`] owns its driver for the lifetime of a suite. `load_app`
//! must succeed before any selection; every successful or attempted load
//! starts a new render generation, and snapshots carry the generation they
//! were taken in.

use crate::config::HarnessConfig;
use crate::driver::{DomDriver, ElementHandle};
use crate::locator::{Locator, Selector};
use crate::preflight::check_reachable;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::{wait_for_ready, ReadyReport};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Facts about the currently loaded app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedApp {
    /// URL passed to `load_app`
    pub url: String,
    /// Render generation of this load
    pub generation: u64,
    /// HTTP status seen by the preflight check, if it ran
    pub preflight_status: Option<u16>,
    /// How the ready wait went
    pub ready: ReadyReport,
}

/// Explicit browser/app state shared by the scenarios of one suite
pub struct Session {
    driver: Box<dyn DomDriver>,
    config: HarnessConfig,
    loaded: Option<LoadedApp>,
    generation: u64,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("loaded", &self.loaded)
            .field("generation", &self.generation)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session around a driver
    #[must_use]
    pub fn new(driver: Box<dyn DomDriver>, config: HarnessConfig) -> Self {
        Self {
            driver,
            config,
            loaded: None,
            generation: 0,
            closed: false,
        }
    }

    /// Get the configuration
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The app loaded by the last successful `load_app`
    #[must_use]
    pub const fn loaded(&self) -> Option<&LoadedApp> {
        self.loaded.as_ref()
    }

    /// Current render generation (bumped by every `load_app`)
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `close` has been called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Navigate to `url` and wait for the app's ready signal.
    ///
    /// Earlier snapshots become stale whether or not the load succeeds.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidState`] after `close`
    /// - [`HarnessError::InvalidArgument`] for an empty URL
    /// - [`HarnessError::NavigationError`] if the URL is unreachable or the
    ///   ready signal does not hold within the load timeout
    pub async fn load_app(&mut self, url: &str) -> HarnessResult<&LoadedApp> {
        if self.closed {
            return Err(HarnessError::invalid_state("session is closed"));
        }
        if url.trim().is_empty() {
            return Err(HarnessError::invalid_argument("app URL must not be empty"));
        }

        self.loaded = None;
        self.generation += 1;
        let started = Instant::now();
        let budget = self.config.timeouts.load();

        let preflight_status = if self.config.preflight && url.starts_with("http") {
            Some(check_reachable(url, self.config.timeouts.preflight()).await?)
        } else {
            None
        };

        match tokio::time::timeout(budget, self.driver.navigate(url)).await {
            Ok(result) => result.map_err(|e| as_navigation(url, e))?,
            Err(_) => {
                return Err(HarnessError::navigation(
                    url,
                    format!("navigation did not finish within {}ms", budget.as_millis()),
                ))
            }
        }

        let remaining = budget.saturating_sub(started.elapsed());
        let options = self.config.load_wait().with_timeout(millis(remaining));
        let ready = wait_for_ready(&*self.driver, &self.config.ready, &options)
            .await
            .map_err(|e| as_navigation(url, e))?;

        info!(
            url,
            generation = self.generation,
            elapsed_ms = millis(started.elapsed()),
            polls = ready.attempts,
            "app ready"
        );

        Ok(&*self.loaded.insert(LoadedApp {
            url: url.to_string(),
            generation: self.generation,
            preflight_status,
            ready,
        }))
    }

    /// The `index`-th element (zero-based, document order) whose
    /// `data-testid` equals `test_id`
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidState`] before a successful `load_app`
    /// - [`HarnessError::InvalidArgument`] for an empty `test_id`
    /// - [`HarnessError::NotFound`] if fewer than `index + 1` match
    pub async fn select_nth(&self, test_id: &str, index: usize) -> HarnessResult<ElementHandle> {
        self.select(&Locator::new(Selector::test_id(test_id), index))
            .await
    }

    /// The `index`-th element matching a CSS selector
    ///
    /// # Errors
    ///
    /// Same as [`Session::select_nth`]
    pub async fn select_nth_css(&self, css: &str, index: usize) -> HarnessResult<ElementHandle> {
        self.select(&Locator::new(Selector::css(css), index)).await
    }

    /// The first element matching a CSS selector
    ///
    /// # Errors
    ///
    /// Same as [`Session::select_nth`]
    pub async fn select_first(&self, css: &str) -> HarnessResult<ElementHandle> {
        self.select_nth_css(css, 0).await
    }

    /// Resolve a locator against the loaded app
    ///
    /// # Errors
    ///
    /// Same as [`Session::select_nth`]
    pub async fn select(&self, locator: &Locator) -> HarnessResult<ElementHandle> {
        self.ensure_loaded()?;
        let mut element = locator
            .resolve(&*self.driver, &self.config.select_wait())
            .await?;
        element.generation = self.generation;
        debug!(%locator, generation = self.generation, "selected");
        Ok(element)
    }

    /// Number of elements currently matching `selector`, without waiting
    ///
    /// # Errors
    ///
    /// [`HarnessError::InvalidState`] before a successful `load_app`, or
    /// driver errors
    pub async fn count(&self, selector: &Selector) -> HarnessResult<usize> {
        self.ensure_loaded()?;
        Locator::first(selector.clone()).count(&*self.driver).await
    }

    /// Whether a snapshot was taken in the current render
    #[must_use]
    pub fn is_current(&self, element: &ElementHandle) -> bool {
        self.loaded.is_some() && element.generation == self.generation
    }

    /// Release the browser context. Safe to call more than once.
    ///
    /// # Errors
    ///
    /// Propagates the driver's close error (the session is closed regardless)
    pub async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.loaded = None;
        let result = self.driver.close().await;
        if let Err(ref e) = result {
            warn!(error = %e, "browser close failed");
        }
        debug!(generation = self.generation, "session closed");
        result
    }

    fn ensure_loaded(&self) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::invalid_state("session is closed"));
        }
        if self.loaded.is_none() {
            return Err(HarnessError::invalid_state(
                "no app loaded; call load_app before selecting elements",
            ));
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!("session dropped without close");
        }
    }
}

fn as_navigation(url: &str, err: HarnessError) -> HarnessError {
    match err {
        HarnessError::NavigationError { .. } => err,
        other => HarnessError::navigation(url, other.to_string()),
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
