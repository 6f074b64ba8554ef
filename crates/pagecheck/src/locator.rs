//! Indexed element selection.
//!
//! A [`Locator`] names "the N-th element (zero-based, document order)
//! matching a selector". Resolution auto-waits: it re-queries the driver
//! until at least `index + 1` matches exist or the timeout expires, and
//! never falls back to a different index.

use crate::driver::{DomDriver, ElementHandle, TEST_ID_ATTRIBUTE};
use crate::result::{HarnessError, HarnessResult};
use crate::wait::WaitOptions;
use std::fmt;
use tracing::trace;

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Test ID selector (`data-testid` attribute)
    TestId(String),
    /// CSS selector (e.g., `link[rel='shortcut icon']`)
    Css(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Equivalent CSS selector
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Self::Css(css) => css.clone(),
            Self::TestId(id) => format!("[{TEST_ID_ATTRIBUTE}={}]", js_string(id)),
        }
    }

    /// Reject selectors that can never match anything
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidArgument`] for an empty selector
    pub fn validate(&self) -> HarnessResult<()> {
        let raw = match self {
            Self::Css(css) => css,
            Self::TestId(id) => id,
        };
        if raw.trim().is_empty() {
            return Err(HarnessError::invalid_argument("selector must not be empty"));
        }
        Ok(())
    }

    /// Page script returning a JSON array of element snapshots in document order
    #[must_use]
    pub fn query_all_script(&self) -> String {
        format!(
            "Array.from(document.querySelectorAll({})).map(el => ({{\
                tag: el.tagName.toLowerCase(), \
                text: el.textContent || '', \
                attributes: Object.fromEntries(Array.from(el.attributes).map(a => [a.name, a.value]))\
            }}))",
            js_string(&self.to_css())
        )
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

/// Quote a string as a JavaScript (JSON) string literal
fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

/// Take the element at `index`, or report how many there were
///
/// # Errors
///
/// Returns the number of matches when `index` is out of range
pub fn pick_nth(mut matches: Vec<ElementHandle>, index: usize) -> Result<ElementHandle, usize> {
    if index < matches.len() {
        Ok(matches.swap_remove(index))
    } else {
        Err(matches.len())
    }
}

/// The `index`-th match of a selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    selector: Selector,
    index: usize,
}

impl Locator {
    /// Create a locator for the `index`-th match (zero-based)
    #[must_use]
    pub const fn new(selector: Selector, index: usize) -> Self {
        Self { selector, index }
    }

    /// Locator for the first match
    #[must_use]
    pub const fn first(selector: Selector) -> Self {
        Self::new(selector, 0)
    }

    /// Same selector, different occurrence
    #[must_use]
    pub fn nth(&self, index: usize) -> Self {
        Self::new(self.selector.clone(), index)
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the occurrence index
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Poll the driver until the element exists, then snapshot it
    ///
    /// # Errors
    ///
    /// - [`HarnessError::InvalidArgument`] for an empty selector
    /// - [`HarnessError::NotFound`] if fewer than `index + 1` elements match
    ///   when the wait expires
    /// - driver errors, immediately
    pub async fn resolve(
        &self,
        driver: &dyn DomDriver,
        options: &WaitOptions,
    ) -> HarnessResult<ElementHandle> {
        self.selector.validate()?;
        let mut poll = options.start();
        loop {
            let matches = driver.query_all(&self.selector).await?;
            let found = match pick_nth(matches, self.index) {
                Ok(element) => return Ok(element),
                Err(found) => found,
            };
            trace!(selector = %self.selector, index = self.index, found, "waiting for element");
            if !poll.next_attempt().await {
                return Err(HarnessError::NotFound {
                    selector: self.selector.to_css(),
                    index: self.index,
                    found,
                });
            }
        }
    }

    /// Current number of matches, without waiting
    ///
    /// # Errors
    ///
    /// Propagates driver errors
    pub async fn count(&self, driver: &dyn DomDriver) -> HarnessResult<usize> {
        self.selector.validate()?;
        Ok(driver.query_all(&self.selector).await?.len())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.selector, self.index)
    }
}
