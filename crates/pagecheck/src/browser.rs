//! Headless Chromium driver over the Chrome `DevTools` Protocol.
//!
//! Compiled only with the `browser` feature. The browser owns one page; all
//! DOM reads are `Runtime.evaluate` calls returning JSON by value.

#![allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]

use crate::config::BrowserConfig;
use crate::driver::{DomDriver, ElementHandle};
use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::DocumentState;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

fn page_error(e: impl std::fmt::Display) -> HarnessError {
    HarnessError::PageError {
        message: e.to_string(),
    }
}

/// [`DomDriver`] backed by a launched Chromium process
#[derive(Debug)]
pub struct CdpDriver {
    config: BrowserConfig,
    browser: Arc<Mutex<CdpBrowser>>,
    page: Arc<Mutex<CdpPage>>,
    handle: tokio::task::JoinHandle<()>,
    closed: bool,
}

impl CdpDriver {
    /// Launch Chromium and open a blank page
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::BrowserLaunchError`] if Chromium cannot be
    /// started or the first page cannot be opened
    pub async fn launch(config: &BrowserConfig) -> HarnessResult<Self> {
        let mut builder =
            CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);

        if !config.headless {
            builder = builder.with_head();
        }

        if !config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder
            .build()
            .map_err(|message| HarnessError::BrowserLaunchError { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| HarnessError::BrowserLaunchError {
                    message: e.to_string(),
                })?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handle.abort();
                return Err(HarnessError::BrowserLaunchError {
                    message: format!("failed to open page: {e}"),
                });
            }
        };

        info!(
            headless = config.headless,
            width = config.viewport_width,
            height = config.viewport_height,
            "browser launched"
        );

        Ok(Self {
            config: config.clone(),
            browser: Arc::new(Mutex::new(browser)),
            page: Arc::new(Mutex::new(page)),
            handle,
            closed: false,
        })
    }

    /// Get the browser configuration
    #[must_use]
    pub const fn config(&self) -> &BrowserConfig {
        &self.config
    }

    async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> HarnessResult<T> {
        if self.closed {
            return Err(page_error("browser context already closed"));
        }
        let page = self.page.lock().await;
        let result = page.evaluate(script).await.map_err(page_error)?;
        result.into_value::<T>().map_err(page_error)
    }
}

#[async_trait]
impl DomDriver for CdpDriver {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::navigation(url, "browser context already closed"));
        }
        debug!(url, "navigating");
        let page = self.page.lock().await;
        let _ = page
            .goto(url)
            .await
            .map_err(|e| HarnessError::navigation(url, e.to_string()))?;
        Ok(())
    }

    async fn document_state(&self) -> HarnessResult<DocumentState> {
        let raw: String = self.evaluate("document.readyState").await?;
        Ok(DocumentState::parse(&raw))
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementHandle>> {
        selector.validate()?;
        self.evaluate(&selector.query_all_script()).await
    }

    async fn current_url(&self) -> HarnessResult<String> {
        if self.closed {
            return Err(page_error("browser context already closed"));
        }
        let page = self.page.lock().await;
        let url = page.url().await.map_err(page_error)?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn close(&mut self) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = {
            let mut browser = self.browser.lock().await;
            browser.close().await.map(|_| ()).map_err(page_error)
        };
        self.handle.abort();
        info!("browser closed");
        result
    }
}

impl Drop for CdpDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
