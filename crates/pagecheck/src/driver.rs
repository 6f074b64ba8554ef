//! DomDriver - the browser seam.
//!
//! Everything above this module talks to a page only through [`DomDriver`]:
//! navigate, read `document.readyState`, and snapshot every element matching
//! a selector in document order. [`crate::browser::CdpDriver`] implements it
//! over the Chrome `DevTools` Protocol; [`MockDriver`] implements it over an
//! in-memory document whose elements can appear and disappear on a schedule.

use crate::locator::Selector;
use crate::result::{HarnessError, HarnessResult};
use crate::wait::DocumentState;
use async_trait::async_trait;
use scraper::{Html, Selector as CssSelector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Attribute carrying the stable test identifier
pub const TEST_ID_ATTRIBUTE: &str = "data-testid";

/// Snapshot of one DOM node.
///
/// Taken fresh by every selection and never refreshed; `generation` records
/// which load of the app it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Lowercase tag name
    #[serde(rename = "tag")]
    pub tag_name: String,
    /// `textContent` of the node
    #[serde(rename = "text", default)]
    pub text_content: String,
    /// Attribute name to value
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Render generation the snapshot was taken in
    #[serde(default)]
    pub generation: u64,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into().to_ascii_lowercase(),
            text_content: String::new(),
            attributes: BTreeMap::new(),
            generation: 0,
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Look up an attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The `data-testid` value, if any
    #[must_use]
    pub fn test_id(&self) -> Option<&str> {
        self.attribute(TEST_ID_ATTRIBUTE)
    }
}

/// Abstract driver trait for browser automation
///
/// # Implementations
///
/// - `CdpDriver` - headless Chromium via chromiumoxide (feature `browser`)
/// - `MockDriver` - in-memory document for harness tests
#[async_trait]
pub trait DomDriver: Send + Sync {
    /// Replace the current document with the one at `url`
    async fn navigate(&mut self, url: &str) -> HarnessResult<()>;

    /// Current `document.readyState`
    async fn document_state(&self) -> HarnessResult<DocumentState>;

    /// Snapshot every element matching `selector`, in document order
    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementHandle>>;

    /// URL of the current document
    async fn current_url(&self) -> HarnessResult<String>;

    /// Release the browser context. Calling twice is not an error.
    async fn close(&mut self) -> HarnessResult<()>;
}

// ============================================================================
// Mock implementation
// ============================================================================

/// An element of a [`MockDocument`], present during a time window after load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    handle: ElementHandle,
    appear_after: Duration,
    remove_after: Option<Duration>,
}

impl MockElement {
    /// Create an element present from load onwards
    #[must_use]
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            handle: ElementHandle::new(tag_name),
            appear_after: Duration::ZERO,
            remove_after: None,
        }
    }

    /// Set `data-testid`
    #[must_use]
    pub fn with_test_id(self, id: impl Into<String>) -> Self {
        self.with_attribute(TEST_ID_ATTRIBUTE, id)
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.handle = self.handle.with_text(text);
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.handle = self.handle.with_attribute(name, value);
        self
    }

    /// Render this element only after `delay` has passed since load
    #[must_use]
    pub const fn appearing_after(mut self, delay: Duration) -> Self {
        self.appear_after = delay;
        self
    }

    /// Remove this element once `delay` has passed since load
    #[must_use]
    pub const fn removed_after(mut self, delay: Duration) -> Self {
        self.remove_after = Some(delay);
        self
    }

    fn present_at(&self, since_load: Duration) -> bool {
        since_load >= self.appear_after && self.remove_after.map_or(true, |end| since_load < end)
    }
}

/// A scripted document served by [`MockDriver`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDocument {
    elements: Vec<MockElement>,
    complete_after: Duration,
}

impl MockDocument {
    /// Create an empty document that is complete at load
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element (document order is insertion order)
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Report `readyState == "complete"` only after `delay`
    #[must_use]
    pub const fn complete_after(mut self, delay: Duration) -> Self {
        self.complete_after = delay;
        self
    }

    fn state_at(&self, since_load: Duration) -> DocumentState {
        if since_load >= self.complete_after {
            DocumentState::Complete
        } else {
            DocumentState::Interactive
        }
    }
}

#[derive(Debug)]
struct LoadedDocument {
    url: String,
    document: MockDocument,
    loaded_at: Instant,
}

/// Mock driver for unit testing
#[derive(Debug, Default)]
pub struct MockDriver {
    routes: HashMap<String, MockDocument>,
    current: Option<LoadedDocument>,
    closed: bool,
    /// Call history for verification
    pub call_history: Vec<String>,
    navigations: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MockDriver {
    /// Create a driver that serves nothing (every URL is unreachable)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver serving `document` at `url`
    #[must_use]
    pub fn serving(url: impl Into<String>, document: MockDocument) -> Self {
        Self::new().with_route(url, document)
    }

    /// Serve `document` at `url`
    #[must_use]
    pub fn with_route(mut self, url: impl Into<String>, document: MockDocument) -> Self {
        let _ = self.routes.insert(url.into(), document);
        self
    }

    /// Shared counter of successful navigations, readable after the driver is moved
    #[must_use]
    pub fn navigation_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.navigations)
    }

    /// Shared counter of `close` calls, readable after the driver is moved
    #[must_use]
    pub fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn ensure_open(&self) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::PageError {
                message: "browser context already closed".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DomDriver for MockDriver {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.ensure_open()?;
        self.call_history.push(format!("navigate:{url}"));
        let document = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| HarnessError::navigation(url, "net::ERR_CONNECTION_REFUSED"))?;
        self.current = Some(LoadedDocument {
            url: url.to_string(),
            document,
            loaded_at: Instant::now(),
        });
        let _ = self.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn document_state(&self) -> HarnessResult<DocumentState> {
        self.ensure_open()?;
        Ok(self.current.as_ref().map_or(DocumentState::Complete, |loaded| {
            loaded.document.state_at(loaded.loaded_at.elapsed())
        }))
    }

    async fn query_all(&self, selector: &Selector) -> HarnessResult<Vec<ElementHandle>> {
        self.ensure_open()?;
        let css = compile_selector(selector)?;
        let Some(ref loaded) = self.current else {
            return Ok(Vec::new());
        };
        let since_load = loaded.loaded_at.elapsed();
        let present: Vec<&ElementHandle> = loaded
            .document
            .elements
            .iter()
            .filter(|e| e.present_at(since_load))
            .map(|e| &e.handle)
            .collect();
        Ok(select_rendered(&present, &css))
    }

    async fn current_url(&self) -> HarnessResult<String> {
        Ok(self
            .current
            .as_ref()
            .map_or_else(|| "about:blank".to_string(), |loaded| loaded.url.clone()))
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.call_history.push("close".to_string());
        let _ = self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

/// Marks each rendered mock element with its position in the document
const NODE_MARKER: &str = "data-pagecheck-node";

const VOID_TAGS: [&str; 8] = ["area", "base", "br", "hr", "img", "input", "link", "meta"];

fn compile_selector(selector: &Selector) -> HarnessResult<CssSelector> {
    let css = selector.to_css();
    CssSelector::parse(&css)
        .map_err(|e| HarnessError::invalid_argument(format!("invalid selector {css:?}: {e}")))
}

/// Render `elements` as one HTML page, run `selector` over it and map the
/// hits back to their handles in document order
fn select_rendered(elements: &[&ElementHandle], selector: &CssSelector) -> Vec<ElementHandle> {
    let document = Html::parse_document(&render_page(elements));
    let mut hits: Vec<usize> = document
        .select(selector)
        .filter_map(|node| node.value().attr(NODE_MARKER))
        .filter_map(|raw| raw.parse().ok())
        .collect();
    hits.sort_unstable();
    hits.dedup();
    hits.into_iter()
        .filter_map(|i| elements.get(i).map(|handle| (*handle).clone()))
        .collect()
}

fn render_page(elements: &[&ElementHandle]) -> String {
    let mut html = String::from("<!DOCTYPE html><html><head></head><body>");
    for (i, element) in elements.iter().enumerate() {
        html.push('<');
        html.push_str(&element.tag_name);
        for (name, value) in &element.attributes {
            html.push_str(&format!(" {name}=\"{}\"", escape_html(value)));
        }
        html.push_str(&format!(" {NODE_MARKER}=\"{i}\">"));
        if !VOID_TAGS.contains(&element.tag_name.as_str()) {
            html.push_str(&escape_html(&element.text_content));
            html.push_str(&format!("</{}>", element.tag_name));
        }
    }
    html.push_str("</body></html>");
    html
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("DIV")
                .with_text("hello")
                .with_attribute("data-testid", "stJson");
            assert_eq!(elem.tag_name, "div");
            assert_eq!(elem.text_content, "hello");
            assert_eq!(elem.test_id(), Some("stJson"));
            assert_eq!(elem.attribute("href"), None);
        }

        #[test]
        fn test_deserialize_from_page_script_shape() {
            let raw = r#"{"tag":"link","text":"","attributes":{"rel":"shortcut icon","href":"/media/x.png"}}"#;
            let elem: ElementHandle = serde_json::from_str(raw).unwrap();
            assert_eq!(elem.tag_name, "link");
            assert_eq!(elem.attribute("href"), Some("/media/x.png"));
            assert_eq!(elem.generation, 0);
        }
    }

    mod css_selector_tests {
        use super::*;

        fn favicon_page() -> MockDocument {
            MockDocument::new()
                .with_element(MockElement::new("div").with_test_id("stJson").with_text("a < b"))
                .with_element(
                    MockElement::new("link")
                        .with_attribute("rel", "shortcut icon")
                        .with_attribute("href", "/media/abc.png")
                        .with_attribute("class", "a b")
                        .with_attribute("id", "fav"),
                )
                .with_element(MockElement::new("div").with_test_id("stJson").with_text("{...}"))
        }

        async fn count(css: &str) -> HarnessResult<usize> {
            let mut driver = MockDriver::serving("http://app/", favicon_page());
            driver.navigate("http://app/").await?;
            Ok(driver.query_all(&Selector::css(css)).await?.len())
        }

        #[tokio::test]
        async fn test_attribute_operators() {
            for css in [
                "link[rel='shortcut icon']",
                "link[href*='abc']",
                "link[rel~=icon]",
                "link[href$='.png']",
                "link[href^=\"/media\"]",
                "link:not([rel='icon'])",
            ] {
                assert_eq!(count(css).await.unwrap(), 1, "{css}");
            }
            assert_eq!(count("link[rel='icon']").await.unwrap(), 0);
        }

        #[tokio::test]
        async fn test_id_class_and_tag() {
            assert_eq!(count("#fav").await.unwrap(), 1);
            assert_eq!(count("link.b").await.unwrap(), 1);
            assert_eq!(count("div.b").await.unwrap(), 0);
            assert_eq!(count("div").await.unwrap(), 2);
        }

        #[tokio::test]
        async fn test_test_id_keeps_order_and_text() {
            let mut driver = MockDriver::serving("http://app/", favicon_page());
            driver.navigate("http://app/").await.unwrap();
            let found = driver.query_all(&Selector::test_id("stJson")).await.unwrap();
            let texts: Vec<_> = found.iter().map(|e| e.text_content.as_str()).collect();
            assert_eq!(texts, ["a < b", "{...}"]);
        }

        #[tokio::test]
        async fn test_malformed_selector_is_invalid_argument() {
            for css in ["[rel='x'", "", "[]", "link[href*=]"] {
                let err = count(css).await.unwrap_err();
                assert!(matches!(err, HarnessError::InvalidArgument { .. }), "{css}");
            }
        }

        #[tokio::test]
        async fn test_malformed_selector_rejected_before_navigation() {
            let driver = MockDriver::new();
            let err = driver.query_all(&Selector::css("a[")).await.unwrap_err();
            assert!(matches!(err, HarnessError::InvalidArgument { .. }));
        }
    }

    mod mock_driver_tests {
        use super::*;

        fn doc() -> MockDocument {
            MockDocument::new()
                .with_element(MockElement::new("div").with_test_id("a").with_text("first"))
                .with_element(MockElement::new("div").with_test_id("b"))
                .with_element(MockElement::new("div").with_test_id("a").with_text("second"))
        }

        #[tokio::test]
        async fn test_query_preserves_document_order() {
            let mut driver = MockDriver::serving("http://app/", doc());
            driver.navigate("http://app/").await.unwrap();
            let found = driver.query_all(&Selector::test_id("a")).await.unwrap();
            let texts: Vec<_> = found.iter().map(|e| e.text_content.as_str()).collect();
            assert_eq!(texts, ["first", "second"]);
        }

        #[tokio::test]
        async fn test_blank_before_navigation() {
            let driver = MockDriver::serving("http://app/", doc());
            assert!(driver
                .query_all(&Selector::test_id("a"))
                .await
                .unwrap()
                .is_empty());
            assert_eq!(driver.current_url().await.unwrap(), "about:blank");
        }

        #[tokio::test]
        async fn test_unknown_url_is_navigation_error() {
            let mut driver = MockDriver::serving("http://app/", doc());
            let err = driver.navigate("http://elsewhere/").await.unwrap_err();
            assert!(matches!(err, HarnessError::NavigationError { .. }));
            assert_eq!(driver.navigation_counter().load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_delayed_element() {
            let doc = MockDocument::new().with_element(
                MockElement::new("div")
                    .with_test_id("lazy")
                    .appearing_after(Duration::from_millis(30)),
            );
            let mut driver = MockDriver::serving("http://app/", doc);
            driver.navigate("http://app/").await.unwrap();
            let lazy = Selector::test_id("lazy");
            assert!(driver.query_all(&lazy).await.unwrap().is_empty());
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(driver.query_all(&lazy).await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_close_is_counted_and_final() {
            let mut driver = MockDriver::serving("http://app/", doc());
            let closes = driver.close_counter();
            driver.close().await.unwrap();
            driver.close().await.unwrap();
            assert_eq!(closes.load(Ordering::SeqCst), 2);
            assert!(driver.was_called("close"));
            assert!(driver.navigate("http://app/").await.is_err());
        }
    }
}
