//! Built-in suites for the app's element regression pages.
//!
//! Each suite loads the configured base URL once and checks one rendered
//! element page.

use crate::assertion::expect;
use crate::session::Session;
use crate::suite::{ScenarioFuture, Suite};
use futures::FutureExt;

/// `data-testid` of the JSON viewer element
pub const JSON_VIEWER_TEST_ID: &str = "stJson";

/// Selector of the page icon link
pub const FAVICON_SELECTOR: &str = "link[rel='shortcut icon']";

/// Published name of the icon the favicon page sets
pub const FAVICON_FINGERPRINT: &str = "92018b2805266c4cb9a98e90c849ce5b5e7ba6d1af423bd7b7c345da.png";

/// Names accepted by [`builtin`]
pub const BUILTIN_SUITES: [&str; 2] = ["st_json", "st_set_page_config_icon"];

/// JSON viewer: first viewer expanded, second collapsed
#[must_use]
pub fn st_json() -> Suite {
    Suite::new("st_json")
        .scenario("displays expanded json", displays_expanded_json)
        .scenario("displays collapsed json", displays_collapsed_json)
}

/// Page icon set from an uploaded image
#[must_use]
pub fn st_set_page_config_icon() -> Suite {
    Suite::new("st_set_page_config_icon")
        .scenario("sets the page favicon with ico file", sets_page_favicon)
}

/// Look up a built-in suite by name
#[must_use]
pub fn builtin(name: &str) -> Option<Suite> {
    match name {
        "st_json" => Some(st_json()),
        "st_set_page_config_icon" | "page_icon" => Some(st_set_page_config_icon()),
        _ => None,
    }
}

/// Every built-in suite
#[must_use]
pub fn all() -> Vec<Suite> {
    vec![st_json(), st_set_page_config_icon()]
}

fn displays_expanded_json(session: &Session) -> ScenarioFuture<'_> {
    async move {
        let viewer = session.select_nth(JSON_VIEWER_TEST_ID, 0).await?;
        expect(&viewer).to_contain("foo")?.and_contain("bar")?;
        Ok(())
    }
    .boxed()
}

fn displays_collapsed_json(session: &Session) -> ScenarioFuture<'_> {
    async move {
        let viewer = session.select_nth(JSON_VIEWER_TEST_ID, 1).await?;
        expect(&viewer).to_contain("...")?;
        Ok(())
    }
    .boxed()
}

fn sets_page_favicon(session: &Session) -> ScenarioFuture<'_> {
    async move {
        let icon = session.select_first(FAVICON_SELECTOR).await?;
        expect(&icon)
            .to_have_attribute("href")?
            .to_contain(FAVICON_FINGERPRINT)?;
        Ok(())
    }
    .boxed()
}
