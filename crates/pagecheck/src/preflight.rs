//! HTTP reachability check run before the browser navigates.
//!
//! A refused connection surfaces here in milliseconds with a plain message,
//! instead of as a browser error page that then times out the ready wait.

use crate::result::{HarnessError, HarnessResult};
use std::time::Duration;
use tracing::{debug, warn};

/// GET `url` once (following redirects) and return the final status code.
///
/// # Errors
///
/// Returns [`HarnessError::NavigationError`] on connect failure, timeout, or
/// a non-2xx final status.
pub async fn check_reachable(url: &str, timeout: Duration) -> HarnessResult<u16> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HarnessError::navigation(url, format!("cannot build HTTP client: {e}")))?;

    let response = client.get(url).send().await.map_err(|e| {
        let reason = if e.is_connect() {
            "connection refused"
        } else if e.is_timeout() {
            "timed out"
        } else {
            "request failed"
        };
        warn!(url, error = %e, "preflight failed");
        HarnessError::navigation(url, format!("{reason}: {e}"))
    })?;

    let status = response.status();
    debug!(url, status = status.as_u16(), "preflight response");
    if !status.is_success() {
        return Err(HarnessError::navigation(
            url,
            format!("server responded {status}"),
        ));
    }
    Ok(status.as_u16())
}
