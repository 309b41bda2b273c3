//! Browser session abstraction.
//!
//! [`BrowserSession`] is the low-level seam over one page of one browser
//! process. [`Page`] wraps a session with the timeout and first-match-wins
//! selector semantics every automation step relies on.

mod chromium;

pub use chromium::{ChromiumConfig, ChromiumLauncher};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout, Instant};

use crate::error::BrowserError;
use crate::selectors::{Selector, Target};

/// Desktop Chrome user agent presented to portals.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Starts a fresh, isolated browser for one task.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One page in one browser process.
///
/// Methods other than `goto` act on the first element matching a single
/// selector and do not wait; waiting is layered on by [`Page`].
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &Selector) -> Result<usize, BrowserError>;

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError>;

    /// Replace the value of an input.
    async fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), BrowserError>;

    /// Attach local files to a file input.
    async fn set_input_files(
        &mut self,
        selector: &Selector,
        files: &[PathBuf],
    ) -> Result<(), BrowserError>;

    /// Full-page PNG capture.
    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError>;

    /// Close the page, then the browser. Idempotent.
    async fn close(&mut self) -> Result<(), BrowserError>;
}

/// Timeouts applied to browser interactions.
#[derive(Debug, Clone)]
pub struct BrowserTimeouts {
    /// Budget for a page navigation.
    pub navigation: Duration,

    /// Budget for an element to appear.
    pub element: Duration,

    /// Delay between selector probe rounds.
    pub poll_interval: Duration,
}

impl Default for BrowserTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            element: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// A browser session with bounded, selector-aware operations.
pub struct Page {
    session: Box<dyn BrowserSession>,
    timeouts: BrowserTimeouts,
}

impl Page {
    pub fn new(session: Box<dyn BrowserSession>, timeouts: BrowserTimeouts) -> Self {
        Self { session, timeouts }
    }

    pub async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let budget = self.timeouts.navigation;
        timeout(budget, self.session.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout {
                target: format!("navigation to {url}"),
                timeout: budget,
            })?
    }

    /// Wait until one of the target's candidates matches and return it.
    ///
    /// Each round probes the candidates in registry order; the first that
    /// matches wins. Probe errors count as "no match" so a transient
    /// protocol hiccup cannot short-circuit the fallback list.
    pub async fn wait_for(&mut self, target: &Target) -> Result<Selector, BrowserError> {
        let budget = self.timeouts.element;
        let deadline = Instant::now() + budget;

        loop {
            for candidate in &target.candidates {
                match self.session.count(candidate).await {
                    Ok(n) if n > 0 => {
                        tracing::trace!(target = %target.name, selector = %candidate, "Target matched");
                        return Ok(candidate.clone());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::trace!(target = %target.name, selector = %candidate, error = %e, "Probe failed");
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    target: target.name.clone(),
                    timeout: budget,
                });
            }
            sleep(self.timeouts.poll_interval).await;
        }
    }

    pub async fn click(&mut self, target: &Target) -> Result<(), BrowserError> {
        let selector = self.wait_for(target).await?;
        self.session.click(&selector).await
    }

    pub async fn fill(&mut self, target: &Target, value: &str) -> Result<(), BrowserError> {
        let selector = self.wait_for(target).await?;
        self.session.fill(&selector, value).await
    }

    pub async fn set_input_files(
        &mut self,
        target: &Target,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        let selector = self.wait_for(target).await?;
        self.session.set_input_files(&selector, files).await
    }

    /// Matches for the first candidate that currently has any, without waiting.
    pub async fn count(&mut self, target: &Target) -> Result<usize, BrowserError> {
        for candidate in &target.candidates {
            let n = self.session.count(candidate).await?;
            if n > 0 {
                return Ok(n);
            }
        }
        Ok(0)
    }

    pub async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        self.session.screenshot().await
    }

    /// Release the page and browser.
    pub async fn close(mut self) -> Result<(), BrowserError> {
        self.session.close().await
    }
}
