//! Chromium backend over the DevTools protocol.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::{EventConsoleApiCalled, EventExceptionThrown};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use super::{BrowserLauncher, BrowserSession, DESKTOP_USER_AGENT};
use crate::error::BrowserError;
use crate::selectors::Selector;

/// Launch settings for the Chromium backend.
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,

    /// Explicit Chrome binary; auto-detected when `None`.
    pub executable: Option<PathBuf>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            executable: None,
        }
    }
}

/// Launches one Chromium process per task.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: ChromiumConfig,
}

impl ChromiumLauncher {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }

    /// Fresh, empty Chrome profile for one launch.
    fn profile_dir() -> Result<TempDir, BrowserError> {
        tempfile::Builder::new()
            .prefix("portal-chrome-profile-")
            .tempdir()
            .map_err(|e| BrowserError::Launch(format!("creating browser profile: {e}")))
    }

    fn browser_config(&self, profile: &Path) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .user_data_dir(profile)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage");

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let profile = Self::profile_dir()?;
        let (browser, mut handler) = Browser::launch(self.browser_config(profile.path())?)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler stopped");
                    break;
                }
            }
        });

        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            tasks: vec![handler_task],
            profile: Some(profile),
        };

        // A half-built session still owns the browser process.
        if let Err(e) = session.open_page(&self.config).await {
            let _ = session.close().await;
            return Err(e);
        }

        tracing::debug!(
            headless = self.config.headless,
            width = self.config.viewport_width,
            height = self.config.viewport_height,
            profile = ?session.profile.as_ref().map(|p| p.path().to_path_buf()),
            "Browser launched"
        );

        Ok(Box::new(session))
    }
}

struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<chromiumoxide::Page>,
    tasks: Vec<JoinHandle<()>>,

    /// Removed once the browser has exited.
    profile: Option<TempDir>,
}

impl ChromiumSession {
    async fn open_page(&mut self, config: &ChromiumConfig) -> Result<(), BrowserError> {
        let browser = self.browser.as_ref().ok_or(BrowserError::Closed)?;
        let page = browser.new_page("about:blank").await.map_err(protocol)?;
        page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .map_err(protocol)?;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(config.viewport_width),
            i64::from(config.viewport_height),
            1.0,
            false,
        ))
        .await
        .map_err(protocol)?;

        let mut console = page
            .event_listener::<EventConsoleApiCalled>()
            .await
            .map_err(protocol)?;
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                let args: Vec<String> = event
                    .args
                    .iter()
                    .filter_map(|arg| arg.value.as_ref().map(|v| v.to_string()))
                    .collect();
                tracing::debug!(kind = ?event.r#type, message = %args.join(" "), "Page console");
            }
        }));

        let mut exceptions = page
            .event_listener::<EventExceptionThrown>()
            .await
            .map_err(protocol)?;
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                tracing::warn!(error = %event.exception_details.text, "Page error");
            }
        }));

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&chromiumoxide::Page, BrowserError> {
        self.page.as_ref().ok_or(BrowserError::Closed)
    }

    async fn locate(&self, selector: &Selector) -> Result<Element, BrowserError> {
        let page = self.page()?;
        let found = if let Some(css) = selector.to_css() {
            page.find_element(css).await
        } else if let Some(xpath) = selector.to_xpath() {
            page.find_xpath(xpath).await
        } else {
            return Err(BrowserError::Protocol(format!("unsupported selector {selector}")));
        };
        found.map_err(|e| interaction(selector, e))
    }
}

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

fn interaction(selector: &Selector, e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Interaction {
        target: selector.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn count(&mut self, selector: &Selector) -> Result<usize, BrowserError> {
        let page = self.page()?;
        if let Some(css) = selector.to_css() {
            return page
                .find_elements(css)
                .await
                .map(|elements| elements.len())
                .map_err(protocol);
        }
        match selector.to_xpath() {
            // DOM.performSearch reports an empty result set as an error.
            Some(xpath) => Ok(page.find_xpaths(xpath).await.map(|e| e.len()).unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn click(&mut self, selector: &Selector) -> Result<(), BrowserError> {
        let element = self.locate(selector).await?;
        element.click().await.map_err(|e| interaction(selector, e))?;
        Ok(())
    }

    async fn fill(&mut self, selector: &Selector, value: &str) -> Result<(), BrowserError> {
        let element = self.locate(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(|e| interaction(selector, e))?;
        element.click().await.map_err(|e| interaction(selector, e))?;
        element
            .type_str(value)
            .await
            .map_err(|e| interaction(selector, e))?;
        Ok(())
    }

    async fn set_input_files(
        &mut self,
        selector: &Selector,
        files: &[PathBuf],
    ) -> Result<(), BrowserError> {
        let element = self.locate(selector).await?;
        let params = SetFileInputFilesParams::builder()
            .files(files.iter().map(|f| f.display().to_string()))
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(|e| interaction(selector, e))?;
        self.page()?
            .execute(params)
            .await
            .map_err(|e| interaction(selector, e))?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page()?.screenshot(params).await.map_err(protocol)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        let mut first_error = None;

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                first_error.get_or_insert(protocol(e));
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                first_error.get_or_insert(protocol(e));
            }
            let _ = browser.wait().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(profile) = self.profile.take() {
            let path = profile.path().to_path_buf();
            if let Err(e) = profile.close() {
                tracing::debug!(path = %path.display(), error = %e, "Failed to remove browser profile");
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
