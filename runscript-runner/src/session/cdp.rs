//! Chrome DevTools Protocol backend
//!
//! Two transports:
//! - [`AttachTransport`] attaches to a Chrome already running with
//!   `--remote-debugging-port` and opens a fresh tab in it. Closing the
//!   session closes only that tab.
//! - [`LaunchTransport`] starts a local Chromium. Closing the session shuts
//!   the browser down.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::Handler;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Locator, Session, SessionError, SessionResult, Step, Transport};

impl From<CdpError> for SessionError {
    fn from(e: CdpError) -> Self {
        SessionError::Browser(e.to_string())
    }
}

/// Failures while waiting for a launched browser process to exit
impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Browser(e.to_string())
    }
}

/// Attaches to a running Chrome over its remote-debugging endpoint
pub struct AttachTransport {
    debug_url: String,
}

impl AttachTransport {
    /// # Arguments
    /// * `debug_url` - Remote-debugging endpoint (e.g., "http://127.0.0.1:9222")
    pub fn new(debug_url: impl Into<String>) -> Self {
        Self {
            debug_url: debug_url.into(),
        }
    }
}

#[async_trait]
impl Transport for AttachTransport {
    fn name(&self) -> &str {
        "chrome-attach"
    }

    async fn connect(&self) -> SessionResult<Box<dyn Session>> {
        info!("Attaching to Chrome at {}", self.debug_url);
        let (browser, handler) = Browser::connect(self.debug_url.as_str())
            .await
            .map_err(|e| {
                SessionError::Connect(format!(
                    "{} (start Chrome with --remote-debugging-port=9222): {}",
                    self.debug_url, e
                ))
            })?;

        let session = CdpSession::open(browser, handler, false).await?;
        Ok(Box::new(session))
    }
}

/// Launches a local Chromium instance
pub struct LaunchTransport {
    headless: bool,
}

impl LaunchTransport {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

#[async_trait]
impl Transport for LaunchTransport {
    fn name(&self) -> &str {
        "chromium-launch"
    }

    async fn connect(&self) -> SessionResult<Box<dyn Session>> {
        info!("Launching Chromium (headless: {})", self.headless);
        let builder = BrowserConfig::builder();
        let builder = if self.headless {
            builder
        } else {
            builder.with_head()
        };
        let config = builder.build().map_err(SessionError::Connect)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        let session = CdpSession::open(browser, handler, true).await?;
        Ok(Box::new(session))
    }
}

/// A single tab driven over CDP
struct CdpSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    owns_browser: bool,
    closed: bool,
}

impl CdpSession {
    async fn open(
        browser: Browser,
        mut handler: Handler,
        owns_browser: bool,
    ) -> SessionResult<Self> {
        // The handler must be polled for any command to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(SessionError::Connect(format!("failed to open tab: {}", e)));
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            owns_browser,
            closed: false,
        })
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    async fn find_all(&self, scope: Option<&Element>, css: &str) -> SessionResult<Vec<Element>> {
        let found = match scope {
            Some(parent) => parent.find_elements(css).await,
            None => self.page.find_elements(css).await,
        };

        match found {
            Ok(elements) => Ok(elements),
            Err(CdpError::NotFound) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolves every step to a single element
    async fn resolve(&self, steps: &[Step]) -> SessionResult<Option<Element>> {
        let mut scope: Option<Element> = None;

        for step in steps {
            let mut matches = self.find_all(scope.as_ref(), &step.css).await?;
            let index = step.nth.unwrap_or(0);
            if index >= matches.len() {
                return Ok(None);
            }
            scope = Some(matches.swap_remove(index));
        }

        Ok(scope)
    }

    /// Resolves the parent steps, then collects every match of the last one
    async fn resolve_all(&self, locator: &Locator) -> SessionResult<Vec<Element>> {
        let Some((last, parents)) = locator.steps().split_last() else {
            return Ok(Vec::new());
        };

        if parents.is_empty() {
            return self.find_all(None, &last.css).await;
        }

        match self.resolve(parents).await? {
            Some(parent) => self.find_all(Some(&parent), &last.css).await,
            None => Ok(Vec::new()),
        }
    }

    async fn element(&self, locator: &Locator) -> SessionResult<Element> {
        self.ensure_open()?;
        self.resolve(locator.steps())
            .await?
            .ok_or_else(|| SessionError::NoSuchElement(locator.to_string()))
    }
}

#[async_trait]
impl Session for CdpSession {
    async fn navigate(&self, url: &str) -> SessionResult<()> {
        self.ensure_open()?;
        debug!("Navigating to {}", url);
        self.page.goto(url).await?;
        Ok(())
    }

    async fn reload(&self) -> SessionResult<()> {
        self.ensure_open()?;
        self.page.reload().await?;
        Ok(())
    }

    async fn current_url(&self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn title(&self) -> SessionResult<String> {
        self.ensure_open()?;
        Ok(self.page.get_title().await?.unwrap_or_default())
    }

    async fn count(&self, locator: &Locator) -> SessionResult<usize> {
        self.ensure_open()?;
        Ok(self.resolve_all(locator).await?.len())
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> SessionResult<Option<String>> {
        let element = self.element(locator).await?;
        Ok(element.attribute(name).await?)
    }

    async fn attributes(
        &self,
        locator: &Locator,
        name: &str,
    ) -> SessionResult<Vec<Option<String>>> {
        self.ensure_open()?;
        let mut values = Vec::new();
        for element in self.resolve_all(locator).await? {
            values.push(element.attribute(name).await?);
        }
        Ok(values)
    }

    async fn click(&self, locator: &Locator) -> SessionResult<()> {
        let element = self.element(locator).await?;
        element.click().await?;
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> SessionResult<()> {
        let element = self.element(locator).await?;
        let literal = serde_json::to_string(text)
            .map_err(|e| SessionError::Browser(format!("cannot encode input: {}", e)))?;

        // Framework-bound inputs only pick up the value through an input event
        let assign = format!(
            "function() {{ this.focus(); this.value = {}; \
             this.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             this.dispatchEvent(new Event('change', {{ bubbles: true }})); }}",
            literal
        );
        element.call_js_fn(assign, false).await?;
        Ok(())
    }

    async fn execute(&self, script: &str) -> SessionResult<()> {
        self.ensure_open()?;
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn close(&mut self) -> SessionResult<()> {
        self.ensure_open()?;
        self.closed = true;

        let result = if self.owns_browser {
            info!("Shutting down launched browser");
            match self.browser.close().await {
                Ok(_) => self
                    .browser
                    .wait()
                    .await
                    .map(|_| ())
                    .map_err(SessionError::from),
                Err(e) => Err(e.into()),
            }
        } else {
            info!("Closing attached tab");
            self.page.clone().close().await.map_err(SessionError::from)
        };

        self.handler.abort();
        if let Err(e) = &result {
            warn!("Browser did not close cleanly: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_process_wait_error_maps_to_browser() {
        let err = io::Error::other("child already reaped");
        let waited: io::Result<Option<std::process::ExitStatus>> = Err(err);
        let result: SessionResult<()> = waited.map(|_| ()).map_err(SessionError::from);
        match result {
            Err(SessionError::Browser(message)) => assert!(message.contains("already reaped")),
            other => panic!("expected Browser error, got {:?}", other),
        }
    }
}
