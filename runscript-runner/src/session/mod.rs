//! Browser session adapter
//!
//! Every component drives the browser through the [`Session`] trait, passed
//! in by reference. The concrete backend is a Chrome DevTools Protocol
//! session (see [`cdp`]); tests use an in-memory scripted session.
//!
//! Elements are addressed by [`Locator`] chains rather than live handles, so
//! a lookup after a page reload always resolves against the fresh DOM.

mod cdp;
#[cfg(test)]
pub mod scripted;

pub use cdp::{AttachTransport, LaunchTransport};

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tokio::time::{Duration, Instant};
use tracing::warn;

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// How often presence checks are repeated while waiting
pub const DEFAULT_POLL: Duration = Duration::from_millis(500);

/// Errors raised by a browser session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to browser: {0}")]
    Connect(String),

    #[error("element not found: {0}")]
    NoSuchElement(String),

    #[error("browser command failed: {0}")]
    Browser(String),

    #[error("session already closed")]
    Closed,
}

/// One CSS step of a locator chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub css: String,
    /// Pins the step to the n-th match; the first match is used otherwise
    pub nth: Option<usize>,
}

/// A chain of CSS selectors resolved from the page root
///
/// Each step is searched inside the element the previous step resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    steps: Vec<Step>,
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            steps: vec![Step {
                css: selector.into(),
                nth: None,
            }],
        }
    }

    pub fn id(id: &str) -> Self {
        Self::css(format!("#{}", id))
    }

    /// Pins the last step to its n-th match (zero based)
    pub fn nth(mut self, index: usize) -> Self {
        if let Some(last) = self.steps.last_mut() {
            last.nth = Some(index);
        }
        self
    }

    /// Adds a step searched inside the current one
    pub fn child(mut self, selector: impl Into<String>) -> Self {
        self.steps.push(Step {
            css: selector.into(),
            nth: None,
        });
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            f.write_str(&step.css)?;
            if let Some(nth) = step.nth {
                write!(f, ":nth({})", nth)?;
            }
        }
        Ok(())
    }
}

/// A controllable browser tab
#[async_trait]
pub trait Session: Send + Sync {
    /// Navigates to `url` and waits for the load to finish
    async fn navigate(&self, url: &str) -> SessionResult<()>;

    /// Reloads the current page
    async fn reload(&self) -> SessionResult<()>;

    async fn current_url(&self) -> SessionResult<String>;

    async fn title(&self) -> SessionResult<String>;

    /// Number of elements matching the final step; its index is ignored
    async fn count(&self, locator: &Locator) -> SessionResult<usize>;

    /// Attribute of the located element
    ///
    /// Fails with [`SessionError::NoSuchElement`] when the element is absent
    /// and returns `Ok(None)` when only the attribute is.
    async fn attribute(&self, locator: &Locator, name: &str) -> SessionResult<Option<String>>;

    /// Attribute of every element matching the final step, in document order
    async fn attributes(&self, locator: &Locator, name: &str)
    -> SessionResult<Vec<Option<String>>>;

    async fn click(&self, locator: &Locator) -> SessionResult<()>;

    /// Replaces the value of a text input
    async fn fill(&self, locator: &Locator, text: &str) -> SessionResult<()>;

    /// Runs a script in the page, discarding its result
    async fn execute(&self, script: &str) -> SessionResult<()>;

    /// Releases the session; later calls fail with [`SessionError::Closed`]
    async fn close(&mut self) -> SessionResult<()>;

    async fn exists(&self, locator: &Locator) -> SessionResult<bool> {
        match self.attribute(locator, "id").await {
            Ok(_) => Ok(true),
            Err(SessionError::NoSuchElement(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// A way of obtaining a session
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&self) -> SessionResult<Box<dyn Session>>;
}

/// Polls `probe` until it returns `true` or `timeout` elapses
///
/// The probe always runs at least once. Returns whether it succeeded.
pub async fn wait_until<F, Fut>(timeout: Duration, poll: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if probe().await {
            return true;
        }

        let now = Instant::now();
        if now >= deadline {
            return false;
        }

        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

/// Waits until `locator` resolves to an element
///
/// Lookup errors count as "not present yet".
pub async fn wait_for(session: &dyn Session, locator: &Locator, timeout: Duration) -> bool {
    wait_until(timeout, DEFAULT_POLL, || async move {
        session.exists(locator).await.unwrap_or(false)
    })
    .await
}

/// Whether the located control accepts clicks
///
/// A control is disabled through either `disabled` or `aria-disabled="true"`.
pub async fn is_enabled(session: &dyn Session, locator: &Locator) -> SessionResult<bool> {
    if session.attribute(locator, "disabled").await?.is_some() {
        return Ok(false);
    }

    let aria = session.attribute(locator, "aria-disabled").await?;
    Ok(aria.as_deref() != Some("true"))
}

/// Reloads the page, re-navigating to the current URL if the reload fails
pub async fn reload_or_renavigate(session: &dyn Session) -> SessionResult<()> {
    match session.reload().await {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!(
                "Reload failed, navigating to the current URL instead: {}",
                e
            );
            let url = session.current_url().await?;
            session.navigate(&url).await
        }
    }
}
