//! Browser rendering seam.
//!
//! The extractor only talks to a [`Renderer`] and the [`RenderSession`]s it
//! launches. All calls are blocking; the extractor runs them off the async
//! runtime.

#[cfg(feature = "headless")]
mod chrome;

#[cfg(feature = "headless")]
pub use chrome::ChromeRenderer;

use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Opaque reference to an element inside the page a session has loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u32);

/// Launches isolated browsing sessions. Sessions are never shared or pooled.
pub trait Renderer: Send + Sync {
    fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// One isolated browsing session holding a single page.
pub trait RenderSession {
    /// Navigate and block until the network is idle or `timeout` elapses.
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError>;

    fn wait(&mut self, duration: Duration);

    /// Full rendered markup of the current page.
    fn content(&self) -> Result<String, RenderError>;

    /// All elements matching `selector`, in document order. No match is an
    /// empty list, not an error.
    fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, RenderError>;

    fn inner_text(&self, node: &NodeHandle) -> Result<String, RenderError>;

    /// First descendant of `node` matching any of `selectors`, in document
    /// order.
    fn query_descendant(
        &self,
        node: &NodeHandle,
        selectors: &[&str],
    ) -> Result<Option<NodeHandle>, RenderError>;

    fn close(&mut self) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid selector {0}")]
    Selector(String),

    #[error("Browser protocol error: {0}")]
    Protocol(String),
}

/// Hard deadline shared by every step of one navigation.
#[derive(Debug, Clone, Copy)]
pub struct NavigationBudget {
    deadline: Instant,
    timeout: Duration,
}

impl NavigationBudget {
    pub fn start(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    /// Time left before the deadline, or a timeout error once it has passed.
    pub fn remaining(&self) -> Result<Duration, RenderError> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(self.exceeded());
        }
        Ok(left)
    }

    /// Whether the page has been quiet for `window`. An expired deadline wins
    /// over a quiet network.
    pub fn is_idle(&self, quiet_for: Duration, window: Duration) -> Result<bool, RenderError> {
        self.remaining()?;
        Ok(quiet_for >= window)
    }

    pub fn exceeded(&self) -> RenderError {
        RenderError::Timeout(self.timeout.as_millis() as u64)
    }
}

/// Owns a session and closes it exactly once, on `release` or on drop.
pub struct ScopedSession {
    session: Box<dyn RenderSession>,
    closed: bool,
}

impl ScopedSession {
    pub fn new(session: Box<dyn RenderSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub fn release(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.session.close() {
            tracing::warn!("Failed to close browser session: {}", e);
        }
    }
}

impl Deref for ScopedSession {
    type Target = dyn RenderSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for ScopedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.close_once();
    }
}
