use super::{NavigationBudget, NodeHandle, RenderError, RenderSession, Renderer};
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const NETWORK_IDLE_HANDLER: &str = "network_idle";
const NETWORK_IDLE_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_IDLE_POLL: Duration = Duration::from_millis(100);
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(90);

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Launches a fresh headless Chrome process per session.
pub struct ChromeRenderer {
    headless: bool,
}

impl ChromeRenderer {
    pub fn from_env() -> Self {
        let use_visible_browser = std::env::var("VISIBLE_BROWSER").is_ok();
        if use_visible_browser {
            tracing::info!("Using visible browser mode");
        }
        Self {
            headless: !use_visible_browser,
        }
    }
}

impl Renderer for ChromeRenderer {
    fn launch(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        let args = vec![
            std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
            std::ffi::OsStr::new("--no-first-run"),
            std::ffi::OsStr::new("--no-default-browser-check"),
            std::ffi::OsStr::new("--disable-extensions"),
            std::ffi::OsStr::new("--disable-sync"),
            std::ffi::OsStr::new("--mute-audio"),
            std::ffi::OsStr::new("--lang=en-US"),
        ];

        let launch_options = LaunchOptions::default_builder()
            .headless(self.headless)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(args)
            .build()
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let browser = Browser::new(launch_options).map_err(|e| RenderError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| RenderError::Launch(e.to_string()))?;
        if let Err(e) = tab.set_user_agent(USER_AGENT, None, None) {
            tracing::debug!("Failed to set user agent: {}", e);
        }

        tracing::debug!("Launched browser session");

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
        }))
    }
}

struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl ChromeSession {
    fn element(&self, node: &NodeHandle) -> Result<Element<'_>, RenderError> {
        Element::new(&self.tab, node.0).map_err(|e| RenderError::Protocol(e.to_string()))
    }

    /// Each protocol wait gets only what is left of the budget.
    fn load(&self, url: &str, budget: &NavigationBudget) -> Result<(), RenderError> {
        self.tab.set_default_timeout(budget.remaining()?);
        let tab = self.tab.navigate_to(url).map_err(|e| {
            if e.is::<Timeout>() {
                budget.exceeded()
            } else {
                RenderError::Navigation(e.to_string())
            }
        })?;

        tab.set_default_timeout(budget.remaining()?);
        tab.wait_until_navigated().map_err(|e| {
            if e.is::<Timeout>() {
                budget.exceeded()
            } else {
                RenderError::Navigation(e.to_string())
            }
        })?;
        Ok(())
    }

    fn wait_for_network_idle(
        &self,
        last_activity: &Mutex<Instant>,
        budget: &NavigationBudget,
    ) -> Result<(), RenderError> {
        loop {
            let quiet_for = last_activity
                .lock()
                .map(|last| last.elapsed())
                .unwrap_or(NETWORK_IDLE_WINDOW);

            if budget.is_idle(quiet_for, NETWORK_IDLE_WINDOW)? {
                return Ok(());
            }

            std::thread::sleep(NETWORK_IDLE_POLL);
        }
    }
}

impl RenderSession for ChromeSession {
    fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let budget = NavigationBudget::start(timeout);

        let last_activity = Arc::new(Mutex::new(Instant::now()));
        let handler_activity = last_activity.clone();
        self.tab
            .register_response_handling(
                NETWORK_IDLE_HANDLER,
                Box::new(move |_event_params, _fetch_body| {
                    if let Ok(mut last) = handler_activity.lock() {
                        *last = Instant::now();
                    }
                }),
            )
            .map_err(|e| RenderError::Protocol(e.to_string()))?;

        let navigated = self
            .load(url, &budget)
            .and_then(|_| self.wait_for_network_idle(&last_activity, &budget));

        if let Err(e) = self.tab.deregister_response_handling(NETWORK_IDLE_HANDLER) {
            tracing::debug!("Failed to remove network idle handler: {}", e);
        }

        if let Err(ref e) = navigated {
            tracing::warn!("Navigation to {} failed: {}", url, e);
        }
        navigated
    }

    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn content(&self) -> Result<String, RenderError> {
        self.tab
            .get_content()
            .map_err(|e| RenderError::Protocol(e.to_string()))
    }

    fn query_all(&self, selector: &str) -> Result<Vec<NodeHandle>, RenderError> {
        match self.tab.find_elements(selector) {
            Ok(elements) => Ok(elements
                .into_iter()
                .map(|element| NodeHandle(element.node_id))
                .collect()),
            Err(e) if e.is::<NoElementFound>() => Ok(Vec::new()),
            Err(e) => Err(RenderError::Selector(format!("{}: {}", selector, e))),
        }
    }

    fn inner_text(&self, node: &NodeHandle) -> Result<String, RenderError> {
        self.element(node)?
            .get_inner_text()
            .map_err(|e| RenderError::Protocol(e.to_string()))
    }

    fn query_descendant(
        &self,
        node: &NodeHandle,
        selectors: &[&str],
    ) -> Result<Option<NodeHandle>, RenderError> {
        let selector = selectors.join(", ");
        match self.element(node)?.find_element(&selector) {
            Ok(element) => Ok(Some(NodeHandle(element.node_id))),
            Err(e) if e.is::<NoElementFound>() => Ok(None),
            Err(e) => Err(RenderError::Selector(format!("{}: {}", selector, e))),
        }
    }

    fn close(&mut self) -> Result<(), RenderError> {
        let Some(browser) = self.browser.take() else {
            return Ok(());
        };

        let closed = self
            .tab
            .close(true)
            .map(|_| ())
            .map_err(|e| RenderError::Protocol(e.to_string()));

        drop(browser);
        tracing::debug!("Closed browser session");
        closed
    }
}
