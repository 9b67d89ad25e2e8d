use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ProviderError;
use crate::retry::AutomationRetry;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Process-wide browser. Initialized once, shut down once, and hands out
/// isolated tabs to the workers.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    async fn new_tab(&self) -> Result<Box<dyn BrowserTab>, ProviderError>;
    async fn shutdown(&self);
}

#[async_trait]
pub trait BrowserTab: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), ProviderError>;
    async fn rendered_html(&mut self) -> Result<String, ProviderError>;
    async fn close(self: Box<Self>);
}

/// Browser settings shared by every page render.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub retry: AutomationRetry,
    /// Time given to client-side scripts after navigation.
    pub settle: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            retry: AutomationRetry::default(),
            settle: Duration::from_millis(4000),
        }
    }
}

/// Open a tab, navigate with the automation-retry policy, let the page
/// settle and return its rendered HTML. `Ok(None)` when navigation never
/// succeeded.
pub async fn render_page(
    engine: &dyn AutomationEngine,
    url: &str,
    options: &RenderOptions,
) -> Result<Option<String>, ProviderError> {
    let tab = Mutex::new(engine.new_tab().await?);
    let slot = &tab;

    let navigated = options
        .retry
        .run("navigate", move || async move {
            let mut tab = slot.lock().await;
            tab.navigate(url).await
        })
        .await;

    let mut tab = tab.into_inner();
    if navigated.is_none() {
        warn!(url = %url, "Could not load page");
        tab.close().await;
        return Ok(None);
    }

    if !options.settle.is_zero() {
        tokio::time::sleep(options.settle).await;
    }

    let html = tab.rendered_html().await;
    tab.close().await;
    html.map(Some)
}

/// Chrome driven over WebDriver. Each tab is its own WebDriver session so
/// workers never fight over window focus.
pub struct WebDriverEngine {
    server_url: String,
    capabilities: ChromeCapabilities,
    root: Mutex<Option<WebDriver>>,
}

impl WebDriverEngine {
    pub async fn connect(server_url: &str) -> Result<Arc<Self>, ProviderError> {
        let mut capabilities = DesiredCapabilities::chrome();
        capabilities
            .set_headless()
            .map_err(|e| ProviderError::navigation(server_url, e))?;
        let user_agent = format!("--user-agent={USER_AGENT}");
        for arg in ["--window-size=1920,1080", user_agent.as_str()] {
            capabilities
                .add_arg(arg)
                .map_err(|e| ProviderError::navigation(server_url, e))?;
        }

        info!(server_url, "Starting browser session");
        let root = WebDriver::new(server_url, capabilities.clone())
            .await
            .map_err(|e| ProviderError::navigation(server_url, e))?;

        Ok(Arc::new(Self {
            server_url: server_url.to_string(),
            capabilities,
            root: Mutex::new(Some(root)),
        }))
    }
}

#[async_trait]
impl AutomationEngine for WebDriverEngine {
    async fn new_tab(&self) -> Result<Box<dyn BrowserTab>, ProviderError> {
        if self.root.lock().await.is_none() {
            return Err(ProviderError::navigation(&self.server_url, "browser already shut down"));
        }
        let driver = WebDriver::new(&self.server_url, self.capabilities.clone())
            .await
            .map_err(|e| ProviderError::navigation(&self.server_url, e))?;
        Ok(Box::new(WebDriverTab { driver, url: None }))
    }

    async fn shutdown(&self) {
        if let Some(root) = self.root.lock().await.take() {
            info!("Shutting down browser session");
            if let Err(e) = root.quit().await {
                warn!(error = %e, "Failed to quit browser session");
            }
        }
    }
}

struct WebDriverTab {
    driver: WebDriver,
    url: Option<String>,
}

#[async_trait]
impl BrowserTab for WebDriverTab {
    async fn navigate(&mut self, url: &str) -> Result<(), ProviderError> {
        debug!(url = %url, "Navigating");
        self.driver
            .goto(url)
            .await
            .map_err(|e| ProviderError::navigation(url, e))?;
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn rendered_html(&mut self) -> Result<String, ProviderError> {
        let url = self.url.clone().unwrap_or_default();
        let html = self
            .driver
            .source()
            .await
            .map_err(|e| ProviderError::navigation(&url, e))?;
        if html.trim().is_empty() {
            return Err(ProviderError::navigation(&url, "empty page"));
        }
        Ok(html)
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.driver.quit().await {
            debug!(error = %e, "Failed to close tab session");
        }
    }
}
