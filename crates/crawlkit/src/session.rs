//! Browser session management
//!
//! At most one headless Chromium lives per [`BrowserSession`]. The start
//! transition runs under an async mutex so concurrent callers trigger a
//! single launch; shutdown always resets the slot so a later
//! `ensure_started` can retry after a failed stop.

use crate::error::CrawlError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Pause after navigation before reading content
const PAGE_SETTLE: Duration = Duration::from_millis(500);

/// Scroll cycles used to trigger lazy-loaded content
const SCROLL_CYCLES: usize = 2;

/// Pause after each scroll step
const SCROLL_PAUSE: Duration = Duration::from_secs(1);

/// A page rendered to stable markup, with best-effort client context
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Serialized DOM after settling and scrolling
    pub html: String,
    /// The client's user-agent string, when retrievable
    pub user_agent: Option<String>,
    /// Session cookies, empty when retrieval failed
    pub cookies: Vec<(String, String)>,
}

/// Capability boundary over the rendering engine
///
/// The crawler talks to this trait only; the Chromium-backed
/// [`BrowserSession`] is the production implementation and tests swap
/// in canned renderers.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Start the engine if needed; idempotent and safe under
    /// concurrent callers
    async fn ensure_started(&self) -> Result<(), CrawlError>;

    /// Render one URL to stable markup
    async fn render(&self, url: &str) -> Result<RenderedPage, CrawlError>;

    /// Stop the engine; never fails, logs stop problems
    async fn shutdown(&self);
}

struct LiveBrowser {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

/// Lazily started, exclusively gated Chromium session
pub struct BrowserSession {
    slot: Mutex<Option<LiveBrowser>>,
}

impl BrowserSession {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    async fn launch() -> Result<LiveBrowser, CrawlError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .window_size(1920, 1080)
            .build()
            .map_err(CrawlError::SessionStart)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::SessionStart(e.to_string()))?;

        // The handler drives the CDP connection and must be polled for
        // the life of the browser
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(LiveBrowser {
            browser,
            handler_task,
        })
    }

    /// Start the browser unless already running
    ///
    /// Only one caller performs the launch; the rest block on the gate
    /// and observe the running instance.
    pub async fn ensure_started(&self) -> Result<(), CrawlError> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            debug!("launching headless browser");
            *slot = Some(Self::launch().await?);
        }
        Ok(())
    }

    /// Open a new page context; the caller must close it on every path
    pub async fn open_page(&self, url: &str) -> Result<Page, CrawlError> {
        self.ensure_started().await?;
        let slot = self.slot.lock().await;
        let live = slot
            .as_ref()
            .ok_or_else(|| CrawlError::SessionStart("browser not running".to_string()))?;
        live.browser
            .new_page(url)
            .await
            .map_err(|e| CrawlError::Render(e.to_string()))
    }

    /// Stop the browser; stop failures are logged, never raised, and
    /// the slot is reset either way
    pub async fn shutdown(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(mut live) = slot.take() {
            debug!("shutting down headless browser");
            if let Err(err) = live.browser.close().await {
                warn!(error = %err, "browser close failed");
            }
            live.handler_task.abort();
        }
    }
}

impl Default for BrowserSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for BrowserSession {
    async fn ensure_started(&self) -> Result<(), CrawlError> {
        BrowserSession::ensure_started(self).await
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        let page = self.open_page(url).await?;
        let rendered = render_page(&page).await;
        // The page context is closed on success and failure alike
        if let Err(err) = page.close().await {
            debug!(%url, error = %err, "page close failed");
        }
        rendered
    }

    async fn shutdown(&self) {
        BrowserSession::shutdown(self).await;
    }
}

/// Settle, scroll to trigger lazy loading, then read the markup and
/// best-effort client context
async fn render_page(page: &Page) -> Result<RenderedPage, CrawlError> {
    let _ = page.wait_for_navigation().await;
    tokio::time::sleep(PAGE_SETTLE).await;

    for _ in 0..SCROLL_CYCLES {
        let _ = page.evaluate("window.scrollBy(0, 1080)").await;
        tokio::time::sleep(SCROLL_PAUSE).await;
    }

    let html = page
        .content()
        .await
        .map_err(|e| CrawlError::Render(e.to_string()))?;

    let user_agent = match page.evaluate("navigator.userAgent").await {
        Ok(value) => value.into_value::<String>().ok(),
        Err(_) => None,
    };

    let cookies = match page.get_cookies().await {
        Ok(cookies) => cookies
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect(),
        Err(err) => {
            debug!(error = %err, "cookie retrieval failed, continuing without cookies");
            Vec::new()
        }
    };

    Ok(RenderedPage {
        html,
        user_agent,
        cookies,
    })
}
