//! Chrome page source.
//!
//! Launches one browser over the DevTools protocol, keeps a single tab on the
//! ranking page and answers [`PageSource`] queries against its DOM.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use coinwatch_core::*;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ROW_SELECTOR: &str = "table tbody tr";

/// True once a data row exists and the first row's price cell shows `$`.
const READY_PROBE: &str = "document.querySelectorAll('table tbody tr').length > 0 \
    && ((document.querySelector('table tbody tr td:nth-child(4)') || {}).innerText || '').includes('$')";

/// Lazily rendered rows only materialise once scrolled into view.
const SCROLL_SCRIPT: &str = "window.scrollTo(0, 600)";

const READY_POLL: Duration = Duration::from_millis(250);

/// Browser launch configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumConfig {
    pub url: String,
    pub headless: bool,
    pub viewport: Viewport,
    /// Skip image downloads; the table is text.
    pub load_images: bool,
    /// Per-command CDP timeout in seconds. Unset follows the page load
    /// timeout of the tracker.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            url: "https://coinmarketcap.com/".to_string(),
            headless: false,
            viewport: Viewport::default(),
            load_images: false,
            request_timeout_secs: None,
        }
    }
}

/// Window dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl ChromiumConfig {
    fn browser_config(&self) -> Result<BrowserConfig, SourceError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.viewport.width, self.viewport.height)
            .viewport(None)
            .no_sandbox()
            .arg("--disable-dev-shm-usage");
        if let Some(secs) = self.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
        if !self.headless {
            builder = builder.with_head();
        }
        if !self.load_images {
            builder = builder.arg("--blink-settings=imagesEnabled=false");
        }
        builder.build().map_err(SourceError::LaunchFailed)
    }
}

/// A live Chrome session with one tab on the ranking page.
pub struct ChromiumSource {
    browser: Browser,
    page: Page,
    /// Rows of the current page load, queried once and indexed by position.
    rows: Vec<Element>,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumSource {
    /// Launch the browser and open `config.url`.
    ///
    /// If the browser starts but the page cannot be opened, the browser is
    /// shut down again before the error is returned.
    pub async fn launch(config: &ChromiumConfig) -> Result<Self, SourceError> {
        let browser_config = config.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| SourceError::LaunchFailed(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "CDP handler error");
                }
            }
        });

        let page = match browser.new_page(config.url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "Failed to close browser after launch error");
                }
                if let Err(wait_err) = browser.wait().await {
                    warn!(error = %wait_err, "Browser process did not exit cleanly");
                }
                handler.abort();
                return Err(SourceError::LaunchFailed(format!(
                    "Failed to open {}: {}",
                    config.url, e
                )));
            }
        };

        info!(
            url = %config.url,
            headless = config.headless,
            width = config.viewport.width,
            height = config.viewport.height,
            "Browser launched"
        );

        Ok(Self {
            browser,
            page,
            rows: Vec::new(),
            handler,
            closed: false,
        })
    }
}

async fn probe_ready(page: &Page) -> Result<bool, SourceError> {
    match page.evaluate(READY_PROBE).await {
        Ok(result) => Ok(result.into_value::<bool>().unwrap_or(false)),
        Err(e) => {
            let err = map_cdp(e);
            if err.is_fatal() {
                return Err(err);
            }
            // The execution context is torn down while a reload settles.
            debug!(error = %err, "Readiness probe failed");
            Ok(false)
        }
    }
}

#[async_trait]
impl PageSource for ChromiumSource {
    async fn refresh(&mut self) -> Result<(), SourceError> {
        self.rows.clear();
        let reload = match self.page.reload().await {
            Ok(_) => Ok(()),
            Err(e) => match map_cdp(e) {
                stalled @ SourceError::Timeout(_) => Err(stalled),
                other => return Err(navigation_error(other)),
            },
        };

        if let Err(e) = self.page.evaluate(SCROLL_SCRIPT).await {
            let err = navigation_error(map_cdp(e));
            if reload.is_ok() || err.is_fatal() {
                return Err(err);
            }
            debug!(error = %err, "Scroll skipped, page still loading");
        }
        reload
    }

    async fn wait_ready(&mut self, timeout: Duration) -> Result<bool, SourceError> {
        let page = &self.page;
        let poll = async {
            loop {
                if probe_ready(page).await? {
                    return Ok::<(), SourceError>(());
                }
                tokio::time::sleep(READY_POLL).await;
            }
        };
        match tokio::time::timeout(timeout, poll).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(false),
        }
    }

    async fn row_count(&mut self) -> Result<usize, SourceError> {
        self.rows = self.page.find_elements(ROW_SELECTOR).await.map_err(map_cdp)?;
        Ok(self.rows.len())
    }

    async fn row_cells(&mut self, index: usize) -> Result<Vec<String>, SourceError> {
        let row_error = |e: CdpError| match map_cdp(e) {
            fatal @ SourceError::Disconnected(_) => fatal,
            other => SourceError::RowUnavailable {
                index,
                reason: other.to_string(),
            },
        };

        if self.rows.is_empty() {
            self.rows = self.page.find_elements(ROW_SELECTOR).await.map_err(map_cdp)?;
        }
        let row = nth_row(&self.rows, index)?;
        let cells = row.find_elements("td").await.map_err(row_error)?;

        let mut texts = Vec::with_capacity(cells.len());
        for cell in cells {
            let text = cell.inner_text().await.map_err(row_error)?;
            texts.push(text.unwrap_or_default());
        }
        Ok(texts)
    }

    async fn capture_diagnostic(&mut self, path: &Path) -> Result<(), SourceError> {
        let params = ScreenshotParams::builder().full_page(true).build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| match map_cdp(e) {
                fatal @ SourceError::Disconnected(_) => fatal,
                other => SourceError::Diagnostic(other.to_string()),
            })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let result = self.browser.close().await.map(|_| ()).map_err(map_cdp);
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        result
    }
}

/// Row `index` of the list `row_count` saw.
fn nth_row<T>(rows: &[T], index: usize) -> Result<&T, SourceError> {
    rows.get(index).ok_or_else(|| SourceError::RowUnavailable {
        index,
        reason: format!("only {} rows rendered", rows.len()),
    })
}

/// A dropped websocket or channel means the browser is gone.
fn map_cdp(err: CdpError) -> SourceError {
    match err {
        CdpError::Timeout => SourceError::Timeout(err.to_string()),
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
            SourceError::Disconnected(err.to_string())
        }
        other => SourceError::Query(other.to_string()),
    }
}

fn navigation_error(err: SourceError) -> SourceError {
    match err {
        SourceError::Query(reason) => SourceError::Navigation(reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChromiumConfig::default();
        assert_eq!(config.url, "https://coinmarketcap.com/");
        assert!(!config.headless);
        assert!(!config.load_images);
        assert!(config.request_timeout_secs.is_none());
        assert_eq!(config.viewport, Viewport { width: 1920, height: 1080 });
    }

    #[test]
    fn test_navigation_error_rewraps_query() {
        let err = navigation_error(SourceError::Query("timeout".into()));
        assert!(matches!(err, SourceError::Navigation(_)));
        let err = navigation_error(SourceError::Disconnected("ws".into()));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_cdp_timeout_is_recoverable_timeout() {
        let err = navigation_error(map_cdp(CdpError::Timeout));
        assert!(matches!(err, SourceError::Timeout(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_nth_row_indexes_the_counted_list() {
        let rows = vec!["first table row", "second table row"];
        assert_eq!(*nth_row(&rows, 1).unwrap(), "second table row");

        let err = nth_row(&rows, 2).unwrap_err();
        assert!(matches!(err, SourceError::RowUnavailable { index: 2, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_request_timeout_from_file() {
        let config: ChromiumConfig = toml::from_str("request_timeout_secs = 45").unwrap();
        assert_eq!(config.request_timeout_secs, Some(45));
        assert_eq!(config.viewport, Viewport::default());
    }
}
