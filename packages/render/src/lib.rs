//! Headless Chromium HTML-to-PDF rendering.
//!
//! Every render launches a fresh browser, prints a single page and closes the
//! browser again. The session is a scoped resource: it is closed explicitly on
//! every path, and dropping it (for example when the caller's timeout cancels
//! the render) aborts the CDP handler task and kills the browser process.

use std::path::PathBuf;
use std::time::Duration;

use certificate_core::env::{parse_positive_secs, var_non_empty};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

const MM_PER_INCH: f64 = 25.4;

/// Resolves once the document and its subresources have loaded.
const WAIT_FOR_LOAD: &str = r#"
new Promise((resolve) => {
    if (document.readyState === "complete") {
        resolve(true);
    } else {
        window.addEventListener("load", () => resolve(true), { once: true });
    }
})
"#;

/// Render errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid renderer config: {0}")]
    InvalidConfig(String),

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("failed to load certificate page: {0}")]
    Page(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout {
        stage: &'static str,
        after: Duration,
    },

    #[error("failed to print PDF: {0}")]
    Pdf(String),
}

/// Page layout handed to Chromium's print-to-PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfLayout {
    pub landscape: bool,
    pub print_background: bool,
    pub scale: f64,
    /// Paper size in millimetres, portrait orientation.
    pub paper_width_mm: f64,
    pub paper_height_mm: f64,
    pub margin_top_mm: f64,
    pub margin_bottom_mm: f64,
    pub margin_left_mm: f64,
    pub margin_right_mm: f64,
    /// Pages to keep, e.g. `"1"`; `None` prints everything.
    pub page_ranges: Option<String>,
}

impl PdfLayout {
    /// Single landscape A4 page with backgrounds, as certificates are printed.
    pub fn certificate() -> Self {
        Self {
            landscape: true,
            print_background: true,
            scale: 0.9,
            paper_width_mm: 210.0,
            paper_height_mm: 297.0,
            margin_top_mm: 5.0,
            margin_bottom_mm: 10.0,
            margin_left_mm: 15.0,
            margin_right_mm: 15.0,
            page_ranges: Some("1".to_string()),
        }
    }

    /// CDP parameters; Chromium measures paper and margins in inches.
    pub fn to_params(&self) -> PrintToPdfParams {
        let inches = |mm: f64| mm / MM_PER_INCH;
        PrintToPdfParams {
            landscape: Some(self.landscape),
            print_background: Some(self.print_background),
            scale: Some(self.scale),
            paper_width: Some(inches(self.paper_width_mm)),
            paper_height: Some(inches(self.paper_height_mm)),
            margin_top: Some(inches(self.margin_top_mm)),
            margin_bottom: Some(inches(self.margin_bottom_mm)),
            margin_left: Some(inches(self.margin_left_mm)),
            margin_right: Some(inches(self.margin_right_mm)),
            page_ranges: self.page_ranges.clone(),
            prefer_css_page_size: Some(false),
            ..Default::default()
        }
    }
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::certificate()
    }
}

/// Renderer configuration.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Chrome/Chromium binary; auto-detected when unset.
    pub chrome_executable: Option<PathBuf>,
    /// Upper bound for the browser process to come up.
    pub launch_timeout: Duration,
    /// Upper bound for the certificate page to load.
    pub page_load_timeout: Duration,
    /// Upper bound for closing the browser before it is killed.
    pub close_timeout: Duration,
    pub window_size: (u32, u32),
    pub layout: PdfLayout,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            launch_timeout: Duration::from_secs(20),
            page_load_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
            window_size: (1200, 800),
            layout: PdfLayout::certificate(),
        }
    }
}

impl RendererConfig {
    /// Build a config from environment variables.
    ///
    /// - `CHROME_PATH` (optional, browser binary)
    /// - `RENDER_LAUNCH_TIMEOUT_SECS` (default: 20, must be positive)
    /// - `RENDER_PAGE_LOAD_TIMEOUT_SECS` (default: 30, must be positive)
    pub fn from_env() -> Result<Self, RenderError> {
        Self::from_vars(var_non_empty)
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, RenderError> {
        let secs = |name: &str| {
            var(name)
                .map(|v| parse_positive_secs(name, &v).map_err(RenderError::InvalidConfig))
                .transpose()
        };

        let mut config = Self::default();
        if let Some(path) = var("CHROME_PATH") {
            config.chrome_executable = Some(PathBuf::from(path));
        }
        if let Some(timeout) = secs("RENDER_LAUNCH_TIMEOUT_SECS")? {
            config.launch_timeout = timeout;
        }
        if let Some(timeout) = secs("RENDER_PAGE_LOAD_TIMEOUT_SECS")? {
            config.page_load_timeout = timeout;
        }
        Ok(config)
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig, RenderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.window_size.0, self.window_size.1)
            .launch_timeout(self.launch_timeout)
            .request_timeout(self.page_load_timeout);

        if let Some(path) = &self.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(RenderError::InvalidConfig)
    }
}

/// A running browser plus the task driving its CDP connection.
struct BrowserSession {
    browser: Option<Browser>,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(config: &RendererConfig) -> Result<Self, RenderError> {
        let browser_config = config.browser_config()?;

        let (browser, mut handler) =
            tokio::time::timeout(config.launch_timeout, Browser::launch(browser_config))
                .await
                .map_err(|_| RenderError::Timeout {
                    stage: "browser launch",
                    after: config.launch_timeout,
                })?
                .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            browser: Some(browser),
            handler,
        })
    }

    async fn print(&self, html: &str, config: &RendererConfig) -> Result<Vec<u8>, RenderError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| RenderError::Launch("browser already closed".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Page(e.to_string()))?;

        tokio::time::timeout(config.page_load_timeout, load_content(&page, html))
            .await
            .map_err(|_| RenderError::Timeout {
                stage: "page load",
                after: config.page_load_timeout,
            })??;

        page.pdf(config.layout.to_params())
            .await
            .map_err(|e| RenderError::Pdf(e.to_string()))
    }

    /// Close the browser, killing it if it does not exit in time.
    async fn close(mut self, timeout: Duration) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };

        let graceful = tokio::time::timeout(timeout, async {
            browser.close().await.map_err(|e| e.to_string())?;
            browser.wait().await.map_err(|e| e.to_string())?;
            Ok::<_, String>(())
        })
        .await;

        match graceful {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Browser did not close cleanly, killing it: {}", e);
                let _ = browser.kill().await;
            }
            Err(_) => {
                tracing::warn!("Browser close timed out after {:?}, killing it", timeout);
                let _ = browser.kill().await;
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Dropping the browser kills its process if it is still running
        self.handler.abort();
    }
}

async fn load_content(page: &Page, html: &str) -> Result<(), RenderError> {
    page.set_content(html)
        .await
        .map_err(|e| RenderError::Page(e.to_string()))?;
    page.evaluate(WAIT_FOR_LOAD)
        .await
        .map_err(|e| RenderError::Page(e.to_string()))?;
    Ok(())
}

/// Renders HTML documents to PDF with a per-call headless Chromium.
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    config: RendererConfig,
}

impl ChromiumRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Render `html` to PDF bytes.
    ///
    /// The browser is always torn down before this returns.
    pub async fn render_pdf(&self, html: &str) -> Result<Vec<u8>, RenderError> {
        let session = BrowserSession::launch(&self.config).await?;
        let result = session.print(html, &self.config).await;
        session.close(self.config.close_timeout).await;

        match &result {
            Ok(pdf) => tracing::debug!("Rendered PDF ({} bytes)", pdf.len()),
            Err(e) => tracing::warn!("PDF render failed: {}", e),
        }
        result
    }
}
