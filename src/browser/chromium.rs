//! Chromiumoxide-backed render surface.
//!
//! Drives headless Chrome over CDP with stealth patches so challenge scripts
//! run in something that looks like a real browser. The browser process is
//! shared across surfaces; each surface owns one page.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{contains_challenge_markers, RenderSurface, SurfaceFactory};
use crate::config::RenderConfig;
use crate::error::{Result, ScrapeError};

/// Common Chrome executable locations.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const PAGE_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Evasion scripts based on puppeteer-extra-plugin-stealth techniques.
/// Best-effort: injection failures are logged, not fatal.
const STEALTH_SCRIPTS: &[&str] = &[
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
];

fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!(path, "found Chrome executable");
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!(path, "found Chrome in PATH");
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(ScrapeError::BrowserUnavailable(
        "Chrome/Chromium not found; install it or set a remote browser URL".to_string(),
    ))
}

/// Surface factory holding one lazily launched browser process.
pub struct ChromiumFactory {
    config: RenderConfig,
    browser: Mutex<Option<Arc<Mutex<Browser>>>>,
}

impl ChromiumFactory {
    pub fn new(config: RenderConfig) -> Self {
        Self { config, browser: Mutex::new(None) }
    }

    /// Launch or connect to the shared browser on first use.
    async fn ensure_browser(&self) -> Result<Arc<Mutex<Browser>>> {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.as_ref() {
            return Ok(browser.clone());
        }

        let browser = if let Some(remote_url) = self.config.remote_url.clone() {
            connect_remote(&remote_url).await?
        } else {
            launch_local(&self.config).await?
        };

        let browser = Arc::new(Mutex::new(browser));
        *guard = Some(browser.clone());
        Ok(browser)
    }
}

async fn launch_local(config: &RenderConfig) -> Result<Browser> {
    info!(headless = config.headless, "launching browser");

    let chrome_path = find_chrome()?;
    let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

    // with_head means NOT headless, confusingly.
    if !config.headless {
        builder = builder.with_head();
    }

    builder = builder
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--no-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-software-rasterizer");

    let browser_config = builder
        .build()
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("browser config: {}", e)))?;

    let (browser, mut handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("launch failed: {}", e)))?;

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok(browser)
}

/// Connect to a remote DevTools endpoint (e.g. "ws://localhost:9222").
async fn connect_remote(url: &str) -> Result<Browser> {
    info!(url, "connecting to remote browser");

    let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    let client = reqwest::Client::new();
    let resp: serde_json::Value = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("remote browser unreachable: {}", e)))?
        .json()
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("bad version response: {}", e)))?;

    let ws_url = resp
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ScrapeError::BrowserUnavailable("no webSocketDebuggerUrl in response".to_string())
        })?;

    debug!(ws_url, "connecting to WebSocket");

    let (browser, mut handler) = Browser::connect(ws_url)
        .await
        .map_err(|e| ScrapeError::BrowserUnavailable(format!("connect failed: {}", e)))?;

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok(browser)
}

#[async_trait]
impl SurfaceFactory for ChromiumFactory {
    async fn create(&self) -> Result<Box<dyn RenderSurface>> {
        let browser = self.ensure_browser().await?;
        let page = {
            let guard = browser.lock().await;
            guard
                .new_page("about:blank")
                .await
                .map_err(|e| ScrapeError::BrowserUnavailable(format!("new page: {}", e)))?
        };

        // UA override has to land before the first navigation.
        page.execute(SetUserAgentOverrideParams::new(PAGE_USER_AGENT.to_string()))
            .await
            .map_err(|e| ScrapeError::BrowserUnavailable(format!("user agent override: {}", e)))?;

        Ok(Box::new(ChromiumSurface { page: Some(page) }))
    }
}

/// One browser tab.
pub struct ChromiumSurface {
    page: Option<Page>,
}

impl ChromiumSurface {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::Session("render surface already destroyed".to_string()))
    }

    async fn apply_stealth(&self, page: &Page) {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page.evaluate(script.to_string()).await {
                // Can fail on non-HTML pages or mid-transition.
                debug!(error = %e, "stealth script injection skipped");
            }
        }
    }
}

#[async_trait]
impl RenderSurface for ChromiumSurface {
    async fn load(&mut self, url: &str) -> Result<()> {
        let page = self.page()?;

        debug!(url, "navigating render surface");
        let nav = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScrapeError::LoadError {
                url: url.to_string(),
                message: format!("invalid URL: {}", e),
            })?;

        page.execute(nav).await.map_err(|e| ScrapeError::LoadError {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        // readyState poll instead of a fixed sleep; the caller adds the
        // challenge-script delay on top.
        let ready_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;
        if let Err(e) = page.evaluate(ready_script.to_string()).await {
            debug!(url, error = %e, "could not check ready state");
        }

        self.apply_stealth(self.page()?).await;
        Ok(())
    }

    async fn detect_challenge(&mut self) -> Result<bool> {
        let page = self.page()?;
        let content = page.content().await.map_err(|e| ScrapeError::Session(e.to_string()))?;
        Ok(contains_challenge_markers(&content))
    }

    async fn wait_and_extract(&mut self, script: &str) -> Result<serde_json::Value> {
        let page = self.page()?;
        let result = page
            .evaluate(script.to_string())
            .await
            .map_err(|e| ScrapeError::ExtractionFailed(e.to_string()))?;
        result
            .into_value::<serde_json::Value>()
            .map_err(|e| ScrapeError::ExtractionFailed(format!("result decode: {}", e)))
    }

    async fn destroy(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "failed to close render page");
            }
        }
    }
}
