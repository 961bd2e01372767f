//! Page fetching through a headless browser. `ChromiumFetcher` takes a proxy
//! argument per call (executable discovery, headless config builder,
//! launch/navigate/wait/capture/close) instead of baking one proxy into a
//! single global browser instance. Each launch also picks a random user
//! agent from `crate::antibot` and passes it to Chromium as a `--user-agent`
//! flag, the same way a proxy is passed as `--proxy-server`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Browser;
use futures::StreamExt;
use tracing::{error, warn};

use crate::antibot;
use crate::core::errors::{Result, SeoError};

/// Raw fetch output before extraction: final URL after redirects, and the
/// rendered HTML.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub html: String,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, proxy: Option<&str>) -> Result<FetchedPage>;
}

/// Find a usable Chromium-family browser executable.
///
/// Resolution order: `CHROME_EXECUTABLE` env var → PATH scan → OS-specific
/// well-known install paths.
pub fn find_chrome_executable() -> Option<String> {
    if let Ok(p) = std::env::var("CHROME_EXECUTABLE") {
        if Path::new(&p).exists() {
            return Some(p);
        }
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = ["google-chrome", "chromium", "chromium-browser", "chrome"];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

fn build_headless_config(exe: &str, proxy_url: Option<&str>, user_agent: &str, width: u32, height: u32) -> Result<BrowserConfig> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(exe)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-setuid-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--disable-translate")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--hide-scrollbars")
        .arg("--mute-audio")
        .arg(format!("--user-agent={}", user_agent));

    if let Some(proxy) = proxy_url {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    builder
        .build()
        .map_err(|e| SeoError::Fetch { url: String::new(), reason: format!("bad browser config: {e}") })
}

/// Fetches rendered HTML with a fresh headless browser per call: launch,
/// navigate, wait, capture, close. One browser per URL keeps proxy selection
/// simple at the cost of launch overhead, acceptable given the default
/// per-worker fetch cadence of one fetch every 2s.
pub struct ChromiumFetcher {
    chrome_exe: String,
    wait_ms: u32,
    viewport: (u32, u32),
}

impl ChromiumFetcher {
    pub fn new(wait_ms: u32, viewport: (u32, u32)) -> Result<Self> {
        let chrome_exe = crate::core::config::chrome_executable_override()
            .or_else(find_chrome_executable)
            .ok_or_else(|| SeoError::Config("no Chromium-family browser found; set CHROME_EXECUTABLE".to_string()))?;
        Ok(Self { chrome_exe, wait_ms, viewport })
    }
}

#[async_trait]
impl Fetcher for ChromiumFetcher {
    async fn fetch(&self, url: &str, proxy: Option<&str>) -> Result<FetchedPage> {
        let user_agent = antibot::random_user_agent();
        let config = build_headless_config(&self.chrome_exe, proxy, user_agent, self.viewport.0, self.viewport.1)
            .map_err(|_| SeoError::Fetch { url: url.to_string(), reason: "bad browser config".to_string() })?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SeoError::Fetch { url: url.to_string(), reason: format!("launch failed: {e}") })?;

        let _handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("CDP handler error: {e}");
                }
            }
        });

        let result = async {
            let page = browser
                .new_page(url)
                .await
                .map_err(|e| SeoError::Fetch { url: url.to_string(), reason: format!("navigation failed: {e}") })?;

            tokio::time::sleep(Duration::from_millis(self.wait_ms as u64)).await;

            let html = page
                .content()
                .await
                .map_err(|e| SeoError::Fetch { url: url.to_string(), reason: format!("content read failed: {e}") })?;

            let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());

            Ok(FetchedPage { final_url, html })
        }
        .await;

        if let Err(e) = browser.close().await {
            warn!("browser close error (non-fatal): {e}");
        }

        result
    }
}

/// Fixed-response test double used by orchestrator and component tests so
/// they never launch a real browser.
pub struct StaticFetcher {
    pub pages: std::collections::HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new(pages: std::collections::HashMap<String, String>) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _proxy: Option<&str>) -> Result<FetchedPage> {
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage { final_url: url.to_string(), html: html.clone() }),
            None => Err(SeoError::Fetch { url: url.to_string(), reason: "no static page registered".to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_fetcher_returns_registered_page() {
        let mut pages = std::collections::HashMap::new();
        pages.insert("https://a.test".to_string(), "<html>hi</html>".to_string());
        let fetcher = StaticFetcher::new(pages);
        let page = fetcher.fetch("https://a.test", None).await.unwrap();
        assert_eq!(page.html, "<html>hi</html>");
    }

    #[tokio::test]
    async fn static_fetcher_errors_on_unknown_url() {
        let fetcher = StaticFetcher::new(std::collections::HashMap::new());
        let err = fetcher.fetch("https://missing.test", None).await.unwrap_err();
        assert_eq!(err.kind(), "FetchError");
    }
}
