//! Browser fallback: render a page in a real Chrome/Chromium and return the resulting DOM.
//!
//! Used only when the origin answers 403 to the plain HTTP request. Chrome is driven over the
//! DevTools protocol against a persistent profile directory so challenge cookies survive between
//! pages and runs; one profile directory must not be shared by concurrent invocations. In headed
//! mode the window is visible and a person can clear a challenge by hand before the DOM is read.

use crate::config::Settings;
use crate::fetch::error::FetchError;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Fixed desktop user agent presented by the browser fallback.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";

/// Time allowed after load for client-side challenges to settle.
pub const SETTLE_MILLIS: u64 = 3_000;

const BINARY_CANDIDATES: [&str; 4] = [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

const CHROME_ARGS: [&str; 5] = [
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--lang=en-US",
];

/// Per-render options.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub timeout: Duration,
    pub headed: bool,
    pub profile_dir: PathBuf,
}

impl RenderOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.browser_timeout,
            headed: settings.headed,
            profile_dir: settings
                .browser_profile_dir
                .clone()
                .unwrap_or_else(default_profile_dir),
        }
    }
}

/// `<cache_dir>/pfrscrape/browser-profile`, or a dot-directory in CWD if there is no cache dir.
pub fn default_profile_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("pfrscrape").join("browser-profile"))
        .unwrap_or_else(|| PathBuf::from(".pfrscrape-browser-profile"))
}

/// Renders a URL in a full browser and returns the page HTML.
pub trait BrowserRenderer {
    fn render(&mut self, url: &str, options: &RenderOptions) -> Result<String, FetchError>;
}

/// Chrome/Chromium driven over the DevTools protocol, headless unless `headed` is set.
#[derive(Debug, Clone, Default)]
pub struct ChromeRenderer {
    binary: Option<PathBuf>,
}

impl ChromeRenderer {
    /// `binary` overrides PATH lookup.
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    /// Locate the browser executable. Checked at first render, not at construction.
    pub fn resolve_binary(&self) -> Result<PathBuf, FetchError> {
        if let Some(ref bin) = self.binary {
            if bin.is_file() {
                return Ok(bin.clone());
            }
            if let Some(found) = find_on_path(bin) {
                return Ok(found);
            }
            return Err(FetchError::BrowserUnavailable {
                reason: format!("configured browser {} not found", bin.display()),
            });
        }
        BINARY_CANDIDATES
            .iter()
            .find_map(|name| find_on_path(Path::new(name)))
            .ok_or_else(|| FetchError::BrowserUnavailable {
                reason: format!(
                    "no Chrome/Chromium executable found (tried {}). Install Chrome or set PFR_BROWSER_BIN.",
                    BINARY_CANDIDATES.join(", ")
                ),
            })
    }

    /// Launch settings for one render. The browser outlives navigation by the settle time.
    pub fn launch_options(
        binary: PathBuf,
        options: &RenderOptions,
    ) -> Result<LaunchOptions<'static>, FetchError> {
        LaunchOptions::default_builder()
            .headless(!options.headed)
            .sandbox(false)
            .path(Some(binary))
            .user_data_dir(Some(options.profile_dir.clone()))
            .idle_browser_timeout(options.timeout + Duration::from_millis(SETTLE_MILLIS))
            .args(CHROME_ARGS.iter().map(|arg| OsStr::new(*arg)).collect())
            .build()
            .map_err(|e| FetchError::BrowserUnavailable {
                reason: format!("invalid browser launch options: {}", e),
            })
    }
}

impl BrowserRenderer for ChromeRenderer {
    fn render(&mut self, url: &str, options: &RenderOptions) -> Result<String, FetchError> {
        let binary = self.resolve_binary()?;
        std::fs::create_dir_all(&options.profile_dir).map_err(|e| FetchError::BrowserProfile {
            path: options.profile_dir.clone(),
            source: e,
        })?;

        log::info!(
            "Rendering {} with {}{}",
            url,
            binary.display(),
            if options.headed { " (headed)" } else { "" }
        );
        let launch = Self::launch_options(binary.clone(), options)?;
        let browser = Browser::new(launch).map_err(|e| FetchError::BrowserUnavailable {
            reason: format!("could not launch {}: {}", binary.display(), e),
        })?;

        let started = Instant::now();
        let failed = |e: &dyn std::fmt::Display| {
            if started.elapsed() >= options.timeout {
                FetchError::BrowserTimeout {
                    url: url.to_string(),
                    secs: options.timeout.as_secs(),
                }
            } else {
                FetchError::BrowserFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let tab = browser.new_tab().map_err(|e| failed(&e))?;
        let html = load(&tab, url, options.timeout).map_err(|e| failed(&e))?;
        if html.trim().is_empty() {
            return Err(FetchError::BrowserFailed {
                url: url.to_string(),
                reason: "browser returned an empty document".to_string(),
            });
        }
        Ok(html)
    }
}

/// Navigate, wait for the page and its network to settle, then read the DOM.
fn load(tab: &Tab, url: &str, timeout: Duration) -> Result<String, anyhow::Error> {
    tab.set_default_timeout(timeout);
    tab.set_user_agent(BROWSER_USER_AGENT, Some("en-US"), None)?;
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    std::thread::sleep(Duration::from_millis(SETTLE_MILLIS));
    tab.get_content()
}

fn find_on_path(name: &Path) -> Option<PathBuf> {
    if name.components().count() > 1 {
        return name.is_file().then(|| name.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
