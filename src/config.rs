//! Runtime settings. Built once per run and passed down explicitly.
//!
//! Layering, lowest precedence first: built-in defaults, the optional config file
//! (./pfrscrape.toml, then $XDG_CONFIG_HOME/pfrscrape/config.toml or ~/.config/pfrscrape/config.toml),
//! `PFR_*` environment variables, then CLI flags.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATA_ROOT: &str = "data";
pub const DEFAULT_USER_AGENT_SEED: &str = "pfr-scraper";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BROWSER_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_COOKIE_FILE: &str = "configs/cf_cookies.json";

const ENV_HEADER_PREFIX: &str = "PFR_HEADER_";
const ENV_COOKIE_PREFIX: &str = "PFR_COOKIE_";
const ENV_BROWSER_PROFILE_DIR: &str = "PFR_BROWSER_PROFILE_DIR";
const ENV_BROWSER_BIN: &str = "PFR_BROWSER_BIN";
const ENV_DATA_ROOT: &str = "PFR_DATA_ROOT";

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Root for `raw/` snapshots and `processed/` CSV output. Relative to CWD.
    pub data_root: Option<PathBuf>,
    /// User-Agent used when neither base headers nor the emulator provide one.
    pub user_agent_seed: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: Option<u64>,
    /// Browser page-load timeout in seconds.
    pub browser_timeout_secs: Option<u64>,
    /// Fixed delay in seconds between page fetches within one run.
    pub delay_secs: Option<f64>,
    /// Headers sent with every request.
    pub headers: Option<BTreeMap<String, String>>,
    /// Cookies sent with every request.
    pub cookies: Option<BTreeMap<String, String>>,
    /// Persistent profile directory for the browser fallback.
    pub browser_profile_dir: Option<PathBuf>,
    /// Chrome/Chromium executable for the browser fallback.
    pub browser_bin: Option<PathBuf>,
    /// Run the browser fallback with a visible window.
    pub headed: Option<bool>,
    /// Harvested cookie file (JSON).
    pub cookie_file: Option<PathBuf>,
    /// Proxy URLs handed out by the built-in identity rotator.
    pub proxies: Option<Vec<String>>,
}

/// Resolved settings for one scrape run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_root: PathBuf,
    pub user_agent_seed: String,
    pub request_timeout: Duration,
    pub browser_timeout: Duration,
    /// `None` means each scraper uses its own default delay.
    pub delay: Option<Duration>,
    pub base_headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub browser_profile_dir: Option<PathBuf>,
    pub browser_bin: Option<PathBuf>,
    pub headed: bool,
    pub cookie_file: PathBuf,
    pub proxies: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            user_agent_seed: DEFAULT_USER_AGENT_SEED.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            browser_timeout: Duration::from_secs(DEFAULT_BROWSER_TIMEOUT_SECS),
            delay: None,
            base_headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            browser_profile_dir: None,
            browser_bin: None,
            headed: false,
            cookie_file: PathBuf::from(DEFAULT_COOKIE_FILE),
            proxies: Vec::new(),
        }
    }
}

impl Settings {
    /// Directory holding the CSV outputs.
    pub fn processed_dir(&self) -> PathBuf {
        self.data_root.join("processed")
    }

    /// Directory holding raw HTML snapshots.
    pub fn raw_dir(&self) -> PathBuf {
        self.data_root.join("raw")
    }

    /// Layer config file values over the current settings.
    pub fn apply_config(&mut self, config: &Config) -> Result<(), String> {
        if let Some(ref root) = config.data_root {
            self.data_root = root.clone();
        }
        if let Some(ref seed) = config.user_agent_seed {
            self.user_agent_seed = seed.clone();
        }
        if let Some(secs) = config.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.browser_timeout_secs {
            self.browser_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.delay_secs {
            self.delay = Some(parse_delay(secs)?);
        }
        if let Some(ref headers) = config.headers {
            self.base_headers.extend(headers.clone());
        }
        if let Some(ref cookies) = config.cookies {
            self.cookies.extend(cookies.clone());
        }
        if let Some(ref dir) = config.browser_profile_dir {
            self.browser_profile_dir = Some(dir.clone());
        }
        if let Some(ref bin) = config.browser_bin {
            self.browser_bin = Some(bin.clone());
        }
        if let Some(headed) = config.headed {
            self.headed = headed;
        }
        if let Some(ref path) = config.cookie_file {
            self.cookie_file = path.clone();
        }
        if let Some(ref proxies) = config.proxies {
            self.proxies = proxies.clone();
        }
        Ok(())
    }

    /// Layer `PFR_*` variables over the current settings.
    ///
    /// `PFR_HEADER_<NAME>` and `PFR_COOKIE_<NAME>` add a header or cookie; a double underscore in
    /// `<NAME>` becomes a hyphen, so `PFR_HEADER_Accept__Language` sets `Accept-Language`.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(suffix) = key.strip_prefix(ENV_HEADER_PREFIX) {
                if let Some(name) = env_suffix_to_name(suffix) {
                    self.base_headers.insert(name, value);
                }
            } else if let Some(suffix) = key.strip_prefix(ENV_COOKIE_PREFIX) {
                if let Some(name) = env_suffix_to_name(suffix) {
                    self.cookies.insert(name, value);
                }
            } else if key == ENV_BROWSER_PROFILE_DIR && !value.is_empty() {
                self.browser_profile_dir = Some(PathBuf::from(value));
            } else if key == ENV_BROWSER_BIN && !value.is_empty() {
                self.browser_bin = Some(PathBuf::from(value));
            } else if key == ENV_DATA_ROOT && !value.is_empty() {
                self.data_root = PathBuf::from(value);
            }
        }
    }

    /// Defaults, then the config file (if any), then the process environment.
    pub fn load() -> Result<Self, String> {
        let mut settings = Settings::default();
        if let Some(config) = load_config()? {
            settings.apply_config(&config)?;
        }
        settings.apply_env(std::env::vars());
        Ok(settings)
    }
}

/// Convert a delay in (possibly fractional) seconds, rejecting negative and non-finite values.
pub fn parse_delay(secs: f64) -> Result<Duration, String> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| format!("Invalid delay: {} (must be a non-negative number of seconds)", secs))
}

fn env_suffix_to_name(suffix: &str) -> Option<String> {
    let name = suffix.replace("__", "-");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Search order: (1) ./pfrscrape.toml, (2) $XDG_CONFIG_HOME/pfrscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("pfrscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("pfrscrape").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_from(path).map(Some);
        }
    }
    Ok(None)
}

/// Read and parse one config file.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}
