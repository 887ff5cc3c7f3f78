//! Identity emulation: the per-request header/cookie/proxy identity and the feedback loop that
//! steers future picks away from blocked profiles and proxies.
//!
//! [IdentityEmulator] is the seam the session depends on. [ProfileRotator] is the built-in
//! implementation: a handful of desktop browser header profiles ranked by how they have fared
//! during this process. Nothing is persisted between runs.

use std::collections::BTreeMap;

/// Proxy an emulated request should be routed through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyConfig {
    pub url: String,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// One emulated identity, produced fresh for every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmulatedRequest {
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub proxy: Option<ProxyConfig>,
    /// Opaque id handed back through `record_success` / `record_failure`.
    pub profile_id: Option<String>,
}

/// Health feedback for proxies.
pub trait ProxyHealth {
    fn mark_success(&mut self, proxy: &ProxyConfig);
    fn mark_failure(&mut self, proxy: &ProxyConfig);
}

/// Source of emulated identities plus the feedback hooks the session reports into.
pub trait IdentityEmulator {
    fn next_request(&mut self) -> EmulatedRequest;
    fn record_success(&mut self, profile_id: &str);
    fn record_failure(&mut self, profile_id: &str);

    /// Attached proxy-health sink, if this emulator hands out proxies.
    fn proxy_health(&mut self) -> Option<&mut dyn ProxyHealth> {
        None
    }
}

const CHROME_MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";
const CHROME_WIN_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36";
const FIREFOX_WIN_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:141.0) Gecko/20100101 Firefox/141.0";
const SAFARI_MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15";

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// A named set of headers mimicking one real browser.
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub id: String,
    pub headers: Vec<(String, String)>,
}

impl HeaderProfile {
    fn new(id: &str, headers: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Built-in desktop browser profiles.
pub fn default_profiles() -> Vec<HeaderProfile> {
    vec![
        HeaderProfile::new(
            "chrome-mac",
            &[
                ("User-Agent", CHROME_MAC_UA),
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("Upgrade-Insecure-Requests", "1"),
                ("Sec-Ch-Ua", "\"Chromium\";v=\"139\", \"Not;A=Brand\";v=\"99\""),
                ("Sec-Ch-Ua-Mobile", "?0"),
                ("Sec-Ch-Ua-Platform", "\"macOS\""),
                ("Sec-Fetch-Dest", "document"),
                ("Sec-Fetch-Mode", "navigate"),
                ("Sec-Fetch-Site", "none"),
                ("Sec-Fetch-User", "?1"),
            ],
        ),
        HeaderProfile::new(
            "chrome-windows",
            &[
                ("User-Agent", CHROME_WIN_UA),
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", "en-US,en;q=0.9"),
                ("Upgrade-Insecure-Requests", "1"),
                ("Sec-Ch-Ua", "\"Chromium\";v=\"139\", \"Not;A=Brand\";v=\"99\""),
                ("Sec-Ch-Ua-Mobile", "?0"),
                ("Sec-Ch-Ua-Platform", "\"Windows\""),
                ("Sec-Fetch-Dest", "document"),
                ("Sec-Fetch-Mode", "navigate"),
                ("Sec-Fetch-Site", "none"),
                ("Sec-Fetch-User", "?1"),
            ],
        ),
        HeaderProfile::new(
            "firefox-windows",
            &[
                ("User-Agent", FIREFOX_WIN_UA),
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", "en-US,en;q=0.5"),
                ("Upgrade-Insecure-Requests", "1"),
                ("Sec-Fetch-Dest", "document"),
                ("Sec-Fetch-Mode", "navigate"),
                ("Sec-Fetch-Site", "none"),
                ("Sec-Fetch-User", "?1"),
            ],
        ),
        HeaderProfile::new(
            "safari-mac",
            &[
                ("User-Agent", SAFARI_MAC_UA),
                ("Accept", HTML_ACCEPT),
                ("Accept-Language", "en-US,en;q=0.9"),
            ],
        ),
    ]
}

#[derive(Debug, Clone, Copy, Default)]
struct Outcomes {
    successes: u32,
    failures: u32,
    last_used: u64,
}

impl Outcomes {
    /// Failures weigh more than successes so one block outweighs a run of good luck.
    fn score(&self) -> i64 {
        i64::from(self.successes) - 3 * i64::from(self.failures)
    }
}

/// Round-robin proxy list that skips proxies with repeated consecutive failures.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<ProxyConfig>,
    consecutive_failures: BTreeMap<String, u32>,
    cursor: usize,
}

/// Consecutive failures after which a proxy is benched (while a healthier one exists).
const PROXY_FAILURE_LIMIT: u32 = 3;

impl ProxyPool {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            proxies: urls.into_iter().map(ProxyConfig::new).collect(),
            consecutive_failures: BTreeMap::new(),
            cursor: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    fn failures(&self, proxy: &ProxyConfig) -> u32 {
        self.consecutive_failures
            .get(&proxy.url)
            .copied()
            .unwrap_or(0)
    }

    /// Next proxy in rotation, preferring ones under the failure limit.
    pub fn next_proxy(&mut self) -> Option<ProxyConfig> {
        let n = self.proxies.len();
        if n == 0 {
            return None;
        }
        let start = self.cursor;
        let pick = (0..n)
            .map(|offset| (start + offset) % n)
            .find(|&i| self.failures(&self.proxies[i]) < PROXY_FAILURE_LIMIT)
            .unwrap_or(start % n);
        self.cursor = (pick + 1) % n;
        Some(self.proxies[pick].clone())
    }
}

impl ProxyHealth for ProxyPool {
    fn mark_success(&mut self, proxy: &ProxyConfig) {
        self.consecutive_failures.insert(proxy.url.clone(), 0);
    }

    fn mark_failure(&mut self, proxy: &ProxyConfig) {
        *self
            .consecutive_failures
            .entry(proxy.url.clone())
            .or_insert(0) += 1;
    }
}

/// In-process identity emulator: picks the best-scoring header profile (least recently used on
/// ties) and, when proxies are configured, the next healthy proxy.
#[derive(Debug, Clone)]
pub struct ProfileRotator {
    profiles: Vec<HeaderProfile>,
    outcomes: Vec<Outcomes>,
    proxies: ProxyPool,
    tick: u64,
}

impl Default for ProfileRotator {
    fn default() -> Self {
        Self::new(default_profiles(), ProxyPool::default())
    }
}

impl ProfileRotator {
    pub fn new(profiles: Vec<HeaderProfile>, proxies: ProxyPool) -> Self {
        let outcomes = vec![Outcomes::default(); profiles.len()];
        Self {
            profiles,
            outcomes,
            proxies,
            tick: 0,
        }
    }

    /// Default profiles with the given proxy URLs.
    pub fn with_proxies(urls: &[String]) -> Self {
        Self::new(default_profiles(), ProxyPool::new(urls.iter().cloned()))
    }

    fn index_of(&self, profile_id: &str) -> Option<usize> {
        self.profiles.iter().position(|p| p.id == profile_id)
    }

    fn pick(&self) -> Option<usize> {
        (0..self.profiles.len()).max_by(|&a, &b| {
            let (oa, ob) = (&self.outcomes[a], &self.outcomes[b]);
            oa.score()
                .cmp(&ob.score())
                .then(ob.last_used.cmp(&oa.last_used))
        })
    }
}

impl IdentityEmulator for ProfileRotator {
    fn next_request(&mut self) -> EmulatedRequest {
        let proxy = self.proxies.next_proxy();
        let Some(index) = self.pick() else {
            return EmulatedRequest {
                proxy,
                ..EmulatedRequest::default()
            };
        };
        self.tick += 1;
        self.outcomes[index].last_used = self.tick;
        let profile = &self.profiles[index];
        EmulatedRequest {
            headers: profile.headers.clone(),
            cookies: Vec::new(),
            proxy,
            profile_id: Some(profile.id.clone()),
        }
    }

    fn record_success(&mut self, profile_id: &str) {
        if let Some(i) = self.index_of(profile_id) {
            self.outcomes[i].successes += 1;
        }
    }

    fn record_failure(&mut self, profile_id: &str) {
        if let Some(i) = self.index_of(profile_id) {
            self.outcomes[i].failures += 1;
        }
    }

    fn proxy_health(&mut self) -> Option<&mut dyn ProxyHealth> {
        if self.proxies.is_empty() {
            None
        } else {
            Some(&mut self.proxies)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotator_cycles_profiles_when_untested() {
        let mut rotator = ProfileRotator::default();
        let ids: Vec<_> = (0..4)
            .filter_map(|_| rotator.next_request().profile_id)
            .collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4, "each profile used once: {:?}", ids);
    }

    #[test]
    fn rotator_avoids_failed_profile() {
        let mut rotator = ProfileRotator::default();
        let first = rotator.next_request().profile_id.unwrap();
        rotator.record_failure(&first);
        for _ in 0..8 {
            let req = rotator.next_request();
            let id = req.profile_id.unwrap();
            assert_ne!(id, first);
            rotator.record_success(&id);
        }
    }

    #[test]
    fn rotator_without_proxies_has_no_health_sink() {
        let mut rotator = ProfileRotator::default();
        assert!(rotator.next_request().proxy.is_none());
        assert!(rotator.proxy_health().is_none());
    }

    #[test]
    fn proxy_pool_benches_failing_proxy() {
        let mut pool = ProxyPool::new(["http://a:1", "http://b:1"]);
        let a = ProxyConfig::new("http://a:1");
        for _ in 0..PROXY_FAILURE_LIMIT {
            pool.mark_failure(&a);
        }
        for _ in 0..4 {
            assert_eq!(pool.next_proxy().unwrap().url, "http://b:1");
        }
        pool.mark_success(&a);
        let picks: Vec<_> = (0..2).map(|_| pool.next_proxy().unwrap().url).collect();
        assert!(picks.contains(&"http://a:1".to_string()));
    }

    #[test]
    fn proxy_pool_falls_back_when_all_fail() {
        let mut pool = ProxyPool::new(["http://only:1"]);
        let only = ProxyConfig::new("http://only:1");
        for _ in 0..5 {
            pool.mark_failure(&only);
        }
        assert_eq!(pool.next_proxy(), Some(only));
    }

    #[test]
    fn rotator_hands_out_proxies_and_sink() {
        let mut rotator = ProfileRotator::with_proxies(&["http://p:8080".to_string()]);
        let req = rotator.next_request();
        assert_eq!(req.proxy, Some(ProxyConfig::new("http://p:8080")));
        assert!(rotator.proxy_health().is_some());
    }
}
