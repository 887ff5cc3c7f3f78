//! Blocking HTTP session with identity emulation and success/failure feedback.
//!
//! Every request asks the [IdentityEmulator] for a fresh identity, merges headers and cookies in
//! increasing precedence (session defaults, configured base headers, emulator, per-call), routes
//! through the emulated proxy if any, then reports the outcome back to the emulator.

use crate::config::Settings;
use crate::fetch::emulator::{EmulatedRequest, IdentityEmulator, ProxyConfig};
use crate::fetch::error::FetchError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, COOKIE, USER_AGENT};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;
const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Statuses that count against the identity (and proxy) that produced them.
pub const FLAGGED_STATUS_CODES: [u16; 5] = [403, 407, 408, 425, 429];

/// True when a response status should be reported to the emulator as a failure.
pub fn is_flagged_status(status: u16) -> bool {
    FLAGGED_STATUS_CODES.contains(&status) || status >= 500
}

/// A fully merged request, ready for the wire.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub proxy: Option<ProxyConfig>,
    pub timeout: Duration,
}

/// Status and body of a completed request. Non-2xx statuses are still `Ok` at this level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Wire-level sender. The reqwest implementation is [ReqwestTransport].
pub trait Transport {
    fn send(&mut self, request: &OutgoingRequest) -> Result<RawResponse, FetchError>;
}

/// reqwest blocking transport. One client per proxy, created on first use.
#[derive(Debug)]
pub struct ReqwestTransport {
    direct: reqwest::blocking::Client,
    proxied: HashMap<String, reqwest::blocking::Client>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            direct: Self::client_builder(timeout)
                .build()
                .map_err(|e| FetchError::Client { source: e })?,
            proxied: HashMap::new(),
            timeout,
        })
    }

    fn client_builder(timeout: Duration) -> reqwest::blocking::ClientBuilder {
        reqwest::blocking::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
    }

    fn client_for(
        &mut self,
        proxy: Option<&ProxyConfig>,
    ) -> Result<&reqwest::blocking::Client, FetchError> {
        let Some(proxy) = proxy else {
            return Ok(&self.direct);
        };
        let client = match self.proxied.entry(proxy.url.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let routed =
                    reqwest::Proxy::all(&proxy.url).map_err(|e| FetchError::InvalidProxy {
                        url: proxy.url.clone(),
                        source: e,
                    })?;
                let client = Self::client_builder(self.timeout)
                    .proxy(routed)
                    .build()
                    .map_err(|e| FetchError::Client { source: e })?;
                entry.insert(client)
            }
        };
        Ok(client)
    }
}

impl Transport for ReqwestTransport {
    fn send(&mut self, request: &OutgoingRequest) -> Result<RawResponse, FetchError> {
        let client = self.client_for(request.proxy.as_ref())?;
        let response = client
            .get(&request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .map_err(|e| FetchError::Network {
                url: request.url.clone(),
                source: Box::new(e),
            })?;
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| FetchError::BodyRead {
            url: request.url.clone(),
            source: e,
        })?;
        Ok(RawResponse { status, body })
    }
}

/// HTTP session: base headers and seeded cookies plus an identity emulator in front of a transport.
pub struct Session<T: Transport = ReqwestTransport> {
    transport: T,
    emulator: Box<dyn IdentityEmulator>,
    default_headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    timeout: Duration,
}

impl Session<ReqwestTransport> {
    /// Session over reqwest, configured from settings.
    pub fn from_settings(
        settings: &Settings,
        emulator: Box<dyn IdentityEmulator>,
    ) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(settings.request_timeout)?;
        Self::with_transport(transport, emulator, settings)
    }
}

impl<T: Transport> Session<T> {
    pub fn with_transport(
        transport: T,
        emulator: Box<dyn IdentityEmulator>,
        settings: &Settings,
    ) -> Result<Self, FetchError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
        for (name, value) in &settings.base_headers {
            insert_header(&mut default_headers, name, value)?;
        }
        if !default_headers.contains_key(USER_AGENT) && !settings.user_agent_seed.is_empty() {
            insert_header(&mut default_headers, "User-Agent", &settings.user_agent_seed)?;
        }
        Ok(Self {
            transport,
            emulator,
            default_headers,
            cookies: settings.cookies.clone(),
            timeout: settings.request_timeout,
        })
    }

    /// GET with no per-call headers or cookies.
    pub fn get(&mut self, url: &str) -> Result<RawResponse, FetchError> {
        self.get_with(url, &[], &[])
    }

    /// GET with explicit per-call headers and cookies, which take precedence over everything else.
    pub fn get_with(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        cookies: &[(&str, &str)],
    ) -> Result<RawResponse, FetchError> {
        let emulated = self.emulator.next_request();
        let request = match self.prepare(url, &emulated, headers, cookies) {
            Ok(request) => request,
            Err(e) => {
                self.report(&emulated, false);
                return Err(e);
            }
        };

        match self.transport.send(&request) {
            Ok(response) => {
                if is_flagged_status(response.status) {
                    log::debug!(
                        "HTTP {} from {} flagged against profile {:?}",
                        response.status,
                        url,
                        emulated.profile_id
                    );
                    self.report(&emulated, false);
                } else {
                    self.report(&emulated, true);
                }
                Ok(response)
            }
            Err(e) => {
                self.report(&emulated, false);
                Err(e)
            }
        }
    }

    fn prepare(
        &self,
        url: &str,
        emulated: &EmulatedRequest,
        headers: &[(&str, &str)],
        cookies: &[(&str, &str)],
    ) -> Result<OutgoingRequest, FetchError> {
        let mut merged = self.default_headers.clone();
        for (name, value) in &emulated.headers {
            insert_header(&mut merged, name, value)?;
        }
        for (name, value) in headers {
            insert_header(&mut merged, name, value)?;
        }

        let mut jar = self.cookies.clone();
        jar.extend(emulated.cookies.iter().cloned());
        jar.extend(cookies.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        if !jar.is_empty() {
            let cookie = jar
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");
            insert_header(&mut merged, COOKIE.as_str(), &cookie)?;
        }

        Ok(OutgoingRequest {
            url: url.to_string(),
            headers: merged,
            proxy: emulated.proxy.clone(),
            timeout: self.timeout,
        })
    }

    fn report(&mut self, emulated: &EmulatedRequest, success: bool) {
        if let Some(ref id) = emulated.profile_id {
            if success {
                self.emulator.record_success(id);
            } else {
                self.emulator.record_failure(id);
            }
        }
        if let Some(ref proxy) = emulated.proxy {
            if let Some(sink) = self.emulator.proxy_health() {
                if success {
                    sink.mark_success(proxy);
                } else {
                    sink.mark_failure(proxy);
                }
            }
        }
    }
}

fn insert_header(map: &mut HeaderMap, name: &str, value: &str) -> Result<(), FetchError> {
    let invalid = || FetchError::InvalidHeader {
        name: name.to_string(),
    };
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| invalid())?;
    let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
    map.insert(name, value);
    Ok(())
}
