//! Fetch layer: resolve a URL to HTML. Plain HTTP through an identity-emulating session first;
//! a 403 (the origin's bot challenge) escalates once to full browser rendering.

mod browser;
mod client;
pub mod cookies;
mod emulator;
mod error;

pub use browser::{
    default_profile_dir, BrowserRenderer, ChromeRenderer, RenderOptions, BROWSER_USER_AGENT,
};
pub use client::{
    is_flagged_status, OutgoingRequest, RawResponse, ReqwestTransport, Session, Transport,
    FLAGGED_STATUS_CODES,
};
pub use emulator::{
    default_profiles, EmulatedRequest, HeaderProfile, IdentityEmulator, ProfileRotator,
    ProxyConfig, ProxyHealth, ProxyPool,
};
pub use error::{FetchError, TransportCause};

use crate::config::Settings;

const FORBIDDEN: u16 = 403;

/// HTML plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedPage {
    /// Body of a successful HTTP response.
    Direct(String),
    /// DOM captured from the browser fallback after a 403.
    Rendered(String),
}

impl FetchedPage {
    pub fn html(&self) -> &str {
        match self {
            FetchedPage::Direct(html) | FetchedPage::Rendered(html) => html,
        }
    }

    pub fn into_html(self) -> String {
        match self {
            FetchedPage::Direct(html) | FetchedPage::Rendered(html) => html,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, FetchedPage::Rendered(_))
    }
}

/// The one capability scrapers depend on.
pub trait HtmlFetcher {
    fn fetch_html(&mut self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Session first, browser on 403. Transport errors and other HTTP errors are returned as-is.
pub struct FallbackFetcher<T: Transport = ReqwestTransport, B: BrowserRenderer = ChromeRenderer> {
    session: Session<T>,
    browser: B,
    render: RenderOptions,
}

impl FallbackFetcher {
    /// Production fetcher: reqwest session with the built-in profile rotator, Chrome fallback.
    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        let emulator = ProfileRotator::with_proxies(&settings.proxies);
        let session = Session::from_settings(settings, Box::new(emulator))?;
        let browser = ChromeRenderer::new(settings.browser_bin.clone());
        Ok(Self::new(session, browser, RenderOptions::from_settings(settings)))
    }
}

impl<T: Transport, B: BrowserRenderer> FallbackFetcher<T, B> {
    pub fn new(session: Session<T>, browser: B, render: RenderOptions) -> Self {
        Self {
            session,
            browser,
            render,
        }
    }
}

impl<T: Transport, B: BrowserRenderer> HtmlFetcher for FallbackFetcher<T, B> {
    fn fetch_html(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.session.get(url)?;
        if response.status == FORBIDDEN {
            log::warn!("HTTP 403 from {}; falling back to browser rendering", url);
            let html = self.browser.render(url, &self.render)?;
            return Ok(FetchedPage::Rendered(html));
        }
        if response.status >= 400 {
            return Err(FetchError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(FetchedPage::Direct(response.body))
    }
}

#[cfg(test)]
mod tests {
    use super::client::tests::{ok_response, DummyEmulator, ScriptedTransport};
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::Duration;

    struct StubBrowser {
        calls: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl BrowserRenderer for StubBrowser {
        fn render(&mut self, url: &str, _options: &RenderOptions) -> Result<String, FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            if self.fail {
                Err(FetchError::BrowserFailed {
                    url: url.to_string(),
                    reason: "automation error".to_string(),
                })
            } else {
                Ok("<html>rendered</html>".to_string())
            }
        }
    }

    fn fetcher(
        outcome: fn(&OutgoingRequest) -> Result<RawResponse, FetchError>,
        fail_browser: bool,
    ) -> (
        FallbackFetcher<ScriptedTransport, StubBrowser>,
        Rc<RefCell<Vec<String>>>,
    ) {
        let (emulator, _) = DummyEmulator::new(None);
        let (transport, _) = ScriptedTransport::new(outcome);
        let session =
            Session::with_transport(transport, Box::new(emulator), &Settings::default()).unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let browser = StubBrowser {
            calls: calls.clone(),
            fail: fail_browser,
        };
        let render = RenderOptions {
            timeout: Duration::from_secs(45),
            headed: false,
            profile_dir: PathBuf::from("unused"),
        };
        (FallbackFetcher::new(session, browser, render), calls)
    }

    fn forbidden(_: &OutgoingRequest) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 403,
            body: "<html>challenge</html>".to_string(),
        })
    }

    fn not_found(_: &OutgoingRequest) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 404,
            body: String::new(),
        })
    }

    fn unavailable(_: &OutgoingRequest) -> Result<RawResponse, FetchError> {
        Ok(RawResponse {
            status: 503,
            body: String::new(),
        })
    }

    #[test]
    fn forbidden_escalates_to_browser_once() {
        let (mut fetcher, calls) = fetcher(forbidden, false);
        let page = fetcher.fetch_html("https://example.com/x").unwrap();
        assert_eq!(page, FetchedPage::Rendered("<html>rendered</html>".to_string()));
        assert_eq!(*calls.borrow(), vec!["https://example.com/x".to_string()]);
    }

    #[test]
    fn success_is_direct_without_browser() {
        let (mut fetcher, calls) = fetcher(ok_response, false);
        let page = fetcher.fetch_html("https://example.com/x").unwrap();
        assert!(!page.is_rendered());
        assert_eq!(page.into_html(), "<html></html>");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn other_http_errors_propagate_without_escalation() {
        let outcomes: [fn(&OutgoingRequest) -> Result<RawResponse, FetchError>; 2] =
            [not_found, unavailable];
        for outcome in outcomes {
            let (mut fetcher, calls) = fetcher(outcome, false);
            let err = fetcher.fetch_html("https://example.com/x").unwrap_err();
            assert!(matches!(err, FetchError::HttpStatus { .. }));
            assert!(calls.borrow().is_empty());
        }
    }

    #[test]
    fn browser_failure_after_forbidden_is_fatal() {
        let (mut fetcher, calls) = fetcher(forbidden, true);
        let err = fetcher.fetch_html("https://example.com/x").unwrap_err();
        assert!(matches!(err, FetchError::BrowserFailed { .. }));
        assert_eq!(calls.borrow().len(), 1);
    }
}
