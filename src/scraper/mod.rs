//! Scrapers for pro-football-reference.com: shared HTML helpers and the fetch -> parse -> persist
//! contract each domain scraper runs through.

mod error;

pub mod active_players;
pub mod team_depth_chart;
pub mod team_game_logs;
pub mod team_rosters;

pub use active_players::{normalize_letters, parse_active_players, ActivePlayersScraper};
pub use error::ScraperError;
pub use team_depth_chart::{parse_depth_charts, TeamDepthChartScraper};
pub use team_game_logs::{parse_game_logs, TeamGameLogScraper};
pub use team_rosters::{parse_rosters, TeamRosterScraper};

use crate::config::Settings;
use crate::fetch::HtmlFetcher;
use crate::output;
use reqwest::Url;
use scraper::{ElementRef, Selector};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL: &str = "https://www.pro-football-reference.com";

/// Franchise codes as the site spells them in team URLs.
pub const DEFAULT_TEAM_CODES: [&str; 32] = [
    "crd", "atl", "rav", "buf", "car", "chi", "cin", "cle", "dal", "den", "det", "gnb", "htx", "clt",
    "jax", "kan", "rai", "sdg", "ram", "mia", "min", "nwe", "nor", "nyg", "nyj", "phi", "pit", "sfo",
    "sea", "tam", "oti", "was",
];

/// `(key, html)` in request order. Keys are team codes or index letters.
pub type Pages = Vec<(String, String)>;

/// Pages retrieved by one fetch. Only these are written as raw snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeRun {
    pages: Pages,
    rendered: usize,
}

impl ScrapeRun {
    pub fn pages(&self) -> &[(String, String)] {
        &self.pages
    }

    /// How many pages came from the browser fallback.
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// One scrape domain. Implementors describe what to fetch, how to read it, and where it lands;
/// the provided methods run the shared state machine.
pub trait Scraper {
    type Record: Serialize;

    /// Short label for log lines.
    fn name(&self) -> &'static str;

    /// `(key, url)` pairs in request order.
    fn urls(&self) -> Vec<(String, String)>;

    /// Pure: identical pages always give identical records.
    fn parse(&self, pages: &[(String, String)]) -> Result<Vec<Self::Record>, ScraperError>;

    fn csv_path(&self, settings: &Settings) -> PathBuf;

    fn snapshot_dir(&self, settings: &Settings) -> PathBuf;

    /// Pause between requests when settings do not set one.
    fn default_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Fetch every URL in order. The first failure aborts the run.
    fn fetch(
        &self,
        fetcher: &mut dyn HtmlFetcher,
        settings: &Settings,
        progress: Option<&dyn Fn(u32, u32)>,
    ) -> Result<ScrapeRun, ScraperError> {
        let urls = self.urls();
        let total = urls.len() as u32;
        let delay = settings.delay.unwrap_or_else(|| self.default_delay());
        let mut run = ScrapeRun::default();
        for (index, (key, url)) in urls.into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                std::thread::sleep(delay);
            }
            log::info!("Fetching {} page for {}: {}", self.name(), key, url);
            let page = fetcher.fetch_html(&url)?;
            if page.is_rendered() {
                run.rendered += 1;
            }
            run.pages.push((key, page.into_html()));
            if let Some(cb) = progress {
                cb(index as u32 + 1, total);
            }
        }
        Ok(run)
    }

    /// Write the CSV (an empty file for zero records) and snapshots of the fetched pages.
    fn persist(
        &self,
        records: &[Self::Record],
        fetched: &ScrapeRun,
        settings: &Settings,
    ) -> Result<PathBuf, ScraperError> {
        let path = self.csv_path(settings);
        output::write_csv(&path, records)?;
        log::info!(
            "Wrote {} {} record(s) to {}",
            records.len(),
            self.name(),
            path.display()
        );
        if !fetched.is_empty() {
            let dir = self.snapshot_dir(settings);
            let written = output::write_snapshots(&dir, fetched.pages())?;
            log::debug!("Saved {} raw snapshot(s) under {}", written, dir.display());
        }
        Ok(path)
    }

    /// Fetch -> Parse -> Persist, once.
    fn run(
        &self,
        fetcher: &mut dyn HtmlFetcher,
        settings: &Settings,
        progress: Option<&dyn Fn(u32, u32)>,
    ) -> Result<Vec<Self::Record>, ScraperError> {
        let fetched = self.fetch(fetcher, settings, progress)?;
        if fetched.rendered() > 0 {
            log::info!(
                "{} of {} {} page(s) needed the browser",
                fetched.rendered(),
                fetched.pages().len(),
                self.name()
            );
        }
        let records = self.parse(fetched.pages())?;
        self.persist(&records, &fetched, settings)?;
        Ok(records)
    }
}

pub(crate) fn parse_selector(sel: &str) -> Result<Selector, ScraperError> {
    Selector::parse(sel).map_err(|e| ScraperError::Selector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// Absolute hrefs are kept; relative ones are joined to the site origin.
pub fn resolve_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(BASE_URL).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{}{}", BASE_URL, href),
    }
}

/// `/players/T/TestPl00.htm` -> `TestPl00`.
pub fn player_id_from_href(href: &str) -> Option<String> {
    let segment = href.trim_end_matches('/').rsplit('/').next()?;
    let id = segment.split('.').next()?;
    non_empty(id.to_string())
}

/// Text nodes trimmed and joined with `sep`, empty pieces dropped.
pub(crate) fn joined_text(el: ElementRef<'_>, sep: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Whitespace-joined cell text; `None` when blank.
pub fn cell_text(el: ElementRef<'_>) -> Option<String> {
    non_empty(joined_text(el, " "))
}

pub(crate) fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Repeated header and partial-table separator rows inside a table body.
pub fn is_header_row(row: ElementRef<'_>) -> bool {
    row.value()
        .classes()
        .any(|class| class == "thead" || class == "partial_table")
}

/// Body rows of a table: direct `tr` children of its first `tbody`, header rows skipped.
pub(crate) fn body_rows<'a>(table: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let Some(tbody) = table
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tbody")
    else {
        return Vec::new();
    };
    child_elements(tbody, "tr")
        .filter(|row| !is_header_row(*row))
        .collect()
}

pub(crate) fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// First `tag` element under `row` (or `row` itself) with the given `data-stat`.
pub(crate) fn find_stat<'a>(row: ElementRef<'a>, tag: &str, stat: &str) -> Option<ElementRef<'a>> {
    row.descendants().filter_map(ElementRef::wrap).find(|el| {
        el.value().name() == tag && el.value().attr("data-stat") == Some(stat)
    })
}

/// First anchor carrying a non-empty `href`, with that href.
pub(crate) fn first_link<'a>(el: ElementRef<'a>) -> Option<(ElementRef<'a>, &'a str)> {
    let anchor = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())?;
    let href = anchor.value().attr("href").filter(|h| !h.is_empty())?;
    Some((anchor, href))
}

/// `/teams/{team}/{season}...` URL under the site origin.
pub(crate) fn team_url(team: &str, season: u16, tail: &str) -> String {
    format!("{}/teams/{}/{}{}", BASE_URL, team, season, tail)
}

pub(crate) fn team_codes_or_default(teams: Vec<String>) -> Vec<String> {
    if teams.is_empty() {
        DEFAULT_TEAM_CODES.iter().map(|t| t.to_string()).collect()
    } else {
        teams
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchedPage};
    use scraper::Html;

    type Respond = Box<dyn Fn(&str) -> Result<FetchedPage, FetchError>>;

    /// Serves canned HTML and records requested URLs.
    pub(crate) struct StubFetcher {
        respond: Respond,
        pub calls: Vec<String>,
    }

    impl StubFetcher {
        pub(crate) fn new(respond: impl Fn(&str) -> Result<FetchedPage, FetchError> + 'static) -> Self {
            Self {
                respond: Box::new(respond),
                calls: Vec::new(),
            }
        }

        pub(crate) fn serving(html: &'static str) -> Self {
            Self::new(move |_| Ok(FetchedPage::Direct(html.to_string())))
        }
    }

    impl HtmlFetcher for StubFetcher {
        fn fetch_html(&mut self, url: &str) -> Result<FetchedPage, FetchError> {
            self.calls.push(url.to_string());
            (self.respond)(url)
        }
    }

    pub(crate) fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            data_root: dir.to_path_buf(),
            delay: Some(Duration::ZERO),
            ..Settings::default()
        }
    }

    #[test]
    fn resolve_url_relative_and_absolute() {
        assert_eq!(
            resolve_url("/players/A/TestPl00.htm"),
            "https://www.pro-football-reference.com/players/A/TestPl00.htm"
        );
        assert_eq!(
            resolve_url("https://example.com/a"),
            "https://example.com/a"
        );
    }

    #[test]
    fn player_id_strips_extension_and_trailing_slash() {
        assert_eq!(
            player_id_from_href("/players/T/TestPl00.htm").as_deref(),
            Some("TestPl00")
        );
        assert_eq!(
            player_id_from_href("/players/T/TestPl00/").as_deref(),
            Some("TestPl00")
        );
        assert_eq!(player_id_from_href(""), None);
    }

    #[test]
    fn cell_text_joins_and_blanks_to_none() -> Result<(), ScraperError> {
        let doc = Html::parse_fragment("<div id='a'> <b>Team</b> / 1st </div><div id='b'>  </div>");
        let a = doc.select(&parse_selector("#a")?).next().unwrap();
        let b = doc.select(&parse_selector("#b")?).next().unwrap();
        assert_eq!(cell_text(a).as_deref(), Some("Team / 1st"));
        assert_eq!(cell_text(b), None);
        Ok(())
    }

    #[test]
    fn header_rows_detected_by_class() -> Result<(), ScraperError> {
        let doc = Html::parse_document(
            "<table><tbody><tr class='thead'><td>x</td></tr><tr class='over partial_table'><td>y</td></tr><tr><td>z</td></tr></tbody></table>",
        );
        let table = doc.select(&parse_selector("table")?).next().unwrap();
        let rows = body_rows(table);
        assert_eq!(rows.len(), 1);
        assert_eq!(cell_text(rows[0]).as_deref(), Some("z"));
        Ok(())
    }

    #[test]
    fn persist_without_fetch_writes_no_snapshots() -> Result<(), ScraperError> {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let scraper = TeamRosterScraper::new(2024, vec!["sfo".to_string()]);
        let path = scraper.persist(&[], &ScrapeRun::default(), &settings)?;
        assert_eq!(path, dir.path().join("processed/team_rosters_2024.csv"));
        assert!(path.exists());
        assert!(!dir.path().join("raw").exists());
        Ok(())
    }

    #[test]
    fn scraper_default_delays() {
        let scraper = ActivePlayersScraper::new(&[]).unwrap();
        assert_eq!(scraper.default_delay(), Duration::from_secs(3));
        assert_eq!(
            TeamRosterScraper::new(2024, Vec::new()).default_delay(),
            Duration::ZERO
        );
    }

    #[test]
    fn delay_sleeps_between_requests_only() -> Result<(), ScraperError> {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            delay: Some(Duration::from_millis(50)),
            ..settings_in(dir.path())
        };
        let scraper = TeamRosterScraper::new(2024, vec!["sfo".into(), "kan".into()]);
        let mut fetcher = StubFetcher::serving("<html></html>");

        let started = std::time::Instant::now();
        let run = scraper.fetch(&mut fetcher, &settings, None)?;
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(run.pages().len(), 2);
        Ok(())
    }

    #[test]
    fn single_request_does_not_sleep() -> Result<(), ScraperError> {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            delay: None,
            ..settings_in(dir.path())
        };
        // Falls back to the 3s active-players default.
        let scraper = ActivePlayersScraper::new(&["a".to_string()])?;
        let mut fetcher = StubFetcher::serving("<html></html>");

        let started = std::time::Instant::now();
        scraper.fetch(&mut fetcher, &settings, None)?;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(fetcher.calls.len(), 1);
        Ok(())
    }

    #[test]
    fn default_team_codes_used_when_none_given() {
        let teams = team_codes_or_default(Vec::new());
        assert_eq!(teams.len(), 32);
        assert_eq!(teams[0], "crd");
        assert_eq!(team_codes_or_default(vec!["kan".into()]), vec!["kan"]);
    }
}
