//! Active players from the letter-indexed player pages (`/players/{L}/`).
//!
//! Active players are the bold entries in `div#div_players`; retired players are plain links and
//! are skipped.

use crate::config::Settings;
use crate::model::{split_player_name, ActivePlayerRecord};
use crate::scraper::{
    first_link, joined_text, parse_selector, player_id_from_href, resolve_url, Scraper,
    ScraperError, BASE_URL,
};
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Index pages are small and many; pause between them unless settings say otherwise.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

/// Upper-case and validate index letters. Empty input means A-Z.
pub fn normalize_letters(letters: &[String]) -> Result<Vec<char>, ScraperError> {
    if letters.is_empty() {
        return Ok(('A'..='Z').collect());
    }
    letters
        .iter()
        .map(|raw| {
            let mut chars = raw.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => Ok(c.to_ascii_uppercase()),
                _ => Err(ScraperError::InvalidLetter {
                    letter: raw.clone(),
                }),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePlayersScraper {
    letters: Vec<char>,
}

impl ActivePlayersScraper {
    /// Validates every letter before anything is fetched.
    pub fn new(letters: &[String]) -> Result<Self, ScraperError> {
        Ok(Self {
            letters: normalize_letters(letters)?,
        })
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }
}

impl Scraper for ActivePlayersScraper {
    type Record = ActivePlayerRecord;

    fn name(&self) -> &'static str {
        "active players"
    }

    fn urls(&self) -> Vec<(String, String)> {
        self.letters
            .iter()
            .map(|letter| (letter.to_string(), format!("{}/players/{}/", BASE_URL, letter)))
            .collect()
    }

    fn parse(&self, pages: &[(String, String)]) -> Result<Vec<ActivePlayerRecord>, ScraperError> {
        parse_active_players(pages)
    }

    fn csv_path(&self, settings: &Settings) -> PathBuf {
        settings.processed_dir().join("active_players.csv")
    }

    fn snapshot_dir(&self, settings: &Settings) -> PathBuf {
        settings.raw_dir().join("active_players").join("index")
    }

    fn default_delay(&self) -> Duration {
        DEFAULT_DELAY
    }
}

/// Parse letter pages keyed by letter. A player seen on several pages keeps the record from the
/// last one; output is ordered by (letter, player_name).
pub fn parse_active_players(
    pages: &[(String, String)],
) -> Result<Vec<ActivePlayerRecord>, ScraperError> {
    let container_sel = parse_selector("div#div_players")?;
    let bold_sel = parse_selector("b")?;

    let mut by_id: BTreeMap<String, ActivePlayerRecord> = BTreeMap::new();
    for (letter, html) in pages {
        let doc = Html::parse_document(html);
        let Some(container) = doc.select(&container_sel).next() else {
            log::debug!("No player list on page {}", letter);
            continue;
        };
        for bold in container.select(&bold_sel) {
            if let Some(record) = record_from_bold(bold, letter) {
                by_id.insert(record.player_id.clone(), record);
            }
        }
    }

    let mut records: Vec<ActivePlayerRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| {
        a.letter
            .cmp(&b.letter)
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    Ok(records)
}

fn record_from_bold(bold: ElementRef<'_>, letter: &str) -> Option<ActivePlayerRecord> {
    let (anchor, href) = first_link(bold)?;
    let player_name = joined_text(anchor, "");
    let player_id = player_id_from_href(href)?;
    let position = position_suffix(&joined_text(bold, " "), &player_name);
    let (first_name, last_name) = split_player_name(&player_name);
    Some(ActivePlayerRecord {
        player_id,
        player_name,
        first_name,
        last_name,
        letter: letter.to_string(),
        url: resolve_url(href),
        position,
    })
}

/// `"Test Player (QB)"` minus the name -> `Some("QB")`. Anything not in parentheses is no position.
fn position_suffix(bold_text: &str, name: &str) -> Option<String> {
    let rest = bold_text
        .strip_prefix(name)
        .or_else(|| bold_text.get(name.len()..))?
        .trim();
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?.trim();
    (!inner.is_empty()).then(|| inner.to_string())
}
