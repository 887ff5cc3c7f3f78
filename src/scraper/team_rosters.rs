//! Team season rosters (`/teams/{team}/{season}_roster.htm`, `table#roster`).

use crate::config::Settings;
use crate::model::TeamRosterRecord;
use crate::scraper::{
    body_rows, cell_text, find_stat, first_link, joined_text, parse_selector,
    player_id_from_href, resolve_url, team_codes_or_default, team_url, Scraper, ScraperError,
};
use scraper::{ElementRef, Html};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRosterScraper {
    season: u16,
    teams: Vec<String>,
}

impl TeamRosterScraper {
    /// Empty `teams` means every franchise.
    pub fn new(season: u16, teams: Vec<String>) -> Self {
        Self {
            season,
            teams: team_codes_or_default(teams),
        }
    }
}

impl Scraper for TeamRosterScraper {
    type Record = TeamRosterRecord;

    fn name(&self) -> &'static str {
        "roster"
    }

    fn urls(&self) -> Vec<(String, String)> {
        self.teams
            .iter()
            .map(|team| (team.clone(), team_url(team, self.season, "_roster.htm")))
            .collect()
    }

    fn parse(&self, pages: &[(String, String)]) -> Result<Vec<TeamRosterRecord>, ScraperError> {
        parse_rosters(self.season, pages)
    }

    fn csv_path(&self, settings: &Settings) -> PathBuf {
        settings
            .processed_dir()
            .join(format!("team_rosters_{}.csv", self.season))
    }

    fn snapshot_dir(&self, settings: &Settings) -> PathBuf {
        settings
            .raw_dir()
            .join("team_rosters")
            .join(self.season.to_string())
    }
}

/// Roster rows for each `(team, html)` page, in page then row order. No deduplication.
pub fn parse_rosters(
    season: u16,
    pages: &[(String, String)],
) -> Result<Vec<TeamRosterRecord>, ScraperError> {
    let table_sel = parse_selector("table#roster")?;
    let mut records = Vec::new();
    for (team, html) in pages {
        let doc = Html::parse_document(html);
        let Some(table) = doc.select(&table_sel).next() else {
            log::debug!("No roster table for {} {}", team, season);
            continue;
        };
        records.extend(
            body_rows(table)
                .into_iter()
                .filter_map(|row| roster_row(row, season, team)),
        );
    }
    Ok(records)
}

fn roster_row(row: ElementRef<'_>, season: u16, team: &str) -> Option<TeamRosterRecord> {
    let player_cell = find_stat(row, "td", "player")?;
    let (anchor, href) = first_link(player_cell)?;
    let player_id = player_cell
        .value()
        .attr("data-append-csv")
        .filter(|id| !id.trim().is_empty())
        .map(|id| id.trim().to_string())
        .or_else(|| player_id_from_href(href))
        .unwrap_or_else(|| {
            log::debug!("Roster row for {} {} has no player id in {}", team, season, href);
            String::new()
        });
    let td = |stat: &str| find_stat(row, "td", stat).and_then(cell_text);

    Some(TeamRosterRecord {
        season,
        team: team.to_string(),
        uniform_number: find_stat(row, "th", "uniform_number").and_then(cell_text),
        player_id,
        player_name: joined_text(anchor, ""),
        player_url: resolve_url(href),
        position: td("pos"),
        age: td("age"),
        height: td("height"),
        weight: td("weight"),
        experience: td("experience"),
        games_played: td("g"),
        games_started: td("gs"),
        approximate_value: td("av"),
        college: td("college_id"),
        birth_date: td("birth_date_mod"),
        draft_info: td("draft_info"),
    })
}
