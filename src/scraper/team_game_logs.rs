//! Team season game logs (`/teams/{team}/{season}/gamelog/`), regular season and playoffs.

use crate::config::Settings;
use crate::model::{GameType, TeamGameLogRecord};
use crate::scraper::{
    body_rows, cell_text, first_link, parse_selector, resolve_url, team_codes_or_default,
    team_url, Scraper, ScraperError,
};
use scraper::{ElementRef, Html};
use std::path::PathBuf;

pub const REGULAR_SEASON_TABLE_ID: &str =
    "table_pfr_team-year_game-logs_team-year-regular-season-game-log";
pub const PLAYOFFS_TABLE_ID: &str = "table_pfr_team-year_game-logs_team-year-playoffs-game-log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamGameLogScraper {
    season: u16,
    teams: Vec<String>,
    include_playoffs: bool,
}

impl TeamGameLogScraper {
    /// Empty `teams` means every franchise.
    pub fn new(season: u16, teams: Vec<String>, include_playoffs: bool) -> Self {
        Self {
            season,
            teams: team_codes_or_default(teams),
            include_playoffs,
        }
    }
}

impl Scraper for TeamGameLogScraper {
    type Record = TeamGameLogRecord;

    fn name(&self) -> &'static str {
        "game log"
    }

    fn urls(&self) -> Vec<(String, String)> {
        self.teams
            .iter()
            .map(|team| (team.clone(), team_url(team, self.season, "/gamelog/")))
            .collect()
    }

    fn parse(&self, pages: &[(String, String)]) -> Result<Vec<TeamGameLogRecord>, ScraperError> {
        parse_game_logs(self.season, pages, self.include_playoffs)
    }

    fn csv_path(&self, settings: &Settings) -> PathBuf {
        settings
            .processed_dir()
            .join(format!("team_game_logs_{}.csv", self.season))
    }

    fn snapshot_dir(&self, settings: &Settings) -> PathBuf {
        settings
            .raw_dir()
            .join("team_game_logs")
            .join(self.season.to_string())
    }
}

/// Game rows for each `(team, html)` page: regular season first, then playoffs when requested.
/// Rows without an opponent (totals, bye weeks) are dropped.
pub fn parse_game_logs(
    season: u16,
    pages: &[(String, String)],
    include_playoffs: bool,
) -> Result<Vec<TeamGameLogRecord>, ScraperError> {
    let mut tables = vec![(GameType::Regular, table_selector(REGULAR_SEASON_TABLE_ID)?)];
    if include_playoffs {
        tables.push((GameType::Playoffs, table_selector(PLAYOFFS_TABLE_ID)?));
    }

    let mut records = Vec::new();
    for (team, html) in pages {
        let doc = Html::parse_document(html);
        for (game_type, selector) in &tables {
            let Some(table) = doc.select(selector).next() else {
                log::debug!("No {} game log for {} {}", game_type, team, season);
                continue;
            };
            records.extend(
                body_rows(table)
                    .into_iter()
                    .map(|row| game_row(row, season, team, *game_type))
                    .filter(|record| record.opponent.is_some()),
            );
        }
    }
    Ok(records)
}

fn table_selector(id: &str) -> Result<scraper::Selector, ScraperError> {
    parse_selector(&format!("table[id=\"{}\"]", id))
}

fn game_row(row: ElementRef<'_>, season: u16, team: &str, game_type: GameType) -> TeamGameLogRecord {
    let mut record = TeamGameLogRecord {
        season,
        team: team.to_string(),
        game_type,
        game_number: None,
        week: None,
        date: None,
        day: None,
        home_away: None,
        opponent: None,
        result: None,
        team_points: None,
        opponent_points: None,
        overtime: None,
        boxscore_url: None,
    };
    let cells = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"));
    for cell in cells {
        let Some(stat) = cell.value().attr("data-stat") else {
            continue;
        };
        let value = cell_text(cell);
        match stat {
            "team_game_num_season" => record.game_number = value,
            "week_num" => record.week = value,
            "date" => {
                record.date = value;
                record.boxscore_url = first_link(cell).map(|(_, href)| resolve_url(href));
            }
            "game_day_of_week" => record.day = value,
            "game_location" => record.home_away = value,
            "opp_name_abbr" => record.opponent = value,
            "team_game_result" => record.result = value,
            "points" => record.team_points = value,
            "points_opp" => record.opponent_points = value,
            "overtimes" => record.overtime = value,
            _ => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::read_records;
    use crate::scraper::tests::{settings_in, StubFetcher};

    const SAMPLE_GAME_LOG_HTML: &str = r#"
<div>
    <table id="table_pfr_team-year_game-logs_team-year-regular-season-game-log">
        <tbody>
            <tr>
                <th data-stat="ranker">1</th>
                <td data-stat="team_game_num_season">1</td>
                <td data-stat="week_num">1</td>
                <td data-stat="date"><a href="/boxscores/202409080chi.htm">2024-09-08</a></td>
                <td data-stat="game_day_of_week">Sun</td>
                <td data-stat="game_location">@</td>
                <td data-stat="opp_name_abbr">CHI</td>
                <td data-stat="team_game_result">W</td>
                <td data-stat="points">24</td>
                <td data-stat="points_opp">17</td>
                <td data-stat="overtimes"></td>
            </tr>
            <tr class="thead"><th data-stat="ranker">Totals</th></tr>
        </tbody>
    </table>
    <table id="table_pfr_team-year_game-logs_team-year-playoffs-game-log">
        <tbody>
            <tr>
                <th data-stat="ranker">2</th>
                <td data-stat="team_game_num_season">18</td>
                <td data-stat="week_num">Division</td>
                <td data-stat="date"><a href="/boxscores/202501120sfo.htm">2025-01-12</a></td>
                <td data-stat="game_day_of_week">Sun</td>
                <td data-stat="game_location">N</td>
                <td data-stat="opp_name_abbr">DAL</td>
                <td data-stat="team_game_result">L</td>
                <td data-stat="points">20</td>
                <td data-stat="points_opp">24</td>
                <td data-stat="overtimes">OT</td>
            </tr>
        </tbody>
    </table>
</div>
"#;

    fn sfo(html: &str) -> Vec<(String, String)> {
        vec![("sfo".to_string(), html.to_string())]
    }

    #[test]
    fn sample_game_log_both_tables() -> Result<(), ScraperError> {
        let records = parse_game_logs(2024, &sfo(SAMPLE_GAME_LOG_HTML), true)?;
        assert_eq!(records.len(), 2);

        let regular = &records[0];
        assert_eq!(regular.game_type, GameType::Regular);
        assert_eq!(
            regular.boxscore_url.as_deref(),
            Some("https://www.pro-football-reference.com/boxscores/202409080chi.htm")
        );
        assert_eq!(regular.date.as_deref(), Some("2024-09-08"));
        assert_eq!(regular.home_away.as_deref(), Some("@"));
        assert_eq!(regular.opponent.as_deref(), Some("CHI"));
        assert_eq!(regular.team_points.as_deref(), Some("24"));
        assert_eq!(regular.overtime, None);

        let playoff = &records[1];
        assert_eq!(playoff.game_type, GameType::Playoffs);
        assert_eq!(playoff.week.as_deref(), Some("Division"));
        assert_eq!(playoff.overtime.as_deref(), Some("OT"));
        Ok(())
    }

    #[test]
    fn playoffs_skipped_when_not_requested() -> Result<(), ScraperError> {
        let records = parse_game_logs(2024, &sfo(SAMPLE_GAME_LOG_HTML), false)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].game_type, GameType::Regular);
        Ok(())
    }

    #[test]
    fn rows_without_opponent_are_dropped() -> Result<(), ScraperError> {
        let html = r#"<table id="table_pfr_team-year_game-logs_team-year-regular-season-game-log"><tbody>
            <tr><td data-stat="week_num">5</td><td data-stat="opp_name_abbr"></td></tr>
            <tr><td data-stat="week_num">6</td><td data-stat="opp_name_abbr">KAN</td></tr>
        </tbody></table>"#;
        let records = parse_game_logs(2024, &sfo(html), true)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].week.as_deref(), Some("6"));
        assert_eq!(records[0].boxscore_url, None);
        Ok(())
    }

    #[test]
    fn missing_tables_yield_nothing() -> Result<(), ScraperError> {
        assert!(parse_game_logs(2024, &sfo("<p>nothing</p>"), true)?.is_empty());
        Ok(())
    }

    #[test]
    fn run_writes_csv_with_game_types() -> Result<(), ScraperError> {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let scraper = TeamGameLogScraper::new(2024, vec!["sfo".to_string()], true);
        let mut fetcher = StubFetcher::serving(SAMPLE_GAME_LOG_HTML);

        scraper.run(&mut fetcher, &settings, None)?;

        assert_eq!(
            fetcher.calls,
            vec!["https://www.pro-football-reference.com/teams/sfo/2024/gamelog/".to_string()]
        );
        let csv_path = dir.path().join("processed/team_game_logs_2024.csv");
        let text = std::fs::read_to_string(&csv_path).unwrap();
        assert!(text.starts_with("season,team,game_type,"));
        let rows: Vec<TeamGameLogRecord> = read_records(&csv_path)?;
        assert_eq!(rows[0].team, "sfo");
        let types: Vec<GameType> = rows.iter().map(|r| r.game_type).collect();
        assert_eq!(types, vec![GameType::Regular, GameType::Playoffs]);
        assert!(dir.path().join("raw/team_game_logs/2024/sfo.html").exists());
        Ok(())
    }

    #[test]
    fn zero_records_leave_empty_file() -> Result<(), ScraperError> {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(dir.path());
        let scraper = TeamGameLogScraper::new(2024, vec!["sfo".to_string()], true);
        let mut fetcher = StubFetcher::serving("<html><body>no tables</body></html>");

        let records = scraper.run(&mut fetcher, &settings, None)?;

        assert!(records.is_empty());
        let csv_path = dir.path().join("processed/team_game_logs_2024.csv");
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "");
        let rows: Vec<TeamGameLogRecord> = read_records(&csv_path)?;
        assert!(rows.is_empty());
        Ok(())
    }
}
