//! Team depth charts (`/teams/{team}/{season}_depth_chart.htm`).
//!
//! Each `depth_chart*` table is one unit. A row is one position; its cells are depth slots 1..N,
//! and a slot can name several players (co-starters) or only carry text.

use crate::config::Settings;
use crate::model::TeamDepthChartRecord;
use crate::scraper::{
    body_rows, cell_text, child_elements, joined_text, non_empty, parse_selector,
    player_id_from_href, resolve_url, team_codes_or_default, team_url, Scraper, ScraperError,
};
use scraper::{ElementRef, Html};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamDepthChartScraper {
    season: u16,
    teams: Vec<String>,
}

impl TeamDepthChartScraper {
    /// Empty `teams` means every franchise.
    pub fn new(season: u16, teams: Vec<String>) -> Self {
        Self {
            season,
            teams: team_codes_or_default(teams),
        }
    }
}

impl Scraper for TeamDepthChartScraper {
    type Record = TeamDepthChartRecord;

    fn name(&self) -> &'static str {
        "depth chart"
    }

    fn urls(&self) -> Vec<(String, String)> {
        self.teams
            .iter()
            .map(|team| (team.clone(), team_url(team, self.season, "_depth_chart.htm")))
            .collect()
    }

    fn parse(&self, pages: &[(String, String)]) -> Result<Vec<TeamDepthChartRecord>, ScraperError> {
        parse_depth_charts(self.season, pages)
    }

    fn csv_path(&self, settings: &Settings) -> PathBuf {
        settings
            .processed_dir()
            .join(format!("team_depth_chart_{}.csv", self.season))
    }

    fn snapshot_dir(&self, settings: &Settings) -> PathBuf {
        settings
            .raw_dir()
            .join("team_depth_charts")
            .join(self.season.to_string())
    }
}

/// Depth-chart entries for each `(team, html)` page, in page, table, row, slot order.
pub fn parse_depth_charts(
    season: u16,
    pages: &[(String, String)],
) -> Result<Vec<TeamDepthChartRecord>, ScraperError> {
    let table_sel = parse_selector("table[id^=\"depth_chart\"]")?;
    let position_sel = parse_selector("th[scope=\"row\"]")?;
    let mut records = Vec::new();
    for (team, html) in pages {
        let doc = Html::parse_document(html);
        let mut tables = 0;
        for table in doc.select(&table_sel) {
            tables += 1;
            let unit = unit_name(table.value().id().unwrap_or_default());
            for row in body_rows(table) {
                let Some(position_cell) = row.select(&position_sel).next() else {
                    continue;
                };
                let position = joined_text(position_cell, "");
                for (index, cell) in child_elements(row, "td").enumerate() {
                    let slot = Slot {
                        season,
                        team,
                        unit: &unit,
                        position: &position,
                        depth_slot: index as u32 + 1,
                    };
                    records.extend(slot.records(cell));
                }
            }
        }
        if tables == 0 {
            log::debug!("No depth chart tables for {} {}", team, season);
        }
    }
    Ok(records)
}

/// `depth_chart_special_teams` -> `Special Teams`.
fn unit_name(table_id: &str) -> String {
    let suffix = table_id.replacen("depth_chart", "", 1);
    let suffix = suffix.trim_matches('_');
    match suffix {
        "" => "Depth Chart".to_string(),
        "offense" => "Offense".to_string(),
        "defense" => "Defense".to_string(),
        "special_teams" => "Special Teams".to_string(),
        other => title_case(other),
    }
}

/// Upper-case the first letter of each alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

struct Slot<'a> {
    season: u16,
    team: &'a str,
    unit: &'a str,
    position: &'a str,
    depth_slot: u32,
}

impl Slot<'_> {
    fn records(&self, cell: ElementRef<'_>) -> Vec<TeamDepthChartRecord> {
        let text = cell_text(cell);
        let anchors: Vec<ElementRef<'_>> = cell
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "a")
            .collect();
        if anchors.is_empty() {
            return text
                .map(|text| vec![self.record(None, Some(text), None, None)])
                .unwrap_or_default();
        }
        let text = text.unwrap_or_default();

        let names: Vec<String> = anchors.iter().map(|a| joined_text(*a, "")).collect();
        let note = note_without_names(&text, &names);
        anchors
            .iter()
            .zip(names)
            .map(|(anchor, name)| {
                let href = anchor.value().attr("href").filter(|h| !h.is_empty());
                self.record(
                    href.and_then(player_id_from_href),
                    non_empty(name),
                    href.map(resolve_url),
                    note.clone(),
                )
            })
            .collect()
    }

    fn record(
        &self,
        player_id: Option<String>,
        player_name: Option<String>,
        player_url: Option<String>,
        note: Option<String>,
    ) -> TeamDepthChartRecord {
        TeamDepthChartRecord {
            season: self.season,
            team: self.team.to_string(),
            unit: self.unit.to_string(),
            position: self.position.to_string(),
            depth_slot: self.depth_slot,
            player_id,
            player_name,
            player_url,
            note,
        }
    }
}

/// Cell text with each player name removed once, e.g. `"QB Two (PS)"` -> `"(PS)"`.
fn note_without_names(text: &str, names: &[String]) -> Option<String> {
    let mut remainder = text.to_string();
    for name in names.iter().filter(|n| !n.is_empty()) {
        remainder = remainder.replacen(name.as_str(), "", 1).trim().to_string();
    }
    non_empty(remainder)
}
