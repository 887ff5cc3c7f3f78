//! pfrscrape: scrape pro-football-reference.com (active players, rosters, depth charts, game logs)
//! into CSV files, with a browser fallback when the site answers with a bot challenge.

pub mod cli;
pub mod config;
pub mod fetch;
pub mod model;
pub mod output;
pub mod scraper;

// Re-exports for CLI and consumers.
pub use config::Settings;
pub use fetch::{FallbackFetcher, FetchError, FetchedPage, HtmlFetcher};
pub use model::{
    ActivePlayerRecord, GameType, TeamDepthChartRecord, TeamGameLogRecord, TeamRosterRecord,
};
pub use output::{read_records, write_csv, OutputError};
pub use scraper::{
    ActivePlayersScraper, Scraper, ScraperError, TeamDepthChartScraper, TeamGameLogScraper,
    TeamRosterScraper,
};
