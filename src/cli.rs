//! CLI parsing and orchestration. Builds settings, runs one scraper, maps errors to exit codes.

use crate::config::{self, Settings};
use crate::fetch::cookies::{self, CookieFileError};
use crate::fetch::{FallbackFetcher, FetchError};
use crate::scraper::{
    ActivePlayersScraper, Scraper, ScraperError, TeamDepthChartScraper, TeamGameLogScraper,
    TeamRosterScraper,
};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Cookies(#[from] CookieFileError),

    #[error("Cannot set up HTTP session: {0}")]
    Setup(#[source] FetchError),

    #[error("{0}")]
    Scraper(#[from] ScraperError),
}

impl CliRunError {
    /// 1 invalid input or configuration, 2 fetch or scrape failure, 3 output failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) | CliRunError::Cookies(_) | CliRunError::Setup(_) => 1,
            CliRunError::Scraper(ScraperError::InvalidLetter { .. }) => 1,
            CliRunError::Scraper(ScraperError::Fetch(e)) if e.is_configuration() => 1,
            CliRunError::Scraper(ScraperError::Output(_)) => 3,
            CliRunError::Scraper(_) => 2,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "pfrscrape")]
#[command(about = "Scrape pro-football-reference.com into CSV files")]
#[command(
    after_help = "Settings are layered: defaults, then pfrscrape.toml (or <config dir>/pfrscrape/config.toml), then PFR_* environment variables, then these flags."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Root directory for processed CSVs and raw snapshots (default: data).
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    /// Per-request timeout in seconds (default 10).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Per-page browser timeout in seconds (default 45).
    #[arg(long, global = true)]
    pub browser_timeout: Option<u64>,

    /// Show the fallback browser window so a challenge can be solved by hand.
    #[arg(long, global = true)]
    pub headed: bool,

    /// Harvested cookie JSON file (default: configs/cf_cookies.json).
    #[arg(long, global = true)]
    pub cookies: Option<PathBuf>,

    /// Delay between page requests in seconds (default: 3 for active players, 0 otherwise).
    #[arg(long, global = true)]
    pub delay: Option<f64>,

    /// Suppress progress output (warnings and errors only).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging and the full error chain.
    #[arg(long, global = true)]
    pub verbose: bool,
}

impl Args {
    /// Default log filter when RUST_LOG is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Active players from the letter index pages.
    ActivePlayers {
        /// Index letters to fetch (default: A-Z).
        #[arg(long, num_args = 1..)]
        letters: Vec<String>,
    },
    /// Season rosters.
    Rosters(TeamArgs),
    /// Season depth charts.
    DepthCharts(TeamArgs),
    /// Season game logs, regular season and playoffs.
    GameLogs {
        #[command(flatten)]
        team_args: TeamArgs,

        /// Skip the playoffs table.
        #[arg(long)]
        no_playoffs: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct TeamArgs {
    /// Season year, e.g. 2024.
    pub season: u16,

    /// Franchise codes, e.g. sfo kan (default: all 32).
    #[arg(long, num_args = 1..)]
    pub teams: Vec<String>,
}

impl TeamArgs {
    fn team_codes(&self) -> Vec<String> {
        self.teams
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Defaults < config file < environment < flags, then the cookie file on top.
pub fn build_settings(args: &Args) -> Result<Settings, CliRunError> {
    let mut settings = Settings::load().map_err(CliRunError::InvalidInput)?;
    apply_args(&mut settings, args)?;
    cookies::load_into(&mut settings)?;
    Ok(settings)
}

fn apply_args(settings: &mut Settings, args: &Args) -> Result<(), CliRunError> {
    if let Some(ref root) = args.data_root {
        settings.data_root = root.clone();
    }
    if let Some(secs) = args.timeout {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = args.browser_timeout {
        settings.browser_timeout = Duration::from_secs(secs);
    }
    if args.headed {
        settings.headed = true;
    }
    if let Some(ref path) = args.cookies {
        settings.cookie_file = path.clone();
    }
    if let Some(secs) = args.delay {
        settings.delay = Some(config::parse_delay(secs).map_err(CliRunError::InvalidInput)?);
    }
    Ok(())
}

/// A validated subcommand, ready to run once settings are loaded.
#[derive(Debug)]
enum Job {
    ActivePlayers(ActivePlayersScraper),
    Rosters(TeamRosterScraper),
    DepthCharts(TeamDepthChartScraper),
    GameLogs(TeamGameLogScraper),
}

impl Job {
    /// Checks command input only; reads no config, environment, or files.
    fn from_command(command: &Command) -> Result<Self, CliRunError> {
        Ok(match command {
            Command::ActivePlayers { letters } => {
                Job::ActivePlayers(ActivePlayersScraper::new(letters)?)
            }
            Command::Rosters(team_args) => Job::Rosters(TeamRosterScraper::new(
                team_args.season,
                team_args.team_codes(),
            )),
            Command::DepthCharts(team_args) => Job::DepthCharts(TeamDepthChartScraper::new(
                team_args.season,
                team_args.team_codes(),
            )),
            Command::GameLogs {
                team_args,
                no_playoffs,
            } => Job::GameLogs(TeamGameLogScraper::new(
                team_args.season,
                team_args.team_codes(),
                !no_playoffs,
            )),
        })
    }

    fn execute(&self, settings: &Settings, quiet: bool) -> Result<(), CliRunError> {
        match self {
            Job::ActivePlayers(scraper) => execute(scraper, settings, quiet),
            Job::Rosters(scraper) => execute(scraper, settings, quiet),
            Job::DepthCharts(scraper) => execute(scraper, settings, quiet),
            Job::GameLogs(scraper) => execute(scraper, settings, quiet),
        }
    }
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let job = Job::from_command(&args.command)?;
    let settings = build_settings(args)?;
    job.execute(&settings, args.quiet)
}

fn execute<S: Scraper>(scraper: &S, settings: &Settings, quiet: bool) -> Result<(), CliRunError> {
    let mut fetcher = FallbackFetcher::from_settings(settings).map_err(CliRunError::Setup)?;

    let progress_state: RefCell<Option<indicatif::ProgressBar>> = RefCell::new(None);
    let progress_cb = |n: u32, total: u32| {
        if total == 0 {
            return;
        }
        let mut state = progress_state.borrow_mut();
        let pb = state.get_or_insert_with(|| {
            let bar = indicatif::ProgressBar::new(total as u64);
            if let Ok(style) = indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
            {
                bar.set_style(
                    style
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                        .progress_chars("█▉▊▋▌▍▎▏ "),
                );
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        pb.set_position(n as u64);
        pb.set_message(format!("Fetched {} page {}/{}", scraper.name(), n, total));
    };
    let progress: Option<&dyn Fn(u32, u32)> = if quiet { None } else { Some(&progress_cb) };

    let result = scraper.run(&mut fetcher, settings, progress);

    if let Some(pb) = progress_state.borrow_mut().take() {
        pb.disable_steady_tick();
        pb.finish_and_clear();
    }

    let records = result?;
    if !quiet {
        eprintln!(
            "Wrote {} record(s) to {}",
            records.len(),
            scraper.csv_path(settings).display()
        );
    }
    Ok(())
}
