//! Shared error type for the scrapers.

use crate::fetch::FetchError;
use crate::output::OutputError;
use thiserror::Error;

/// Errors from a scraper run: input validation, the fetch state, or the persist state.
/// Missing or malformed page structure is never an error; it yields fewer records.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid letter '{letter}': expected a single letter A-Z.")]
    InvalidLetter { letter: String },

    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Output(#[from] OutputError),
}
