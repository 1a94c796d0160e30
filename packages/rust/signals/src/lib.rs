//! Signal extractors: pure functions from one noisy merchant signal to a domain candidate.
//!
//! Each extractor looks at a single input (affiliate redirect URL, free-text
//! description, identifier string) and either proposes a [`Candidate`] or
//! explains why it could not via [`ExtractionFailure`]. A failure is an
//! ordinary "unknown" outcome; nothing here panics or performs I/O.

mod description;
mod heuristic;
mod redirect;

pub use description::from_description;
pub use heuristic::{CountryHint, HintSource, country_hint, generic, guess};
pub use redirect::from_redirect;

use bonusmap_shared::Candidate;

/// Why an extractor produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    /// The input was absent or blank.
    #[error("no input")]
    EmptyInput,

    /// The redirect URL could not be parsed.
    #[error("malformed URL: {0}")]
    MalformedUrl(String),

    /// The redirect URL carries no absolute URL in its query string.
    #[error("no embedded destination URL")]
    NoEmbeddedUrl,

    /// The text contains nothing that looks like a domain.
    #[error("no domain found in text")]
    NoMatch,
}

/// Outcome of a single extractor.
pub type Extraction = std::result::Result<Candidate, ExtractionFailure>;

/// Lowercase a host and drop a leading `www.` label.
pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}
