//! Listing scrapers for the supported loyalty programs.
//!
//! Each program turns its public shop listing into [`MerchantRecord`]s. The
//! resolution core never depends on this crate; it only consumes the records.

pub mod rewards;
mod sas;
mod trumf;

use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use bonusmap_shared::{BonusmapError, MerchantRecord, Result, SourcesConfig};
use regex::Regex;
use reqwest::Client;
use scraper::ElementRef;
use tracing::{debug, instrument};
use url::Url;

pub use rewards::{sas_rewards, trumf_rewards};

/// User-Agent string for listing requests.
const USER_AGENT: &str = concat!("bonusmap/", env!("CARGO_PKG_VERSION"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// A loyalty program with a scrapeable shop listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    Trumf,
    Sas,
}

impl Program {
    pub const ALL: [Program; 2] = [Program::Trumf, Program::Sas];

    /// Tag stored in [`MerchantRecord::program`].
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trumf => "trumf",
            Self::Sas => "sas",
        }
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trumf" => Ok(Self::Trumf),
            "sas" | "eurobonus" => Ok(Self::Sas),
            other => Err(format!("unknown program '{other}' (expected trumf or sas)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Fetches and parses program listings.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: SourcesConfig,
}

impl Fetcher {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BonusmapError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch every merchant listed by `program`.
    #[instrument(skip(self), fields(program = %program))]
    pub async fn fetch(&self, program: Program) -> Result<Vec<MerchantRecord>> {
        match program {
            Program::Trumf => trumf::fetch(self).await,
            Program::Sas => sas::fetch(self).await,
        }
    }

    pub(crate) fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// GET a page body, treating non-success statuses as errors.
    pub(crate) async fn get_text(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching listing page");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| BonusmapError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BonusmapError::Network(format!("{url}: HTTP {}", status.as_u16())));
        }

        response
            .text()
            .await
            .map_err(|e| BonusmapError::Network(format!("{url}: failed to read body: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a configured listing URL.
pub(crate) fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| BonusmapError::config(format!("invalid listing URL '{raw}': {e}")))
}

/// Visible text of an element, whitespace collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let joined = el.text().collect::<Vec<_>>().join(" ");
    WHITESPACE_RE.replace_all(joined.trim(), " ").into_owned()
}

/// `href` of the first matching link, resolved against the page URL.
pub(crate) fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
