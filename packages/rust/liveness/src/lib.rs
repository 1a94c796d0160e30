//! Reachability probe for candidate domains.
//!
//! A country-specific guess like `acme.no` is only promoted to a trusted
//! answer when `https://acme.no` answers with a non-error status. The probe
//! is a soft signal: every failure mode is reported as a [`Liveness`] value
//! and never aborts the run.

use std::future::Future;
use std::time::Duration;

use bonusmap_shared::{BonusmapError, Result, ValidatorConfig};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

/// Maximum number of redirects to follow when probing a domain.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for probe requests.
const USER_AGENT: &str = concat!("bonusmap/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Liveness
// ---------------------------------------------------------------------------

/// Outcome of probing one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// Answered with a status below 400.
    Alive(u16),
    /// Answered, but with a client or server error.
    ErrorStatus(u16),
    /// No answer within the per-probe timeout.
    TimedOut,
    /// DNS, TLS, or connection failure.
    Unreachable(String),
    /// The candidate does not form a valid `https://<domain>` URL.
    MalformedUrl(String),
    /// Validation is switched off.
    Skipped,
}

impl Liveness {
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Alive(_))
    }
}

impl std::fmt::Display for Liveness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alive(status) => write!(f, "alive (HTTP {status})"),
            Self::ErrorStatus(status) => write!(f, "HTTP {status}"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            Self::MalformedUrl(domain) => write!(f, "malformed domain '{domain}'"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validator trait
// ---------------------------------------------------------------------------

/// Something that can tell whether a domain is live.
pub trait Validator: Send + Sync {
    fn validate(&self, domain: &str) -> impl Future<Output = Liveness> + Send;
}

/// Validator used when probing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipValidation;

impl Validator for SkipValidation {
    async fn validate(&self, _domain: &str) -> Liveness {
        Liveness::Skipped
    }
}

// ---------------------------------------------------------------------------
// HTTP validator
// ---------------------------------------------------------------------------

/// Probes `https://<domain>` with a HEAD request.
#[derive(Debug, Clone)]
pub struct HttpValidator {
    client: Client,
    scheme: &'static str,
}

impl HttpValidator {
    /// Build a validator with the configured per-probe timeout.
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BonusmapError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            scheme: "https",
        })
    }

    /// Probe over plain HTTP (for integration tests with mock servers).
    #[cfg(test)]
    fn plain_http(mut self) -> Self {
        self.scheme = "http";
        self
    }

    fn probe_url(&self, domain: &str) -> Option<Url> {
        let domain = domain.trim();
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return None;
        }
        let url = Url::parse(&format!("{}://{domain}", self.scheme)).ok()?;
        let bare = url.host_str().is_some()
            && url.path() == "/"
            && url.query().is_none()
            && url.fragment().is_none()
            && url.username().is_empty();
        bare.then_some(url)
    }
}

impl Validator for HttpValidator {
    #[instrument(skip(self))]
    async fn validate(&self, domain: &str) -> Liveness {
        let Some(url) = self.probe_url(domain) else {
            return Liveness::MalformedUrl(domain.to_string());
        };

        let mut outcome = send(self.client.head(url.as_str())).await;

        // Some shops refuse HEAD outright; the host is there, so ask properly.
        if matches!(
            outcome,
            Liveness::ErrorStatus(s) if s == StatusCode::METHOD_NOT_ALLOWED.as_u16()
                || s == StatusCode::NOT_IMPLEMENTED.as_u16()
        ) {
            outcome = send(self.client.get(url.as_str())).await;
        }

        debug!(%outcome, "probe finished");
        outcome
    }
}

async fn send(request: reqwest::RequestBuilder) -> Liveness {
    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status < 400 {
                Liveness::Alive(status)
            } else {
                Liveness::ErrorStatus(status)
            }
        }
        Err(e) if e.is_timeout() => Liveness::TimedOut,
        Err(e) => Liveness::Unreachable(e.to_string()),
    }
}
