//! Destination host from affiliate redirect links.
//!
//! Affiliate networks wrap the shop URL in a query parameter, e.g.
//! `https://track.example.net/click?id=42&url=https%3A%2F%2Fwww.shop.no%2F`.
//! The first parameter whose value decodes to an absolute http(s) URL wins.

use bonusmap_shared::{Candidate, ConfidenceClass, Provenance};
use tracing::trace;
use url::Url;

use crate::{Extraction, ExtractionFailure, normalize_host};

/// Some networks encode the destination twice; decode at most this many extra times.
const MAX_EXTRA_DECODES: usize = 2;

/// Extract the destination domain embedded in a redirect URL.
pub fn from_redirect(redirect_url: Option<&str>) -> Extraction {
    let raw = redirect_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ExtractionFailure::EmptyInput)?;

    let parsed = Url::parse(raw).map_err(|e| ExtractionFailure::MalformedUrl(e.to_string()))?;

    for (key, value) in parsed.query_pairs() {
        if let Some(host) = embedded_host(&value) {
            trace!(param = %key, %host, "destination found in redirect");
            return Ok(Candidate::new(
                normalize_host(&host),
                ConfidenceClass::Inferred,
                Provenance::RedirectUrl,
            ));
        }
    }

    Err(ExtractionFailure::NoEmbeddedUrl)
}

/// Host of `value` if it is (or decodes to) an absolute http(s) URL.
fn embedded_host(value: &str) -> Option<String> {
    let mut current = value.trim().to_string();

    for _ in 0..=MAX_EXTRA_DECODES {
        if !current.to_ascii_lowercase().starts_with("http") {
            return None;
        }
        if let Ok(url) = Url::parse(&current) {
            if matches!(url.scheme(), "http" | "https") {
                return url.host_str().filter(|h| h.contains('.')).map(str::to_string);
            }
            return None;
        }
        current = percent_decode(&current)?;
    }

    None
}

/// One round of form-style percent decoding; `None` if nothing changed.
fn percent_decode(value: &str) -> Option<String> {
    let decoded: String = url::form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(k, v)| if v.is_empty() { k.into_owned() } else { format!("{k}={v}") })?;
    (decoded != value).then_some(decoded)
}
