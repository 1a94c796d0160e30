//! Domain guesses derived from the merchant identifier alone.
//!
//! The guess is always produced at [`ConfidenceClass::Heuristic`]; callers
//! decide whether external evidence (a live check) may upgrade it.

use std::sync::LazyLock;

use bonusmap_shared::{Candidate, ConfidenceClass, Provenance, fold_ascii};
use regex::Regex;

/// Country TLDs we recognise, with description keywords that imply them.
const COUNTRIES: &[(&str, &[&str])] = &[
    ("no", &["norway", "norwegian", "norge", "norsk", "norske"]),
    ("se", &["sweden", "swedish", "sverige", "svensk", "svenska"]),
];

/// Separators that may precede a trailing country token (`acme-no`, `acme_se`).
const SUFFIX_SEPARATORS: &[char] = &['-', '_', ' ', '.'];

/// An identifier that already is a domain, e.g. `www.komplett.no`.
static DOMAIN_IDENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?((?:[a-z0-9-]+\.)+(?:no|se|com))/?$")
        .expect("domain identifier regex")
});

/// One keyword regex per entry in [`COUNTRIES`].
static KEYWORD_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    COUNTRIES
        .iter()
        .map(|(tld, words)| {
            let re = Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|")))
                .expect("country keyword regex");
            (*tld, re)
        })
        .collect()
});

/// Why an identifier was associated with a country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintSource {
    /// Trailing `-no`/`-se` style token on the identifier.
    Suffix,
    /// Country keyword in the description.
    Keyword,
}

/// A country-specific guess: sanitized stem plus country TLD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryHint {
    pub tld: &'static str,
    pub stem: String,
    pub source: HintSource,
}

impl CountryHint {
    pub fn domain(&self) -> String {
        format!("{}.{}", self.stem, self.tld)
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(self.domain(), ConfidenceClass::Heuristic, Provenance::CountryHeuristic)
    }
}

/// Country-aware guess. Always yields a candidate, even a degenerate one for
/// an identifier with no usable characters.
pub fn guess(identifier: &str, description: Option<&str>, default_tld: &str) -> Candidate {
    if let Some(domain) = as_domain(identifier) {
        return Candidate::new(domain, ConfidenceClass::Heuristic, Provenance::GenericHeuristic);
    }
    if let Some(hint) = country_hint(identifier, description) {
        return hint.candidate();
    }
    let stem = sanitize(strip_country_suffix(identifier).0);
    Candidate::new(
        format!("{stem}.{}", bare_tld(default_tld)),
        ConfidenceClass::Heuristic,
        Provenance::GenericHeuristic,
    )
}

/// Country hint from the identifier suffix, else from description keywords.
pub fn country_hint(identifier: &str, description: Option<&str>) -> Option<CountryHint> {
    if as_domain(identifier).is_some() {
        return None;
    }

    let (stem, suffix_tld) = strip_country_suffix(identifier);
    let stem = sanitize(stem);
    if stem.is_empty() {
        return None;
    }

    if let Some(tld) = suffix_tld {
        return Some(CountryHint {
            tld,
            stem,
            source: HintSource::Suffix,
        });
    }

    let text = description?;
    KEYWORD_RES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(tld, _)| CountryHint {
            tld: *tld,
            stem,
            source: HintSource::Keyword,
        })
}

/// Country-agnostic guess with the configured TLD; `None` when the identifier
/// has no alphanumeric characters to build a label from.
pub fn generic(identifier: &str, default_tld: &str) -> Option<Candidate> {
    if let Some(domain) = as_domain(identifier) {
        return Some(Candidate::new(
            domain,
            ConfidenceClass::Heuristic,
            Provenance::GenericHeuristic,
        ));
    }
    let stem = sanitize(strip_country_suffix(identifier).0);
    if stem.is_empty() {
        return None;
    }
    Some(Candidate::new(
        format!("{stem}.{}", bare_tld(default_tld)),
        ConfidenceClass::Heuristic,
        Provenance::GenericHeuristic,
    ))
}

/// Identifier already spelled as a domain, normalized.
fn as_domain(identifier: &str) -> Option<String> {
    let lower = identifier.trim().to_ascii_lowercase();
    DOMAIN_IDENT_RE
        .captures(&lower)
        .map(|caps| caps[1].to_string())
}

/// Split a trailing country token off the identifier.
fn strip_country_suffix(identifier: &str) -> (&str, Option<&'static str>) {
    let trimmed = identifier.trim();
    for (tld, _) in COUNTRIES {
        for sep in SUFFIX_SEPARATORS {
            let suffix = format!("{sep}{tld}");
            if trimmed.len() > suffix.len()
                && trimmed.is_char_boundary(trimmed.len() - suffix.len())
                && trimmed[trimmed.len() - suffix.len()..].eq_ignore_ascii_case(&suffix)
            {
                return (&trimmed[..trimmed.len() - suffix.len()], Some(*tld));
            }
        }
    }
    (trimmed, None)
}

/// Lowercase ASCII letters and digits only.
fn sanitize(stem: &str) -> String {
    fold_ascii(&stem.to_lowercase())
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn bare_tld(tld: &str) -> &str {
    tld.trim().trim_start_matches('.')
}
