//! Domain mentions in listing blurbs ("Handle på www.example.no i dag").

use std::sync::LazyLock;

use bonusmap_shared::{Candidate, ConfidenceClass, Provenance, fold_ascii};
use regex::Regex;

use crate::{Extraction, ExtractionFailure};

/// `[scheme][www.]<label>.<no|se|com>`; only the label directly before the TLD is kept.
/// The label must start on a word boundary, so `my_shop.no` never yields `shop.no`.
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://)?(?:www\.)?([a-z0-9][a-z0-9-]*)\.(no|se|com)\b")
        .expect("domain regex")
});

/// First domain-looking substring of `description`, as `<label>.<tld>`.
pub fn from_description(description: Option<&str>) -> Extraction {
    let text = description
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ExtractionFailure::EmptyInput)?;

    // Blurbs spell domains with Nordic letters ("elkjøp.no"); hosts use ASCII.
    let text = fold_ascii(text);
    let caps = DOMAIN_RE.captures(&text).ok_or(ExtractionFailure::NoMatch)?;
    let domain = format!(
        "{}.{}",
        caps[1].to_ascii_lowercase(),
        caps[2].to_ascii_lowercase()
    );

    Ok(Candidate::new(domain, ConfidenceClass::Inferred, Provenance::Description))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain_of(text: &str) -> Option<String> {
        from_description(Some(text)).ok().map(|c| c.domain)
    }

    #[test]
    fn finds_www_domain() {
        let c = from_description(Some("Visit www.example.no for deals")).expect("candidate");
        assert_eq!(c.domain, "example.no");
        assert_eq!(c.class, ConfidenceClass::Inferred);
        assert_eq!(c.provenance, Provenance::Description);
    }

    #[test]
    fn handles_scheme_and_case() {
        assert_eq!(domain_of("Se HTTPS://WWW.Elkjop.NO/tilbud"), Some("elkjop.no".into()));
        assert_eq!(domain_of("shop at boozt.com today"), Some("boozt.com".into()));
        assert_eq!(domain_of("Svensk butikk: https://lyko.se"), Some("lyko.se".into()));
    }

    #[test]
    fn only_first_match_is_used() {
        assert_eq!(domain_of("first.no or second.se"), Some("first.no".into()));
    }

    #[test]
    fn keeps_label_before_tld() {
        assert_eq!(domain_of("www.shop.example.com"), Some("example.com".into()));
    }

    #[test]
    fn tld_must_end_at_word_boundary() {
        assert_eq!(domain_of("Nordic fashion at example.nordic"), None);
        assert_eq!(domain_of("example.co.uk"), None);
    }

    #[test]
    fn label_starts_at_word_boundary() {
        assert_eq!(domain_of("Handle på elkjøp.no i dag"), Some("elkjop.no".into()));
        assert_eq!(domain_of("Besøk my_shop.no"), None);
        assert_eq!(domain_of("Prisløftet þorp.no"), None);
    }

    #[test]
    fn no_match_and_empty() {
        assert_eq!(
            from_description(Some("Great prices on shoes")),
            Err(ExtractionFailure::NoMatch)
        );
        assert_eq!(from_description(None), Err(ExtractionFailure::EmptyInput));
        assert_eq!(from_description(Some("  ")), Err(ExtractionFailure::EmptyInput));
    }
}
