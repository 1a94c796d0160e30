//! Upgrades of persisted overlay entries to the current shape.
//!
//! Older runs wrote the overlay as `identifier → "domain"` (an accepted manual
//! answer) or `identifier → null` (unresolved). Hand edits produce partial
//! objects. Every shape is normalized once, at load, into [`OverlayEntry`].

use serde::Deserialize;
use serde_json::Value;

use crate::entry::OverlayEntry;

/// How a stored value was brought to the current shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Already a complete, consistent entry.
    Current,
    /// Bare string: accepted manual answer.
    LegacyString,
    /// Bare `null`: unresolved marker.
    LegacyNull,
    /// Object with missing or contradictory fields, fixed up.
    Repaired,
    /// Value of an unusable type, replaced with an unresolved entry.
    Unreadable,
}

/// Object form as it may appear on disk; every field optional.
#[derive(Debug, Default, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default, alias = "needsReview")]
    needs_review: Option<bool>,
    #[serde(default, alias = "isMissing")]
    missing: Option<bool>,
    #[serde(default)]
    trusted: Option<bool>,
}

/// Bring one stored value to the current entry shape.
pub(crate) fn normalize_entry(value: Value) -> (OverlayEntry, Normalization) {
    match value {
        Value::String(domain) => match clean_domain(Some(domain)) {
            Some(domain) => (OverlayEntry::accepted(domain), Normalization::LegacyString),
            None => (OverlayEntry::unresolved(), Normalization::LegacyNull),
        },
        Value::Null => (OverlayEntry::unresolved(), Normalization::LegacyNull),
        Value::Object(map) => {
            let domain = map.get("domain").and_then(Value::as_str).map(str::to_owned);
            match serde_json::from_value::<StoredEntry>(Value::Object(map)) {
                Ok(stored) => normalize_object(stored),
                Err(_) => salvage_domain(domain),
            }
        }
        Value::Bool(_) | Value::Number(_) | Value::Array(_) => {
            (OverlayEntry::unresolved(), Normalization::Unreadable)
        }
    }
}

fn normalize_object(stored: StoredEntry) -> (OverlayEntry, Normalization) {
    let complete = stored.needs_review.is_some()
        && stored.missing.is_some()
        && stored.trusted.is_some();
    let raw_domain_present = stored.domain.is_some();

    let domain = clean_domain(stored.domain);
    let trusted = stored.trusted.unwrap_or(false);
    let has_domain = domain.is_some();

    let missing = !has_domain;
    // A trusted entry is a settled answer; it never sits in the review queue.
    let needs_review = if trusted {
        false
    } else {
        stored.needs_review.unwrap_or(!has_domain)
    };

    let consistent = complete
        && stored.missing == Some(missing)
        && stored.needs_review == Some(needs_review)
        && (has_domain || !raw_domain_present);

    let entry = OverlayEntry {
        domain,
        needs_review,
        missing,
        trusted,
    };
    let how = if consistent {
        Normalization::Current
    } else {
        Normalization::Repaired
    };
    (entry, how)
}

/// A readable domain next to a mistyped flag is kept, but sent back for review.
fn salvage_domain(domain: Option<String>) -> (OverlayEntry, Normalization) {
    match clean_domain(domain) {
        Some(domain) => {
            let entry = OverlayEntry {
                domain: Some(domain),
                needs_review: true,
                missing: false,
                trusted: false,
            };
            (entry, Normalization::Repaired)
        }
        None => (OverlayEntry::unresolved(), Normalization::Unreadable),
    }
}

/// Trim, lowercase, and drop empty domains and a leading `www.`.
fn clean_domain(domain: Option<String>) -> Option<String> {
    let domain = domain?.trim().to_ascii_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain).to_string();
    (!domain.is_empty()).then_some(domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_string_becomes_trusted() {
        let (entry, how) = normalize_entry(json!("Komplett.no"));
        assert_eq!(how, Normalization::LegacyString);
        assert_eq!(entry.domain.as_deref(), Some("komplett.no"));
        assert!(entry.trusted);
        assert!(!entry.needs_review);
        assert!(!entry.missing);
    }

    #[test]
    fn legacy_null_is_unresolved() {
        let (entry, how) = normalize_entry(Value::Null);
        assert_eq!(how, Normalization::LegacyNull);
        assert_eq!(entry, OverlayEntry::unresolved());
        assert!(entry.missing && entry.needs_review && !entry.trusted);
    }

    #[test]
    fn empty_string_is_unresolved() {
        let (entry, how) = normalize_entry(json!("  "));
        assert_eq!(how, Normalization::LegacyNull);
        assert!(entry.domain.is_none());
    }

    #[test]
    fn current_object_is_untouched() {
        let (entry, how) = normalize_entry(json!({
            "domain": "acme.no",
            "needs_review": true,
            "missing": false,
            "trusted": false
        }));
        assert_eq!(how, Normalization::Current);
        assert_eq!(entry.domain.as_deref(), Some("acme.no"));
        assert!(entry.needs_review);
    }

    #[test]
    fn partial_object_gets_defaults() {
        let (entry, how) = normalize_entry(json!({ "domain": "acme.no", "trusted": true }));
        assert_eq!(how, Normalization::Repaired);
        assert!(entry.trusted);
        assert!(!entry.needs_review);
        assert!(!entry.missing);
    }

    #[test]
    fn camel_case_fields_are_accepted() {
        let (entry, _) = normalize_entry(json!({
            "domain": null,
            "needsReview": true,
            "missing": true,
            "trusted": false
        }));
        assert!(entry.needs_review);
        assert!(entry.missing);
    }

    #[test]
    fn contradictions_are_repaired() {
        // Domain present but flagged missing; trusted but flagged for review.
        let (entry, how) = normalize_entry(json!({
            "domain": "acme.no",
            "needs_review": true,
            "missing": true,
            "trusted": true
        }));
        assert_eq!(how, Normalization::Repaired);
        assert!(!entry.missing);
        assert!(!entry.needs_review);
    }

    #[test]
    fn wrong_types_are_unreadable() {
        for value in [
            json!(42),
            json!(true),
            json!(["a"]),
            json!({ "domain": 7 }),
            json!({ "domain": null, "trusted": "yes" }),
        ] {
            let (entry, how) = normalize_entry(value);
            assert_eq!(how, Normalization::Unreadable);
            assert_eq!(entry, OverlayEntry::unresolved());
        }
    }

    #[test]
    fn mistyped_flag_keeps_domain_for_review() {
        let (entry, how) = normalize_entry(json!({ "domain": "Acme.no", "trusted": "yes" }));
        assert_eq!(how, Normalization::Repaired);
        assert_eq!(entry.domain.as_deref(), Some("acme.no"));
        assert!(entry.needs_review);
        assert!(!entry.trusted);
        assert!(!entry.missing);
    }
}
