//! The persisted per-merchant decision.

use bonusmap_shared::Resolution;
use serde::{Deserialize, Serialize};

/// One overlay record. Serialized with exactly these four fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry {
    /// Canonical domain, `null` when unresolved.
    pub domain: Option<String>,
    /// Waiting for a human to confirm or correct.
    pub needs_review: bool,
    /// No domain could be produced.
    pub missing: bool,
    /// Curated floor: later runs never replace this entry.
    pub trusted: bool,
}

impl OverlayEntry {
    /// A manually accepted answer.
    pub fn accepted(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            needs_review: false,
            missing: false,
            trusted: true,
        }
    }

    /// Seen but never resolved.
    pub fn unresolved() -> Self {
        Self {
            domain: None,
            needs_review: true,
            missing: true,
            trusted: false,
        }
    }

    /// The entry a run records for its resolution.
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let domain = (!resolution.is_missing()).then(|| resolution.domain().to_string());
        Self {
            missing: domain.is_none(),
            domain,
            needs_review: resolution.needs_review(),
            trusted: resolution.is_trusted(),
        }
    }

    /// Trusted and carrying a usable domain.
    pub fn trusted_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .filter(|d| self.trusted && !d.is_empty())
    }

    /// A domain that was published without review in an earlier run.
    pub fn settled_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .filter(|d| !self.needs_review && !d.is_empty())
    }

    /// Strength used to decide whether an update may replace this entry.
    pub(crate) fn rank(&self) -> u8 {
        match (self.trusted, self.domain.is_some(), self.needs_review) {
            (true, _, _) => 3,
            (false, true, false) => 2,
            (false, true, true) => 1,
            (false, false, _) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonusmap_shared::Provenance;

    #[test]
    fn serializes_all_four_fields() {
        let json = serde_json::to_value(OverlayEntry::unresolved()).expect("serialize");
        let obj = json.as_object().expect("object");
        assert_eq!(obj.len(), 4);
        assert!(obj["domain"].is_null());
        assert_eq!(obj["needs_review"], true);
    }

    #[test]
    fn from_trusted_resolution() {
        let entry = OverlayEntry::from_resolution(&Resolution::trusted("acme.no", Provenance::Description));
        assert_eq!(entry, OverlayEntry::accepted("acme.no"));
    }

    #[test]
    fn from_guess_and_missing() {
        let entry = OverlayEntry::from_resolution(&Resolution::guess("acme.com", Provenance::GenericHeuristic));
        assert_eq!(entry.domain.as_deref(), Some("acme.com"));
        assert!(entry.needs_review);
        assert!(!entry.trusted);

        let entry = OverlayEntry::from_resolution(&Resolution::missing());
        assert_eq!(entry, OverlayEntry::unresolved());
    }

    #[test]
    fn from_inferred_is_settled_not_trusted() {
        let entry = OverlayEntry::from_resolution(&Resolution::inferred("shop.no", Provenance::RedirectUrl));
        assert!(!entry.trusted);
        assert_eq!(entry.settled_domain(), Some("shop.no"));
        assert_eq!(entry.trusted_domain(), None);
    }

    #[test]
    fn trusted_without_domain_is_not_usable() {
        let entry = OverlayEntry {
            domain: None,
            needs_review: false,
            missing: true,
            trusted: true,
        };
        assert_eq!(entry.trusted_domain(), None);
        assert_eq!(entry.rank(), 3);
    }
}
