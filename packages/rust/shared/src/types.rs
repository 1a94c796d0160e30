//! Core domain types for merchant domain resolution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one resolution run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MerchantRecord
// ---------------------------------------------------------------------------

/// A merchant as listed by one loyalty program, already normalized by its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantRecord {
    /// Stable key across runs; sources use the trimmed display name, as legacy overlays do.
    pub identifier: String,
    /// Name as shown by the program.
    pub display_name: String,
    /// Free-text blurb from the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Affiliate/redirect link from the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    /// Program tag, e.g. `trumf` or `sas`.
    pub program: String,
    /// Earning rules, passed through to the export untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewards: Vec<Reward>,
}

impl MerchantRecord {
    /// Minimal record with only an identifier and a name.
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            description: None,
            redirect_url: None,
            program: program.into(),
            rewards: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_redirect(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }
}

/// One earning rule of a merchant listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reward {
    /// Percent of the purchase amount.
    Percentage {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    /// Fixed bonus in NOK.
    FixedBonus {
        value: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
    },
    /// Points per 100 NOK spent.
    #[serde(rename = "per_100kr")]
    Per100Kr { value: u32 },
    /// One-off points for the first purchase.
    SignupBonus { value: u32 },
}

// ---------------------------------------------------------------------------
// Candidates and confidence
// ---------------------------------------------------------------------------

/// How much a proposed domain can be relied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceClass {
    /// Curated in the overlay, parsed from real text, or validated live.
    Trusted,
    /// Extracted from a concrete signal but not confirmed.
    Inferred,
    /// Guessed from the identifier alone.
    Heuristic,
    /// Nothing could be proposed.
    Unknown,
}

impl ConfidenceClass {
    /// Ordering key, higher is stronger.
    pub fn rank(self) -> u8 {
        match self {
            Self::Trusted => 3,
            Self::Inferred => 2,
            Self::Heuristic => 1,
            Self::Unknown => 0,
        }
    }
}

impl std::fmt::Display for ConfidenceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trusted => "trusted",
            Self::Inferred => "inferred",
            Self::Heuristic => "heuristic",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Which signal produced a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Overlay,
    Description,
    RedirectUrl,
    CountryHeuristic,
    GenericHeuristic,
}

/// A domain proposed by one extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub domain: String,
    pub class: ConfidenceClass,
    pub provenance: Provenance,
}

impl Candidate {
    pub fn new(domain: impl Into<String>, class: ConfidenceClass, provenance: Provenance) -> Self {
        Self {
            domain: domain.into(),
            class,
            provenance,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// The engine's decision for one merchant.
///
/// Built only through the constructors, which keep two invariants:
/// a missing resolution has an empty domain, and a trusted one never
/// needs review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    domain: String,
    confidence: ConfidenceClass,
    needs_review: bool,
    is_missing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provenance: Option<Provenance>,
}

impl Resolution {
    /// Accepted as ground truth.
    pub fn trusted(domain: impl Into<String>, provenance: Provenance) -> Self {
        Self::present(domain.into(), ConfidenceClass::Trusted, false, provenance)
    }

    /// Backed by a concrete signal; good enough to publish without review.
    pub fn inferred(domain: impl Into<String>, provenance: Provenance) -> Self {
        Self::present(domain.into(), ConfidenceClass::Inferred, false, provenance)
    }

    /// Unsupported guess, flagged for a human.
    pub fn guess(domain: impl Into<String>, provenance: Provenance) -> Self {
        Self::present(domain.into(), ConfidenceClass::Heuristic, true, provenance)
    }

    /// No domain at all.
    pub fn missing() -> Self {
        Self {
            domain: String::new(),
            confidence: ConfidenceClass::Unknown,
            needs_review: true,
            is_missing: true,
            provenance: None,
        }
    }

    fn present(domain: String, confidence: ConfidenceClass, needs_review: bool, provenance: Provenance) -> Self {
        if domain.is_empty() {
            return Self::missing();
        }
        Self {
            domain,
            confidence,
            needs_review,
            is_missing: false,
            provenance: Some(provenance),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn confidence(&self) -> ConfidenceClass {
        self.confidence
    }

    pub fn needs_review(&self) -> bool {
        self.needs_review
    }

    pub fn is_missing(&self) -> bool {
        self.is_missing
    }

    pub fn is_trusted(&self) -> bool {
        self.confidence == ConfidenceClass::Trusted
    }

    pub fn provenance(&self) -> Option<Provenance> {
        self.provenance
    }
}

/// A merchant record paired with its resolution.
#[derive(Debug, Clone)]
pub struct ResolvedMerchant {
    pub record: MerchantRecord,
    pub resolution: Resolution,
}

// ---------------------------------------------------------------------------
// Identifier helpers
// ---------------------------------------------------------------------------

/// Map Nordic and accented letters to their usual ASCII spelling in domains.
pub fn fold_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'æ' | 'Æ' => out.push_str("ae"),
            'ø' | 'Ø' | 'ö' | 'Ö' | 'ó' | 'ò' => out.push('o'),
            'å' | 'Å' | 'ä' | 'Ä' | 'á' | 'à' => out.push('a'),
            'é' | 'è' | 'ë' | 'É' => out.push('e'),
            'ü' | 'ú' | 'Ü' => out.push('u'),
            _ => out.push(c),
        }
    }
    out
}

/// An identifier can key the overlay only if it has a letter or digit.
pub fn is_usable_identifier(identifier: &str) -> bool {
    fold_ascii(identifier.trim()).chars().any(char::is_alphanumeric)
}
