//! Resolution engine: applies the signal precedence to one merchant at a time.
//!
//! Precedence, first success wins:
//!
//! 1. trusted overlay entry
//! 2. domain written in the description (trusted)
//! 3. destination embedded in the redirect URL (inferred)
//! 4. settled, untrusted overlay entry from an earlier run (inferred)
//! 5. country guess confirmed live (trusted)
//! 6. generic guess (needs review)
//! 7. missing
//!
//! Everything except the live check is pure and runs synchronously; the
//! checks of a batch run concurrently behind a semaphore.

use std::sync::Arc;

use bonusmap_liveness::{Liveness, Validator};
use bonusmap_overlay::Overlay;
use bonusmap_shared::{
    AppConfig, MerchantRecord, Provenance, Resolution, ResolvedMerchant, is_usable_identifier,
};
use bonusmap_signals::{country_hint, from_description, from_redirect, generic};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Engine knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// TLD used for the generic guess.
    pub default_tld: String,
    /// Maximum number of live checks in flight.
    pub concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_tld: "com".into(),
            concurrency: 4,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_tld: config.resolution.default_tld.clone(),
            concurrency: config.validator.concurrency,
        }
    }
}

/// Outcome of the synchronous steps for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    Decided(Resolution),
    /// A country guess that needs a live check before it can be trusted.
    Check { country: String, fallback: Resolution },
}

pub struct Engine<V> {
    validator: Arc<V>,
    settings: EngineSettings,
}

impl<V: Validator + 'static> Engine<V> {
    pub fn new(validator: V, settings: EngineSettings) -> Self {
        Self {
            validator: Arc::new(validator),
            settings,
        }
    }

    /// Resolve a single record against the overlay.
    pub async fn resolve_one(&self, record: &MerchantRecord, overlay: &Overlay) -> Resolution {
        match self.plan(record, overlay) {
            Plan::Decided(resolution) => resolution,
            Plan::Check { country, fallback } => {
                let liveness = self.validator.validate(&country).await;
                settle(&record.identifier, country, fallback, liveness)
            }
        }
    }

    /// Resolve a batch, preserving input order.
    #[instrument(skip_all, fields(records = records.len()))]
    pub async fn resolve_batch(
        &self,
        records: Vec<MerchantRecord>,
        overlay: &Overlay,
    ) -> Vec<ResolvedMerchant> {
        let plans: Vec<Plan> = records.iter().map(|r| self.plan(r, overlay)).collect();
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));

        let mut checks = Vec::new();
        for (index, plan) in plans.iter().enumerate() {
            if let Plan::Check { country, .. } = plan {
                let validator = Arc::clone(&self.validator);
                let sem = Arc::clone(&semaphore);
                let domain = country.clone();
                checks.push((
                    index,
                    tokio::spawn(async move {
                        let Ok(_permit) = sem.acquire_owned().await else {
                            return Liveness::Unreachable("validator pool closed".into());
                        };
                        validator.validate(&domain).await
                    }),
                ));
            }
        }

        let mut outcomes: Vec<Option<Liveness>> = vec![None; plans.len()];
        let pending = checks.len();
        for (index, handle) in checks {
            outcomes[index] = Some(match handle.await {
                Ok(liveness) => liveness,
                Err(e) => {
                    warn!(error = %e, "live check task failed");
                    Liveness::Unreachable(e.to_string())
                }
            });
        }

        let resolved: Vec<ResolvedMerchant> = records
            .into_iter()
            .zip(plans)
            .zip(outcomes)
            .map(|((record, plan), liveness)| {
                let resolution = match (plan, liveness) {
                    (Plan::Decided(resolution), _) => resolution,
                    (Plan::Check { country, fallback }, Some(liveness)) => {
                        settle(&record.identifier, country, fallback, liveness)
                    }
                    (Plan::Check { fallback, .. }, None) => fallback,
                };
                ResolvedMerchant { record, resolution }
            })
            .collect();

        info!(
            resolved = resolved.len(),
            live_checks = pending,
            review = resolved.iter().filter(|r| r.resolution.needs_review()).count(),
            missing = resolved.iter().filter(|r| r.resolution.is_missing()).count(),
            "batch resolved"
        );
        resolved
    }

    /// The synchronous steps of the precedence chain.
    fn plan(&self, record: &MerchantRecord, overlay: &Overlay) -> Plan {
        let identifier = record.identifier.trim();
        let entry = if !is_usable_identifier(identifier) {
            None
        } else {
            overlay.get(identifier)
        };

        if let Some(domain) = entry.and_then(|e| e.trusted_domain()) {
            return Plan::Decided(Resolution::trusted(domain, Provenance::Overlay));
        }

        if let Ok(candidate) = from_description(record.description.as_deref()) {
            return Plan::Decided(Resolution::trusted(candidate.domain, candidate.provenance));
        }

        if let Ok(candidate) = from_redirect(record.redirect_url.as_deref()) {
            return Plan::Decided(Resolution::inferred(candidate.domain, candidate.provenance));
        }

        if let Some(domain) = entry.and_then(|e| e.settled_domain()) {
            return Plan::Decided(Resolution::inferred(domain, Provenance::Overlay));
        }

        let fallback = match generic(identifier, &self.settings.default_tld) {
            Some(candidate) => Resolution::guess(candidate.domain, candidate.provenance),
            None => Resolution::missing(),
        };

        match country_hint(identifier, record.description.as_deref()) {
            Some(hint) => Plan::Check {
                country: hint.domain(),
                fallback,
            },
            None => Plan::Decided(fallback),
        }
    }
}

/// Turn a live-check outcome into the final resolution of a country guess.
fn settle(identifier: &str, country: String, fallback: Resolution, liveness: Liveness) -> Resolution {
    match liveness {
        Liveness::Alive(_) => Resolution::trusted(country, Provenance::CountryHeuristic),
        Liveness::Skipped => Resolution::guess(country, Provenance::CountryHeuristic),
        other => {
            debug!(identifier, %country, outcome = %other, "country guess not confirmed");
            fallback
        }
    }
}
