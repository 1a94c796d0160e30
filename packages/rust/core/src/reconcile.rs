//! Folding a run into the overlay and publishing the resolved set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bonusmap_overlay::{MergeOutcome, Overlay, OverlayEntry, OverlayStore};
use bonusmap_shared::{
    BonusmapError, ConfidenceClass, Resolution, ResolvedMerchant, Result, Reward, RunId,
    is_usable_identifier,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What happened to the overlay during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub kept_trusted: usize,
    pub kept_stronger: usize,
    /// Records without a usable identifier.
    pub skipped: usize,
    /// Overlay entries still waiting for a human after the fold.
    pub review_backlog: usize,
    /// Shops written by the exporter.
    pub exported: usize,
}

impl ReconcileReport {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Inserted => self.inserted += 1,
            MergeOutcome::Updated => self.updated += 1,
            MergeOutcome::Unchanged => self.unchanged += 1,
            MergeOutcome::KeptTrusted => self.kept_trusted += 1,
            MergeOutcome::KeptStronger => self.kept_stronger += 1,
            MergeOutcome::Skipped => self.skipped += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Merge a run's resolutions into the overlay.
///
/// When one identifier was resolved more than once (listed by several
/// programs), the strongest resolution is folded; the first one wins ties.
pub fn fold(overlay: &mut Overlay, resolved: &[ResolvedMerchant]) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, &Resolution> = HashMap::new();

    for item in resolved {
        let identifier = item.record.identifier.trim();
        if !is_usable_identifier(identifier) {
            report.skipped += 1;
            continue;
        }
        let stronger = match best.get(identifier) {
            None => {
                order.push(identifier);
                true
            }
            Some(current) => rank(&item.resolution) > rank(current),
        };
        if stronger {
            best.insert(identifier, &item.resolution);
        }
    }

    for identifier in order {
        let resolution = best[identifier];
        let outcome = overlay.merge(identifier, OverlayEntry::from_resolution(resolution));
        debug!(identifier, ?outcome, "overlay merge");
        report.record(outcome);
    }

    report.review_backlog = overlay.needing_review().count();
    report
}

fn rank(resolution: &Resolution) -> u8 {
    if resolution.is_missing() {
        ConfidenceClass::Unknown.rank()
    } else {
        resolution.confidence().rank()
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Destination for the resolved record set.
pub trait Exporter {
    /// Write every resolved merchant; returns the number written.
    fn export(&self, run_id: &RunId, resolved: &[ResolvedMerchant]) -> Result<usize>;
}

/// One published shop.
#[derive(Debug, Serialize)]
struct ExportedShop<'a> {
    program: &'a str,
    identifier: &'a str,
    name: &'a str,
    domain: Option<&'a str>,
    confidence: ConfidenceClass,
    trusted: bool,
    needs_review: bool,
    missing: bool,
    rewards: &'a [Reward],
}

impl<'a> From<&'a ResolvedMerchant> for ExportedShop<'a> {
    fn from(item: &'a ResolvedMerchant) -> Self {
        let resolution = &item.resolution;
        Self {
            program: &item.record.program,
            identifier: &item.record.identifier,
            name: &item.record.display_name,
            domain: (!resolution.is_missing()).then(|| resolution.domain()),
            confidence: resolution.confidence(),
            trusted: resolution.is_trusted(),
            needs_review: resolution.needs_review(),
            missing: resolution.is_missing(),
            rewards: &item.record.rewards,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportEnvelope<'a> {
    run_id: &'a RunId,
    generated_at: DateTime<Utc>,
    shops: Vec<ExportedShop<'a>>,
}

/// Writes the resolved set as one pretty JSON document.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    path: PathBuf,
}

impl JsonExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for JsonExporter {
    fn export(&self, run_id: &RunId, resolved: &[ResolvedMerchant]) -> Result<usize> {
        let envelope = ExportEnvelope {
            run_id,
            generated_at: Utc::now(),
            shops: resolved.iter().map(ExportedShop::from).collect(),
        };
        let json = serde_json::to_string_pretty(&envelope)
            .map_err(|e| BonusmapError::Export(format!("serialization failed: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| BonusmapError::io(parent, e))?;
        }

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "shops.json".into());
        let temp = self.path.with_file_name(format!(".{name}.tmp"));
        std::fs::write(&temp, format!("{json}\n")).map_err(|e| BonusmapError::io(&temp, e))?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(BonusmapError::io(&self.path, e));
        }

        info!(path = %self.path.display(), shops = resolved.len(), "export written");
        Ok(resolved.len())
    }
}

// ---------------------------------------------------------------------------
// Reconcile
// ---------------------------------------------------------------------------

/// Fold, save the overlay, and export.
///
/// The save and the export are both attempted even if one fails; the run
/// only counts as successful when both succeed.
#[instrument(skip_all, fields(run_id = %run_id, overlay = %store.path().display()))]
pub fn reconcile(
    run_id: &RunId,
    store: &OverlayStore,
    overlay: &mut Overlay,
    resolved: &[ResolvedMerchant],
    exporter: &dyn Exporter,
) -> Result<ReconcileReport> {
    let mut report = fold(overlay, resolved);

    let saved = store.save(overlay);
    let exported = exporter.export(run_id, resolved);

    match (saved, exported) {
        (Ok(()), Ok(count)) => {
            report.exported = count;
            info!(
                inserted = report.inserted,
                updated = report.updated,
                kept_trusted = report.kept_trusted,
                review_backlog = report.review_backlog,
                exported = count,
                "reconciled"
            );
            Ok(report)
        }
        (Err(save_err), Ok(_)) => Err(save_err),
        (Ok(()), Err(export_err)) => Err(export_err),
        (Err(save_err), Err(export_err)) => {
            error!(error = %export_err, "export failed as well");
            Err(save_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bonusmap_shared::{MerchantRecord, Provenance};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bm-reconcile-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn resolved(identifier: &str, program: &str, resolution: Resolution) -> ResolvedMerchant {
        ResolvedMerchant {
            record: MerchantRecord::new(identifier, identifier, program),
            resolution,
        }
    }

    #[test]
    fn fold_inserts_every_identifier() {
        let mut overlay = Overlay::new();
        let run = vec![
            resolved("a", "trumf", Resolution::trusted("a.no", Provenance::Description)),
            resolved("b", "trumf", Resolution::guess("b.com", Provenance::GenericHeuristic)),
            resolved("c", "trumf", Resolution::missing()),
            resolved(" ", "trumf", Resolution::missing()),
            resolved("!!!", "sas", Resolution::missing()),
        ];

        let report = fold(&mut overlay, &run);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.skipped, 2);
        assert!(overlay.get("!!!").is_none());
        assert_eq!(report.review_backlog, 2);
        assert_eq!(overlay.len(), 3);
        assert!(overlay.get("a").unwrap().trusted);
        assert!(overlay.get("c").unwrap().missing);
    }

    #[test]
    fn fold_never_downgrades_trusted() {
        let mut overlay: Overlay = [("a".to_string(), OverlayEntry::accepted("curated.no"))]
            .into_iter()
            .collect();
        let run = vec![resolved("a", "sas", Resolution::guess("a.com", Provenance::GenericHeuristic))];

        let report = fold(&mut overlay, &run);
        assert_eq!(report.kept_trusted, 1);
        assert_eq!(overlay.get("a"), Some(&OverlayEntry::accepted("curated.no")));
    }

    #[test]
    fn fold_is_idempotent() {
        let mut overlay = Overlay::new();
        let run = vec![resolved("a", "trumf", Resolution::inferred("a.no", Provenance::RedirectUrl))];
        fold(&mut overlay, &run);
        let snapshot = overlay.clone();

        let report = fold(&mut overlay, &run);
        assert_eq!(report.unchanged, 1);
        assert_eq!(overlay, snapshot);
    }

    #[test]
    fn strongest_duplicate_wins() {
        let mut overlay = Overlay::new();
        let run = vec![
            resolved("acme", "trumf", Resolution::guess("acme.com", Provenance::GenericHeuristic)),
            resolved("acme", "sas", Resolution::inferred("acme.no", Provenance::RedirectUrl)),
            resolved("acme", "sas", Resolution::inferred("other.no", Provenance::RedirectUrl)),
        ];

        fold(&mut overlay, &run);
        let entry = overlay.get("acme").unwrap();
        assert_eq!(entry.domain.as_deref(), Some("acme.no"));
        assert!(!entry.needs_review);
    }

    #[test]
    fn export_writes_envelope() {
        let dir = temp_dir();
        let path = dir.join("out").join("shops.json");
        let exporter = JsonExporter::new(&path);
        let run_id = RunId::new();

        let mut record = MerchantRecord::new("Acme", "Acme", "trumf");
        record.rewards = vec![Reward::Percentage {
            value: 3.0,
            category: None,
        }];
        let run = vec![
            ResolvedMerchant {
                record,
                resolution: Resolution::trusted("acme.no", Provenance::Description),
            },
            resolved("Ghost", "sas", Resolution::missing()),
        ];

        assert_eq!(exporter.export(&run_id, &run).unwrap(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["run_id"], run_id.to_string());
        assert!(json["generated_at"].is_string());
        let shops = json["shops"].as_array().unwrap();
        assert_eq!(shops[0]["domain"], "acme.no");
        assert_eq!(shops[0]["confidence"], "trusted");
        assert_eq!(shops[0]["rewards"][0]["type"], "percentage");
        assert!(shops[1]["domain"].is_null());
        assert_eq!(shops[1]["missing"], true);
        assert_eq!(shops[1]["program"], "sas");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_export_rename_cleans_up() {
        let dir = temp_dir();
        let path = dir.join("shops.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        let run = vec![resolved("Acme", "trumf", Resolution::missing())];
        let err = JsonExporter::new(&path).export(&RunId::new(), &run).unwrap_err();
        assert!(matches!(err, BonusmapError::Io { .. }));
        assert!(!dir.join(".shops.json.tmp").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    struct FailingExporter;

    impl Exporter for FailingExporter {
        fn export(&self, _run_id: &RunId, _resolved: &[ResolvedMerchant]) -> Result<usize> {
            Err(BonusmapError::Export("disk full".into()))
        }
    }

    #[test]
    fn overlay_is_saved_even_when_export_fails() {
        let dir = temp_dir();
        let store = OverlayStore::new(dir.join("patches.json"));
        let mut overlay = Overlay::new();
        let run = vec![resolved("a", "trumf", Resolution::missing())];

        let result = reconcile(&RunId::new(), &store, &mut overlay, &run, &FailingExporter);
        assert!(matches!(result, Err(BonusmapError::Export(_))));
        assert!(store.load().unwrap().contains("a"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reconcile_saves_and_exports() {
        let dir = temp_dir();
        let store = OverlayStore::new(dir.join("patches.json"));
        let exporter = JsonExporter::new(dir.join("shops.json"));
        let mut overlay = Overlay::new();
        let run = vec![resolved("a", "trumf", Resolution::guess("a.com", Provenance::GenericHeuristic))];

        let report = reconcile(&RunId::new(), &store, &mut overlay, &run, &exporter).unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(report.exported, 1);
        assert!(exporter.path().exists());
        assert_eq!(store.load().unwrap(), overlay);

        std::fs::remove_dir_all(&dir).ok();
    }
}
