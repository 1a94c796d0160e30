//! End-to-end run: fetch listings → resolve domains → reconcile overlay and export.

use std::path::PathBuf;
use std::time::Instant;

use bonusmap_liveness::{HttpValidator, SkipValidation, Validator};
use bonusmap_overlay::{Overlay, OverlayStore};
use bonusmap_shared::{
    AppConfig, BonusmapError, MerchantRecord, Result, RunId, SourcesConfig, ValidatorConfig,
};
use bonusmap_sources::{Fetcher, Program};
use tracing::{info, instrument, warn};

use crate::engine::{Engine, EngineSettings};
use crate::reconcile::{JsonExporter, ReconcileReport, reconcile};

/// Configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Programs to fetch (ignored by [`resolve_records`]).
    pub programs: Vec<Program>,
    /// Overlay file to read and rewrite.
    pub overlay_path: PathBuf,
    /// Where the resolved set is exported.
    pub output_path: PathBuf,
    /// Probe country guesses over HTTP.
    pub validate: bool,
    pub engine: EngineSettings,
    pub validator: ValidatorConfig,
    pub sources: SourcesConfig,
}

impl RunConfig {
    /// Defaults from the loaded configuration; CLI flags override fields afterwards.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            programs: Program::ALL.to_vec(),
            overlay_path: PathBuf::from(&config.paths.overlay),
            output_path: PathBuf::from(&config.paths.output),
            validate: config.resolution.validate,
            engine: EngineSettings::from_config(config),
            validator: config.validator.clone(),
            sources: config.sources.clone(),
        }
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    /// Merchant records resolved.
    pub merchants: usize,
    pub trusted: usize,
    pub needs_review: usize,
    pub missing: usize,
    pub report: ReconcileReport,
    /// Output file written.
    pub output_path: PathBuf,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a program listing was fetched.
    fn program_fetched(&self, program: &str, merchants: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn program_fetched(&self, _program: &str, _merchants: usize) {}
    fn done(&self, _result: &RunResult) {}
}

/// Fetch every configured program, then resolve and reconcile.
///
/// A program whose listing cannot be fetched is logged and skipped; the run
/// fails only if none of them could be fetched, so that an outage never
/// overwrites a good export with an empty one.
#[instrument(skip_all, fields(programs = config.programs.len()))]
pub async fn run(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<RunResult> {
    // Load first: a corrupt overlay aborts before any network traffic.
    let (store, overlay) = open_overlay(config, progress)?;

    let fetcher = Fetcher::new(&config.sources)?;
    let mut records: Vec<MerchantRecord> = Vec::new();
    let mut fetched_any = false;

    for program in &config.programs {
        progress.phase(&format!("Fetching {program} listing"));
        match fetcher.fetch(*program).await {
            Ok(found) => {
                info!(%program, merchants = found.len(), "listing fetched");
                progress.program_fetched(program.as_str(), found.len());
                records.extend(found);
                fetched_any = true;
            }
            Err(e) => warn!(%program, error = %e, "listing fetch failed, skipping program"),
        }
    }

    if !fetched_any && !config.programs.is_empty() {
        return Err(BonusmapError::Network(
            "no program listing could be fetched".into(),
        ));
    }

    resolve_loaded(records, store, overlay, config, progress).await
}

/// Resolve already-collected records and reconcile.
#[instrument(skip_all, fields(records = records.len(), validate = config.validate))]
pub async fn resolve_records(
    records: Vec<MerchantRecord>,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let (store, overlay) = open_overlay(config, progress)?;
    resolve_loaded(records, store, overlay, config, progress).await
}

fn open_overlay(config: &RunConfig, progress: &dyn ProgressReporter) -> Result<(OverlayStore, Overlay)> {
    progress.phase("Loading overlay");
    let store = OverlayStore::new(&config.overlay_path);
    let (overlay, load) = store.load_with_report()?;
    if load.legacy_upgraded > 0 || load.repaired > 0 || !load.unreadable.is_empty() {
        info!(
            legacy = load.legacy_upgraded,
            repaired = load.repaired,
            unreadable = load.unreadable.len(),
            "overlay entries normalized"
        );
    }
    Ok((store, overlay))
}

async fn resolve_loaded(
    records: Vec<MerchantRecord>,
    store: OverlayStore,
    overlay: Overlay,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    if config.validate {
        let engine = Engine::new(HttpValidator::new(&config.validator)?, config.engine.clone());
        resolve_with(engine, records, store, overlay, config, progress).await
    } else {
        let engine = Engine::new(SkipValidation, config.engine.clone());
        resolve_with(engine, records, store, overlay, config, progress).await
    }
}

async fn resolve_with<V: Validator + 'static>(
    engine: Engine<V>,
    records: Vec<MerchantRecord>,
    store: OverlayStore,
    mut overlay: Overlay,
    config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    info!(%run_id, records = records.len(), "starting resolution run");

    progress.phase("Resolving domains");
    let resolved = engine.resolve_batch(records, &overlay).await;

    progress.phase("Writing overlay and export");
    let exporter = JsonExporter::new(&config.output_path);
    let report = reconcile(&run_id, &store, &mut overlay, &resolved, &exporter)?;

    let result = RunResult {
        run_id,
        merchants: resolved.len(),
        trusted: resolved.iter().filter(|r| r.resolution.is_trusted()).count(),
        needs_review: resolved.iter().filter(|r| r.resolution.needs_review()).count(),
        missing: resolved.iter().filter(|r| r.resolution.is_missing()).count(),
        report,
        output_path: config.output_path.clone(),
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %result.run_id,
        merchants = result.merchants,
        trusted = result.trusted,
        needs_review = result.needs_review,
        missing = result.missing,
        elapsed_ms = result.elapsed.as_millis(),
        "run completed"
    );
    progress.done(&result);
    Ok(result)
}

/// Read merchant records from a JSON array file.
pub fn load_records(path: &std::path::Path) -> Result<Vec<MerchantRecord>> {
    let content = std::fs::read_to_string(path).map_err(|e| BonusmapError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| {
        BonusmapError::parse(format!("invalid merchant records in {}: {e}", path.display()))
    })
}
