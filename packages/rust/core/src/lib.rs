//! Domain resolution core for bonusmap.
//!
//! This crate ties the signal extractors, the correction overlay, and the
//! liveness validator into the resolution engine, folds results back into the
//! overlay, and runs the end-to-end fetch → resolve → reconcile workflow.

pub mod engine;
pub mod pipeline;
pub mod reconcile;

pub use engine::{Engine, EngineSettings};
pub use pipeline::{
    ProgressReporter, RunConfig, RunResult, SilentProgress, load_records, resolve_records, run,
};
pub use reconcile::{Exporter, JsonExporter, ReconcileReport, fold, reconcile};
