//! Shared types, error model, and configuration for bonusmap.
//!
//! This crate is the foundation depended on by all other bonusmap crates.
//! It provides:
//! - [`BonusmapError`], the unified error type
//! - Domain types ([`MerchantRecord`], [`Candidate`], [`Resolution`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, PathsConfig, ResolutionConfig, SourcesConfig, ValidatorConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{BonusmapError, OverlayOp, Result};
pub use types::{
    Candidate, ConfidenceClass, MerchantRecord, Provenance, Resolution, ResolvedMerchant, Reward,
    RunId, fold_ascii, is_usable_identifier,
};
