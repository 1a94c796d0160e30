//! Application configuration for bonusmap.
//!
//! User config lives at `~/.bonusmap/bonusmap.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BonusmapError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "bonusmap.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".bonusmap";

// ---------------------------------------------------------------------------
// Config structs (matching bonusmap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Resolution engine settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Liveness validator settings.
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Upstream program listings.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Overlay file (identifier → curated domain).
    #[serde(default = "default_overlay")]
    pub overlay: String,

    /// Resolved shop export.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            overlay: default_overlay(),
            output: default_output(),
        }
    }
}

fn default_overlay() -> String {
    "scraper/patches.json".into()
}
fn default_output() -> String {
    "shops.json".into()
}

/// `[resolution]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Top-level domain appended by the generic heuristic.
    #[serde(default = "default_tld")]
    pub default_tld: String,

    /// Whether country guesses are checked against the live web.
    #[serde(default = "default_true")]
    pub validate: bool,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            default_tld: default_tld(),
            validate: true,
        }
    }
}

fn default_tld() -> String {
    "com".into()
}
fn default_true() -> bool {
    true
}

/// `[validator]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Per-probe timeout in seconds.
    #[serde(default = "default_validator_timeout")]
    pub timeout_secs: u64,

    /// Maximum probes in flight.
    #[serde(default = "default_validator_concurrency")]
    pub concurrency: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_validator_timeout(),
            concurrency: default_validator_concurrency(),
        }
    }
}

fn default_validator_timeout() -> u64 {
    5
}
fn default_validator_concurrency() -> usize {
    4
}

/// `[sources]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Trumf Netthandel category index.
    #[serde(default = "default_trumf_url")]
    pub trumf_url: String,

    /// SAS Online Shopping store listing; the page number is appended.
    #[serde(default = "default_sas_url")]
    pub sas_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on paginated listing pages.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            trumf_url: default_trumf_url(),
            sas_url: default_sas_url(),
            request_timeout_secs: default_request_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_trumf_url() -> String {
    "https://trumfnetthandel.no/kategori".into()
}
fn default_sas_url() -> String {
    "https://onlineshopping.flysas.com/nb-NO/alle-butikker/".into()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_max_pages() -> u32 {
    100
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.bonusmap/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BonusmapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.bonusmap/bonusmap.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BonusmapError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        BonusmapError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    config.validate()?;
    Ok(config)
}

impl AppConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let tld = self.resolution.default_tld.trim_start_matches('.');
        if tld.is_empty() || !tld.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BonusmapError::config(format!(
                "resolution.default_tld must be a bare top-level domain, got '{}'",
                self.resolution.default_tld
            )));
        }
        if self.validator.concurrency == 0 {
            return Err(BonusmapError::config("validator.concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BonusmapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BonusmapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BonusmapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
