//! Durable correction overlay: identifier → curated domain decision.
//!
//! The [`OverlayStore`] reads the overlay file once at the start of a run and
//! rewrites it in full at the end. The file is a human-editable JSON object,
//! keys sorted, written atomically (temp file + rename).
//!
//! **Rules:**
//! - Identifiers are never removed; the overlay only grows.
//! - A `trusted` entry is never replaced by a run, only by a human edit.
//! - Legacy shapes (bare strings, `null`) are upgraded at load.

mod entry;
mod migrations;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bonusmap_shared::{BonusmapError, OverlayOp, Result, is_usable_identifier};
use serde_json::Value;
use tracing::{debug, info, warn};

pub use entry::OverlayEntry;
pub use migrations::Normalization;

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// What [`Overlay::merge`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Identifier seen for the first time.
    Inserted,
    /// Existing entry replaced.
    Updated,
    /// Update identical to the stored entry.
    Unchanged,
    /// Stored entry is trusted and was left alone.
    KeptTrusted,
    /// Stored entry is stronger than the update (e.g. a settled answer vs a guess).
    KeptStronger,
    /// Blank identifier, nothing stored.
    Skipped,
}

/// In-memory overlay mapping, scoped to a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    entries: BTreeMap<String, OverlayEntry>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&OverlayEntry> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OverlayEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The human backlog: entries still waiting for review.
    pub fn needing_review(&self) -> impl Iterator<Item = (&str, &OverlayEntry)> {
        self.iter().filter(|(_, e)| e.needs_review)
    }

    /// Fold one run's decision into the overlay.
    ///
    /// Trusted entries are a floor and are never replaced. Otherwise the update
    /// wins unless the stored entry is stronger (a settled domain is not
    /// replaced by a guess that still needs review).
    pub fn merge(&mut self, identifier: &str, update: OverlayEntry) -> MergeOutcome {
        if !is_usable_identifier(identifier) {
            return MergeOutcome::Skipped;
        }

        match self.entries.get_mut(identifier) {
            None => {
                self.entries.insert(identifier.to_string(), update);
                MergeOutcome::Inserted
            }
            Some(existing) if existing.trusted => MergeOutcome::KeptTrusted,
            Some(existing) if *existing == update => MergeOutcome::Unchanged,
            Some(existing) if existing.rank() > update.rank() => MergeOutcome::KeptStronger,
            Some(existing) => {
                *existing = update;
                MergeOutcome::Updated
            }
        }
    }
}

impl FromIterator<(String, OverlayEntry)> for Overlay {
    fn from_iter<I: IntoIterator<Item = (String, OverlayEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Counts of legacy or damaged entries upgraded during [`OverlayStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub entries: usize,
    pub legacy_upgraded: usize,
    pub repaired: usize,
    pub unreadable: Vec<String>,
}

/// File-backed overlay.
#[derive(Debug, Clone)]
pub struct OverlayStore {
    path: PathBuf,
}

impl OverlayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the overlay. A missing file is an empty overlay.
    pub fn load(&self) -> Result<Overlay> {
        self.load_with_report().map(|(overlay, _)| overlay)
    }

    /// Load the overlay and report which entries had to be upgraded.
    pub fn load_with_report(&self) -> Result<(Overlay, LoadReport)> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "overlay not found, starting empty");
                return Ok((Overlay::new(), LoadReport::default()));
            }
            Err(e) => {
                return Err(BonusmapError::overlay(OverlayOp::Load, &self.path, e.to_string()));
            }
        };

        if content.trim().is_empty() {
            warn!(path = %self.path.display(), "overlay file is empty, starting empty");
            return Ok((Overlay::new(), LoadReport::default()));
        }

        let raw: Value = serde_json::from_str(&content).map_err(|e| {
            BonusmapError::overlay(OverlayOp::Load, &self.path, format!("not valid JSON: {e}"))
        })?;

        let Value::Object(map) = raw else {
            return Err(BonusmapError::overlay(
                OverlayOp::Load,
                &self.path,
                "top level must be a JSON object of identifier → entry",
            ));
        };

        let mut report = LoadReport::default();
        let mut entries = BTreeMap::new();

        for (identifier, value) in map {
            let (entry, how) = migrations::normalize_entry(value);
            match how {
                Normalization::Current => {}
                Normalization::LegacyString | Normalization::LegacyNull => {
                    report.legacy_upgraded += 1;
                }
                Normalization::Repaired => {
                    debug!(%identifier, "overlay entry repaired");
                    report.repaired += 1;
                }
                Normalization::Unreadable => {
                    let err = BonusmapError::overlay_entry(
                        OverlayOp::Load,
                        &identifier,
                        &self.path,
                        "unreadable value, reset to unresolved",
                    );
                    warn!(%identifier, error = %err, "overlay entry reset");
                    report.unreadable.push(identifier.clone());
                }
            }
            entries.insert(identifier, entry);
        }

        report.entries = entries.len();
        info!(
            path = %self.path.display(),
            entries = report.entries,
            legacy_upgraded = report.legacy_upgraded,
            repaired = report.repaired,
            unreadable = report.unreadable.len(),
            "overlay loaded"
        );

        Ok((Overlay { entries }, report))
    }

    /// Rewrite the whole overlay atomically with sorted keys.
    pub fn save(&self, overlay: &Overlay) -> Result<()> {
        let json = serde_json::to_string_pretty(&overlay.entries).map_err(|e| {
            BonusmapError::overlay(OverlayOp::Save, &self.path, format!("serialization failed: {e}"))
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BonusmapError::overlay(OverlayOp::Save, &self.path, e.to_string())
            })?;
        }

        let temp = temp_path(&self.path);
        std::fs::write(&temp, format!("{json}\n"))
            .map_err(|e| BonusmapError::overlay(OverlayOp::Save, &temp, e.to_string()))?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(BonusmapError::overlay(OverlayOp::Save, &self.path, e.to_string()));
        }

        info!(path = %self.path.display(), entries = overlay.len(), "overlay saved");
        Ok(())
    }
}

/// Sibling temp file, so the rename stays on one filesystem.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "overlay.json".into());
    path.with_file_name(format!(".{name}.tmp"))
}
