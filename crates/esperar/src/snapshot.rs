//! Snapshot assertions over serialized element state.
//!
//! Baselines are JSON files under a snapshot directory, one per snapshot
//! name. A missing baseline is written on first use; update mode overwrites
//! on mismatch. Comparison feeds the same pass/fail contract as every other
//! matcher.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::ElementOps;
use crate::format;
use crate::matcher::MatcherResult;
use crate::result::EsperarResult;

/// Configuration for snapshot assertions
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Whether to overwrite baselines on mismatch
    pub update_snapshots: bool,
    /// Directory holding baseline files
    pub snapshot_dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            update_snapshots: false,
            snapshot_dir: PathBuf::from("__snapshots__"),
        }
    }
}

impl SnapshotConfig {
    /// Set update mode
    #[must_use]
    pub const fn with_update(mut self, update: bool) -> Self {
        self.update_snapshots = update;
        self
    }

    /// Set the snapshot directory
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = dir.into();
        self
    }
}

/// Serialized state of one element, the unit of snapshot comparison
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Selector the element was located with
    pub selector: String,
    /// Tag name
    pub tag_name: String,
    /// Visible text
    pub text: String,
    /// Outer HTML
    pub html: String,
}

impl ElementSnapshot {
    /// Capture the current state of an element
    pub fn capture(element: &dyn ElementOps) -> EsperarResult<Self> {
        Ok(Self {
            selector: element.selector().to_string(),
            tag_name: element.get_tag_name()?,
            text: element.get_text()?,
            html: element.get_html()?,
        })
    }
}

/// Baseline store binding a config to the filesystem
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    config: SnapshotConfig,
}

impl SnapshotStore {
    /// Create a store with a config
    #[must_use]
    pub const fn new(config: SnapshotConfig) -> Self {
        Self { config }
    }

    /// Baseline path for a snapshot name
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        let file: String = name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        self.config.snapshot_dir.join(format!("{file}.json"))
    }

    /// Load a baseline, `None` when it does not exist
    pub fn load(&self, name: &str) -> EsperarResult<Option<serde_json::Value>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write a baseline
    pub fn save(&self, name: &str, value: &serde_json::Value) -> EsperarResult<()> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        debug!(name, path = %path.display(), "snapshot written");
        Ok(())
    }

    /// Compare a value against its baseline.
    ///
    /// Missing baseline: the value is written and the assertion passes.
    /// Update mode: a mismatched baseline is overwritten and the assertion
    /// passes. Otherwise a mismatch fails with an `Expected`/`Received`
    /// diff.
    pub fn assert_matches(
        &self,
        name: &str,
        actual: &serde_json::Value,
    ) -> EsperarResult<MatcherResult> {
        let Some(baseline) = self.load(name)? else {
            self.save(name, actual)?;
            return Ok(MatcherResult::pass());
        };

        if baseline == *actual {
            return Ok(MatcherResult::pass());
        }

        if self.config.update_snapshots {
            self.save(name, actual)?;
            return Ok(MatcherResult::pass());
        }

        let name = name.to_string();
        let actual = actual.clone();
        Ok(MatcherResult::fail(move || {
            format::build_message(
                None,
                &format::heading(&format!("snapshot \"{name}\""), false, "match"),
                &format::expected_received(&baseline, &actual, false),
            )
        }))
    }

    /// Snapshot directory in use
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.snapshot_dir
    }
}
