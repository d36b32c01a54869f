//! Timing configuration for the harvesting components.
//!
//! Every wait the system performs is driven by a value in [`HarvestConfig`]
//! so that front ends can override them from a settings file and tests can
//! shrink them to keep runs fast.

use crate::error::{HarvestError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for watching, resolving, and collecting.
///
/// A TOML settings file only needs to name the fields it overrides;
/// everything else keeps its default.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HarvestConfig {
    /// Quiet window after the last dialog-region mutation before the
    /// dialog check runs.
    pub dialog_debounce_ms: u64,
    /// Quiet window after the last list-region mutation before readiness
    /// is recomputed.
    pub list_debounce_ms: u64,
    /// Deadline for reading the account label before falling back to the
    /// unknown-account placeholder.
    pub label_deadline_ms: u64,
    /// Inclusive lower bound of the randomized inter-page delay.
    pub page_delay_min_ms: u64,
    /// Exclusive upper bound of the randomized inter-page delay.
    pub page_delay_max_ms: u64,
    /// Fixed delay after advancing pages, giving the next page time to
    /// render before it is read.
    pub settle_delay_ms: u64,
    /// Period of the background account label re-check.
    pub account_recheck_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            dialog_debounce_ms: 300,
            list_debounce_ms: 500,
            label_deadline_ms: 1000,
            page_delay_min_ms: 1000,
            page_delay_max_ms: 3000,
            settle_delay_ms: 1000,
            account_recheck_secs: 5,
        }
    }
}

impl HarvestConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// A missing file yields the defaults; an unreadable or malformed file
    /// is an error so that a typo in a settings file does not silently
    /// revert every timing to its default.
    pub fn load_or_default(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| HarvestError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn dialog_debounce(&self) -> Duration {
        Duration::from_millis(self.dialog_debounce_ms)
    }

    pub fn list_debounce(&self) -> Duration {
        Duration::from_millis(self.list_debounce_ms)
    }

    pub fn label_deadline(&self) -> Duration {
        Duration::from_millis(self.label_deadline_ms)
    }

    pub fn page_delay_min(&self) -> Duration {
        Duration::from_millis(self.page_delay_min_ms)
    }

    pub fn page_delay_max(&self) -> Duration {
        Duration::from_millis(self.page_delay_max_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn account_recheck(&self) -> Duration {
        Duration::from_secs(self.account_recheck_secs)
    }
}
