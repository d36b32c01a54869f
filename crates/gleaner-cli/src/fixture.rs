//! JSON fixture schema for the scripted source.
//!
//! A fixture describes what the source renders: an optional account
//! label and a sequence of pages, each with items whose fields may be
//! omitted to simulate malformed entries.
//!
//! ```json
//! {
//!   "account": "Acme Weekly",
//!   "pages": [
//!     {
//!       "indicator": "1 / 2",
//!       "items": [
//!         { "title": "Hello", "url": "https://example.com/hello", "date_text": "2024-05-01" }
//!       ]
//!     }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use gleaner_core::source::{RawItem, ScriptedPage, ScriptedSource};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub pages: Vec<FixturePage>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePage {
    #[serde(default)]
    pub indicator: Option<String>,
    #[serde(default)]
    pub items: Vec<RawItem>,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse fixture {}", path.display()))
    }

    /// Builds a scripted source with the dialog already on screen, as if
    /// the user had just opened it.
    pub fn into_source(self) -> ScriptedSource {
        let pages = self
            .pages
            .into_iter()
            .map(|page| {
                let scripted = ScriptedPage::new(page.items);
                match page.indicator {
                    Some(indicator) => scripted.with_indicator(indicator),
                    None => scripted,
                }
            })
            .collect();
        let mut source = ScriptedSource::new(pages).with_dialog_present(true);
        if let Some(account) = self.account {
            source = source.with_account(account);
        }
        source
    }
}
