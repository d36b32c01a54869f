//! Source adapter trait.
//!
//! Defines the capability surface the harvester consumes: fresh reads of
//! the rendered list, pagination state, the account label, and a change
//! feed standing in for structural mutation observation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One rendered list item, fields exactly as read.
///
/// Every field is optional: a half-rendered or malformed item surfaces as
/// `None` fields, and the engine decides whether to skip it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub date_text: Option<String>,
}

impl RawItem {
    pub fn new(
        title: impl Into<Option<String>>,
        url: impl Into<Option<String>>,
        date_text: impl Into<Option<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            date_text: date_text.into(),
        }
    }
}

/// Current/total page indicator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub current: u32,
    pub total: u32,
}

static INDICATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").unwrap());

impl PageInfo {
    /// Parses a rendered indicator such as `"3 / 12"`.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = INDICATOR_RE.captures(text)?;
        let current = captures[1].parse().ok()?;
        let total = captures[2].parse().ok()?;
        Some(Self { current, total })
    }
}

/// Which observed region a mutation happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRegion {
    /// The transient container whose appearance signals the source is
    /// ready to be harvested.
    Dialog,
    /// The paginated list itself.
    List,
}

/// Kind of structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Remove,
}

/// One structural change in an observed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationEvent {
    pub region: WatchRegion,
    pub kind: MutationKind,
}

/// The rendered surface being harvested.
///
/// All reads are fresh: implementations must not cache across calls,
/// because the list re-renders between pages. `advance_to_next_page` is
/// fire-and-forget; its effect is observed through subsequent reads.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Reads the currently rendered list items.
    async fn list_items(&self) -> Vec<RawItem>;

    /// Reads the pagination indicator, if one is rendered.
    async fn pagination_info(&self) -> Option<PageInfo>;

    /// Whether a next-page affordance is currently available.
    async fn has_next_page(&self) -> bool;

    /// Triggers navigation to the next page.
    async fn advance_to_next_page(&self);

    /// Reads the source's display name, if present.
    async fn account_label(&self) -> Option<String>;

    /// Whether the dialog region is present and visible.
    async fn dialog_present(&self) -> bool;

    /// Returns a fresh subscription to structural change events.
    fn changes(&self) -> mpsc::UnboundedReceiver<MutationEvent>;
}
