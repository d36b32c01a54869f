//! The source seam: everything the harvester knows about the page it reads.
//!
//! The collection engine and the readiness watcher depend only on the
//! [`SourceAdapter`] trait, never on a concrete rendering surface, so the
//! whole pipeline runs against the scripted fake in tests and the CLI.

mod adapter;
mod scripted;

pub use adapter::{MutationEvent, MutationKind, PageInfo, RawItem, SourceAdapter, WatchRegion};
pub use scripted::{ScriptedPage, ScriptedSource};
