pub mod article;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod export;
pub mod resolver;
pub mod source;
pub mod store;
pub mod watcher;

// Re-export the types front ends touch on every interaction.
pub use article::{Article, UNKNOWN_ACCOUNT};
pub use config::HarvestConfig;
pub use context::HarvestContext;
pub use engine::{CollectionEngine, EngineEvent, EngineState, RunOutcome, RunStats};
pub use error::{HarvestError, Result};
pub use store::{ArticleStore, StoreSnapshot};
pub use watcher::Readiness;
