//! The `clear` command: destroy the stored records.

use anyhow::{bail, Result};
use gleaner_core::ArticleStore;

pub fn execute(store: &ArticleStore, yes: bool) -> Result<()> {
    if !yes {
        bail!("this deletes all collected records; pass --yes to confirm");
    }

    let count = store.articles().len();
    if !store.clear() {
        bail!("failed to clear the store at {}", store.path().display());
    }
    println!("cleared {count} stored records");
    Ok(())
}
