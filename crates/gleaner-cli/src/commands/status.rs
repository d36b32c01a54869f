//! The `status` command: show what the store currently holds.

use anyhow::Result;
use gleaner_core::ArticleStore;

/// How many of the most recently appended records to list.
const RECENT: usize = 5;

pub fn execute(store: &ArticleStore) -> Result<()> {
    let snapshot = store.load();
    println!("store:   {}", store.path().display());
    println!("account: {}", snapshot.account);
    println!("records: {}", snapshot.articles.len());
    for article in snapshot.articles.iter().rev().take(RECENT) {
        println!(
            "  {}  {}  {}",
            article.published.format("%Y-%m-%d"),
            article.title,
            article.url
        );
    }
    Ok(())
}
