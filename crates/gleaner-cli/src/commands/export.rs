//! The `export` command: render the store as CSV and deliver it.

use anyhow::Result;
use gleaner_core::export::{export_filename, render_csv, DirectorySink, DownloadSink};
use gleaner_core::ArticleStore;
use std::path::Path;

pub fn execute(store: &ArticleStore, out: &Path) -> Result<()> {
    let snapshot = store.load();
    if snapshot.articles.is_empty() {
        println!("nothing to export");
        return Ok(());
    }

    let csv = render_csv(&snapshot.account, &snapshot.articles);
    let filename = export_filename(&snapshot.account, chrono::Local::now().date_naive());
    let sink = DirectorySink::new(out);
    let path = sink.deliver(&filename, csv.as_bytes())?;

    println!(
        "exported {} records to {}",
        snapshot.articles.len(),
        path.display()
    );
    Ok(())
}
