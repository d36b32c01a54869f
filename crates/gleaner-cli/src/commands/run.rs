//! The `run` command: collect from a fixture-backed scripted source.

use crate::fixture::Fixture;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use gleaner_core::{ArticleStore, EngineEvent, HarvestConfig, HarvestContext, RunOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// How long to wait for the watcher to report items before concluding
/// the source has nothing to collect.
const READINESS_WAIT: Duration = Duration::from_secs(5);

pub async fn execute(
    store: ArticleStore,
    fixture_path: &Path,
    cutoff: Option<NaiveDate>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let fixture = Fixture::load(fixture_path)?;
    let source = Arc::new(fixture.into_source());
    let ctx = HarvestContext::start(source, store, config);

    if !wait_for_items(&ctx).await? {
        println!("source rendered no items; nothing to collect");
        ctx.shutdown();
        return Ok(());
    }
    println!("account: {}", ctx.resolver.current());

    let mut events = ctx.engine.events();
    let handle = ctx.engine.start(cutoff).map_err(anyhow::Error::from)?;

    let engine = ctx.engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nstop requested, finishing current step...");
            engine.stop();
        }
    });

    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::PageCollected {
                page,
                total_pages,
                appended,
            } => println!("collected page {page}/{total_pages} ({appended} this run)"),
            EngineEvent::Waiting {
                page,
                total_pages,
                delay,
            } => println!(
                "collecting... page {page}/{total_pages}, waiting {:.1}s",
                delay.as_secs_f64()
            ),
            EngineEvent::Finished { .. } | EngineEvent::Stopped { .. } => break,
        }
    }

    let stats = handle.await.context("collection task failed")?;
    tracing::debug!(?stats, "run complete");
    match stats.outcome {
        RunOutcome::Finished => println!("finished, {} collected", stats.total_records),
        RunOutcome::Stopped => println!("stopped, {} collected", stats.total_records),
    }
    println!(
        "pages scanned: {}, appended: {}, skipped malformed: {}",
        stats.pages_scanned, stats.appended, stats.skipped_malformed
    );

    ctx.shutdown();
    Ok(())
}

/// Waits for the first readiness signal reporting rendered items.
async fn wait_for_items(ctx: &HarvestContext) -> Result<bool> {
    let mut readiness = ctx.watcher.subscribe();
    let wait = async {
        loop {
            if readiness.borrow_and_update().has_items {
                return Ok::<_, anyhow::Error>(());
            }
            readiness
                .changed()
                .await
                .context("readiness watcher went away")?;
        }
    };
    match timeout(READINESS_WAIT, wait).await {
        Ok(result) => result.map(|_| true),
        Err(_) => Ok(false),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<HarvestConfig> {
    let path = match path {
        Some(path) => path,
        None => dirs::home_dir()
            .context("failed to get home directory")?
            .join(".gleaner")
            .join("config.toml"),
    };
    HarvestConfig::load_or_default(&path).map_err(Into::into)
}
