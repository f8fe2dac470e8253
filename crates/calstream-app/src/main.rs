use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use calstream_core::config::load_config;
use calstream_core::record::EventRecord;
use calstream_service::model::{ListModel, ModelFactory};
use calstream_store::builder::ListConstraints;
use calstream_store::{MemoryStore, RecordStore};
use chrono::{NaiveDate, Utc};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Entries printed per direction.
const WINDOW: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let config = load_config()?;

    tracing::info!(config = ?config, "Configuration loaded");

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping debug");
    }

    let env = Arc::new(config.environment()?);

    let mut args = std::env::args().skip(1);
    let fixture = args
        .next()
        .map(PathBuf::from)
        .context("usage: calstream <events.json> [YYYY-MM-DD]")?;
    let anchor = match args.next() {
        Some(raw) => raw
            .parse::<NaiveDate>()
            .with_context(|| format!("invalid anchor date {raw:?}"))?,
        None => Utc::now().with_timezone(&env.timezone).date_naive(),
    };

    let raw = tokio::fs::read_to_string(&fixture)
        .await
        .with_context(|| format!("failed to read {}", fixture.display()))?;
    let events: Vec<EventRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", fixture.display()))?;

    let store: Arc<dyn RecordStore> = Arc::new(
        MemoryStore::with_events(events)?
            .with_week_start(env.first_day_of_week)
            .with_timezone(env.timezone),
    );
    tracing::info!(fixture = %fixture.display(), %anchor, "Event store loaded");

    let factory = ModelFactory::new(store, env);
    let (forward, backward) = factory
        .prepare_around(anchor, &ListConstraints::default())
        .await?;

    println!("Upcoming from {anchor}:");
    print_window(forward);
    println!("Earlier than {anchor}:");
    print_window(backward);

    Ok(())
}

fn print_window(model: ListModel) {
    for item in model.take(WINDOW) {
        if item.day_changed {
            println!("  {}", item.date);
        }
        let occurrence = item.occurrence;
        println!(
            "    {:<10} {} ({} - {})",
            if occurrence.is_all_day() { "all-day" } else { "timed" },
            occurrence.summary,
            occurrence.start,
            occurrence.end,
        );
    }
}
