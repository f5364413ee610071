// wiredcache - Client-side message cache and sync layer for wiredFRONT
// Author: wiredFRONT contributors

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use wiredcache::cli::{Args, Command};
use wiredcache::config::AppConfig;
use wiredcache::context::CacheContext;
use wiredcache::store::LoadSource;
use wiredcache::utils::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Phase 1: Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting wiredcache v{}", env!("CARGO_PKG_VERSION"));

    // Phase 3: Open storage and build the cache layer
    let ctx = CacheContext::init(&config)
        .await
        .context("failed to initialize cache storage")?;

    // Phase 4: Run the command
    run(&args, &config, &ctx).await
}

async fn run(args: &Args, config: &AppConfig, ctx: &CacheContext) -> Result<()> {
    let cache = ctx.cache();

    match &args.command {
        Command::Show { session_id } => match cache.get_cached_record(session_id).await? {
            Some(record) if args.json => print_json(&record)?,
            Some(record) => {
                println!("session:   {}", record.session_id);
                println!("status:    {:?}", record.status());
                println!("messages:  {}", record.metadata.size);
                println!("written:   {}", record.timestamp.to_rfc3339());
                println!("age:       {}s", record.age(chrono::Utc::now()).num_seconds());
            }
            None => println!("No cached record for session {}", session_id),
        },
        Command::Invalidate { session_id } => {
            if cache.invalidate_cache(session_id).await? {
                println!("Session {} marked stale", session_id);
            } else {
                println!("No cached record for session {}", session_id);
            }
        }
        Command::Optimize { session_id } => match cache.optimize_cache(session_id).await? {
            Some(count) => println!("Session {} optimized: {} messages", session_id, count),
            None => println!("Session {} not optimized (missing, expired or stale)", session_id),
        },
        Command::Clear { session_id, all } => {
            if *all {
                cache.clear_all_cache().await?;
                println!("All cached sessions cleared");
            } else if let Some(session_id) = session_id {
                cache.clear_cache(session_id).await?;
                println!("Session {} cleared", session_id);
            }
        }
        Command::Prune => {
            let removed = cache.prune_expired().await?;
            println!("Pruned {} expired records", removed);
        }
        Command::Stats { reset } => {
            let record = ctx.metrics().get_metrics().await?;
            let sessions = cache.record_count().await?;
            if args.json {
                print_json(&record)?;
            } else {
                println!("cached sessions: {}", sessions);
                println!("hits:            {}", record.cache_hits);
                println!("misses:          {}", record.cache_misses);
                match record.hit_ratio() {
                    Some(ratio) => println!("hit ratio:       {:.1}%", ratio * 100.0),
                    None => println!("hit ratio:       n/a"),
                }
                println!("sync attempts:   {}", record.sync_attempts);
                println!("sync successes:  {}", record.sync_successes);
                println!("failed syncs:    {}", record.failed_syncs());
                for entry in record.errors.iter().take(5) {
                    println!("  {}  {}", entry.timestamp.to_rfc3339(), entry.error);
                }
            }
            if *reset {
                ctx.metrics().clear_metrics().await?;
            }
        }
        Command::Metrics => {
            cache.record_count().await?;
            print!("{}", ctx.metrics().collectors().gather()?);
        }
        Command::Sync { session_id, refresh } => {
            let api = CacheContext::remote_api(&config.remote)
                .context("sync needs remote.base_url and remote.api_key")?;
            let (messages, _sessions) = ctx.stores(api);
            let result = if *refresh {
                messages
                    .refresh(session_id)
                    .await
                    .map(|loaded| (loaded, LoadSource::Remote))
            } else {
                messages.load_with_source(session_id).await
            };
            let (loaded, source) = match result {
                Ok(loaded) => loaded,
                Err(e) if e.is_transient() => {
                    return Err(anyhow::Error::new(e)
                        .context("remote store temporarily unavailable, try again later"))
                }
                Err(e) => return Err(e.into()),
            };
            if args.json {
                print_json(&loaded)?;
            } else {
                println!(
                    "Session {}: {} messages ({:?})",
                    session_id,
                    loaded.len(),
                    source
                );
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
