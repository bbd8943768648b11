//! # chatline-server
//!
//! Daemon that runs the classification and reconciliation engine.
//!
//! This binary:
//! - reads one or more **JSON-lines event streams** (files or stdin), each
//!   applied in its own ordered pipeline
//! - stores message **media** under a sanitized per-chat directory tree
//! - mirrors state to **SQLite** and restores it on startup
//! - resolves **display names** from an optional contacts directory
//! - logs every published change from a built-in fanout subscriber

mod config;
mod error;
mod lookup;
mod source;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use chatline_engine::names::NoLookup;
use chatline_engine::{
    Broadcaster, Classifier, Engine, InlineFetch, MediaPipeline, NameLookup, NameResolver,
    PeriodicTask, Persistence, SqlitePersistence,
};
use chatline_media::MediaResolver;

use crate::config::ServerConfig;
use crate::lookup::DirectoryLookup;

/// Buffer between a source reader and its pipeline.
const SOURCE_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,chatline_server=debug,chatline_engine=debug")
            }),
        )
        .init();

    info!("Starting chatline v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let resolver = MediaResolver::new(config.media_path.clone(), config.max_media_size).await?;

    let lookup: Arc<dyn NameLookup> = match &config.contacts_path {
        Some(path) => {
            let directory = DirectoryLookup::load(path).await?;
            info!(path = %path.display(), entries = directory.len(), "Loaded contacts directory");
            Arc::new(directory)
        }
        None => Arc::new(NoLookup),
    };

    let fanout = Arc::new(Broadcaster::new(config.fanout_buffer));

    let mut engine = Engine::new(
        Classifier::new(config.payload_key),
        Arc::new(NameResolver::new(lookup)),
        fanout.clone(),
    )
    .with_media(MediaPipeline {
        fetch: Arc::new(InlineFetch::new(
            config.media_source_root.clone(),
            config.max_media_size,
        )),
        resolver,
    });

    if config.persistence {
        match SqlitePersistence::open(config.database_path.as_deref()) {
            Ok(db) => {
                let db: Arc<dyn Persistence> = Arc::new(db);
                engine = engine.with_persistence(db);
            }
            Err(e) => warn!(error = %e, "Persistence unavailable, state will not survive restart"),
        }
    } else {
        info!("Persistence disabled");
    }

    if let Err(e) = engine.restore().await {
        warn!(error = %e, "Failed to restore persisted state, starting empty");
    }

    let engine = Arc::new(engine);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Change log: a regular fanout subscriber.
    let mut changes = fanout.subscribe();
    tokio::spawn(async move {
        while let Some(envelope) = changes.recv().await {
            match serde_json::to_string(envelope.as_ref()) {
                Ok(json) => debug!(seq = envelope.seq, kind = envelope.change.kind(), %json, "Change"),
                Err(e) => warn!(seq = envelope.seq, error = %e, "Unserializable change"),
            }
        }
        info!("Change log subscriber closed");
    });

    // Periodic stats and subscriber pruning.
    let stats_engine = engine.clone();
    let stats_task = PeriodicTask::spawn(
        "stats",
        Duration::from_secs(config.stats_interval_secs),
        move || {
            let engine = stats_engine.clone();
            async move {
                let pruned = engine.fanout().prune_closed();
                let stats = engine.state().stats();
                info!(
                    chats = stats.chats,
                    messages = stats.messages,
                    deleted = stats.deleted,
                    names = engine.names().len(),
                    subscribers = engine.fanout().len(),
                    pruned,
                    "State statistics"
                );
            }
        },
    );

    // -----------------------------------------------------------------------
    // 5. Attach event sources
    // -----------------------------------------------------------------------
    let mut readers = Vec::new();
    let mut pipelines = Vec::new();
    for spec in &config.sources {
        let (tx, rx) = mpsc::channel(SOURCE_BUFFER);
        pipelines.push(engine.spawn_source(spec.name(), rx));
        readers.push(source::spawn_reader(spec.clone(), tx));
    }

    info!(sources = config.sources.len(), "Event sources attached");

    let drained = async {
        for reader in futures::future::join_all(readers).await {
            match reader {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "Event source failed"),
                Err(e) => warn!(error = %e, "Event source task panicked"),
            }
        }
        futures::future::join_all(pipelines).await
    };

    tokio::select! {
        results = drained => {
            let handled: u64 = results.into_iter().filter_map(Result::ok).sum();
            info!(events = handled, "All event sources drained");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    stats_task.stop().await;

    let stats = engine.state().stats();
    info!(
        chats = stats.chats,
        messages = stats.messages,
        "chatline stopped"
    );

    Ok(())
}
