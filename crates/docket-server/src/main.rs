//! Docket Server
//!
//! Standalone Docket server binary: wires the conversation actor runtime,
//! the sync pipeline, the tool-protocol servers, and the HTTP surface.

use clap::Parser;
use docket_conversation::{ChannelEventSink, ConversationActor};
use docket_core::{DocketConfig, WallClockTime};
use docket_runtime::{CloneFactory, Dispatcher, DispatcherConfig};
use docket_server::{api, AppState, ConversationService};
use docket_storage::{ActorKV, MemoryKV};
use docket_sync::{
    AuditLog, MemoryAuditLog, MemoryIndex, ReconciliationSweeper, SearchIndex, SweeperConfig,
    SyncProcessor,
};
use docket_tools::{
    AdditionalGoalsServer, ConflictCheckerServer, FixtureSearch, GoalTrackerServer, SemanticSearch,
    ToolProvider,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Docket server CLI
#[derive(Parser, Debug)]
#[command(name = "docket-server")]
#[command(about = "Docket legal client intake server")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "docket.yaml")]
    config: String,

    /// Bind address (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(path: &str) -> anyhow::Result<DocketConfig> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(serde_yaml::from_str(&contents)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path, "no config file, using defaults");
            Ok(DocketConfig::default())
        }
        Err(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let mut config = load_config(&cli.config)?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    config.validate()?;

    tracing::info!(bind = %config.server.bind_address, "docket server starting");

    // Actor runtime: one exclusive owner per session id over the KV store.
    let kv: Arc<dyn ActorKV> = Arc::new(MemoryKV::new());
    let (event_sink, event_rx) = ChannelEventSink::new();
    let actor = ConversationActor::new(Arc::new(event_sink));
    let dispatcher_config = DispatcherConfig {
        max_actors: config.actor.max_actors_count,
        mailbox_depth: config.actor.mailbox_depth_max,
        idle_timeout_ms: config.actor.idle_timeout_ms,
        ..Default::default()
    };
    let mut dispatcher = Dispatcher::new(
        Arc::new(CloneFactory::new(actor)),
        kv,
        dispatcher_config,
    );
    let dispatcher_handle = dispatcher.handle();
    tokio::spawn(async move { dispatcher.run().await });

    // Sync pipeline: processor consumes the event channel; the sweeper
    // reconciles stale rows against the actors.
    let time = Arc::new(WallClockTime::new());
    let index: Arc<dyn SearchIndex> = Arc::new(MemoryIndex::new());
    let audit: Arc<dyn AuditLog> = Arc::new(MemoryAuditLog::new());
    let processor = SyncProcessor::new(index.clone(), audit.clone(), time.clone());
    tokio::spawn(processor.run(event_rx));

    let service = ConversationService::new(dispatcher_handle);
    let sweeper = ReconciliationSweeper::new(
        index.clone(),
        Arc::new(service.clone()),
        time,
        SweeperConfig {
            interval_ms: config.sync.reconcile_interval_ms,
            stale_after_ms: config.sync.stale_after_ms,
            ..Default::default()
        },
    );
    tokio::spawn(async move { sweeper.run().await });

    // Tool-protocol servers. The fixture backend stands in for the
    // external vector search service in local deployments.
    let search: Arc<dyn SemanticSearch> = Arc::new(FixtureSearch::new());
    let goal_tracker: Arc<dyn ToolProvider> = Arc::new(GoalTrackerServer::new());
    let conflict_checker: Arc<dyn ToolProvider> =
        Arc::new(ConflictCheckerServer::new(search.clone()));
    let additional_goals: Arc<dyn ToolProvider> = Arc::new(AdditionalGoalsServer::new(search));

    let state = AppState::new(
        service,
        index,
        audit,
        config.server.admin_key.clone(),
        goal_tracker,
        conflict_checker,
        additional_goals,
    );

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(addr = %config.server.bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("docket server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
