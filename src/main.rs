//! cross-seed: cross-seeding automation daemon.
//!
//! CLI entry point, adapted from the teacher's `main.rs`: load config, run
//! migrations, construct every component, start the HTTP surface and the
//! search pipeline, shut down gracefully on SIGTERM/ctrl_c.

mod announce;
mod pipeline;

use announce::AnnounceListener;
use clap::Parser;
use cross_seed_action::ActionDispatcher;
use cross_seed_arr::ArrClient;
use cross_seed_clients::{BitTorrentClient, QBittorrentClient, QBittorrentConfig};
use cross_seed_core::config::{AppConfig, ClientKind, DispatchMode};
use cross_seed_daemon::{build_router, AppState, DaemonMetrics};
use cross_seed_decision::{DecisionCache, MatchEngine};
use cross_seed_indexers::torznab::TorznabClient;
use cross_seed_storage::{create_pool, run_migrations, PoolConfig};
use pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "cross-seed", about = "Cross-seeding automation daemon")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, env = "CROSS_SEED_CONFIG", default_value = "cross-seed.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let raw_config = std::fs::read_to_string(&cli.config)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", cli.config.display()))?;
    let config = AppConfig::from_yaml(&raw_config)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", cli.config.display()))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    cross_seed_core::init_tracing(config.log_json);
    info!("starting cross-seed");

    let pool = create_pool(&config.paths.database_path, PoolConfig::default()).await?;
    run_migrations(&pool).await?;
    info!("decision cache database ready");

    let indexer_clients = config
        .indexers
        .iter()
        .map(|indexer| {
            let client = TorznabClient::new(
                indexer.requests_per_interval,
                Duration::from_secs(indexer.interval_seconds),
                Duration::from_secs(30),
            )?;
            Ok::<_, cross_seed_core::error::CrossSeedError>((indexer.clone(), Arc::new(client)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let category_cache = DecisionCache::new(pool.clone(), config.retention.clone());
    for (i, (indexer_cfg, client)) in indexer_clients.iter().enumerate() {
        let record = cross_seed_core::models::IndexerRecord::new(
            i as i64 + 1,
            indexer_cfg.name.clone(),
            indexer_cfg.url.clone(),
            indexer_cfg.apikey.clone(),
        );
        if let Err(e) = category_cache.upsert_indexer(&record).await {
            error!(indexer = %indexer_cfg.name, error = %e, "failed persisting indexer row");
            continue;
        }
        match client.probe_categories(&record).await {
            Ok(categories) => {
                if let Err(e) = category_cache.record_indexer_categories(&categories).await {
                    error!(indexer = %indexer_cfg.name, error = %e, "failed persisting indexer categories");
                }
            }
            Err(e) => warn!(indexer = %indexer_cfg.name, error = %e, "caps probe failed, skipping category persistence"),
        }
    }

    let arr = ArrClient::new(config.arrs.clone());

    let client: Option<Arc<dyn BitTorrentClient>> = match (&config.dispatch_mode, &config.client) {
        (DispatchMode::Inject, Some(client_config)) => match client_config.kind {
            ClientKind::QBittorrent => {
                let qbit = QBittorrentClient::new(QBittorrentConfig {
                    base_url: client_config.base_url.clone(),
                    username: client_config.username.clone(),
                    password: client_config.password.clone(),
                    timeout: 30,
                })?;
                qbit.test_connection().await?;
                Some(Arc::new(qbit) as Arc<dyn BitTorrentClient>)
            }
            other => {
                return Err(anyhow::anyhow!(
                    "client backend {other:?} has no adapter implementation yet"
                ));
            }
        },
        (DispatchMode::Inject, None) => {
            return Err(anyhow::anyhow!("dispatch_mode is Inject but no client is configured"));
        }
        (DispatchMode::Save, _) => None,
    };

    let metrics = Arc::new(DaemonMetrics::new());
    let (search_trigger_tx, search_trigger_rx) = mpsc::channel(1);
    let (announce_tx, announce_rx) = mpsc::channel(64);
    // The transport that would feed this channel (an IRC/Torznab push-notification
    // bridge) is deployment-specific and isn't wired up here; the listener itself
    // is fully functional once something sends on `announce_tx`.
    drop(announce_tx);

    let pipeline = Pipeline::new(
        &config,
        indexer_clients,
        arr,
        DecisionCache::new(pool.clone(), config.retention.clone()),
        MatchEngine::new(config.matcher.clone()),
        ActionDispatcher::new(
            config.dispatch_mode,
            config.paths.clone(),
            client.clone(),
            config.allow_cross_device_copy_fallback,
        ),
        client.clone(),
        metrics.clone(),
    );

    let announce_listener = AnnounceListener::new(
        config.paths.data_dir.clone(),
        DecisionCache::new(pool.clone(), config.retention.clone()),
        MatchEngine::new(config.matcher.clone()),
        ActionDispatcher::new(
            config.dispatch_mode,
            config.paths.clone(),
            client.clone(),
            config.allow_cross_device_copy_fallback,
        ),
        client,
        metrics.clone(),
        config.dispatch_retry_ceiling,
    );

    let app_state = AppState {
        metrics: metrics.clone(),
        search_trigger: search_trigger_tx,
    };
    let router = build_router(app_state);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_address).await?;
    info!(addr = %config.http_bind_address, "http surface listening");

    let search_cadence = config.search_cadence;
    let pipeline_task = tokio::spawn(pipeline.run_loop(search_cadence, search_trigger_rx));
    let announce_task = tokio::spawn(announce_listener.run(announce_rx));
    let server_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await {
            error!(error = %e, "http server exited with an error");
        }
    });

    let _ = server_task.await;
    pipeline_task.abort();
    announce_task.abort();

    info!("cross-seed shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl_c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
