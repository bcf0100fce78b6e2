use accessguard::{
    api::{create_router, AppState},
    config::{Config, StoreBackend},
    db::{create_pool, run_migrations, PgStore},
    observability::init_tracing,
    realtime::{redis::create_client, EventChannel, FanOut, RedisEventChannel, RoomHub},
    store::{MemoryStore, Store},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    // Initialize tracing/logging
    init_tracing(&config.observability);

    tracing::info!("Starting AccessGuard service");
    tracing::info!("Configuration loaded: {:?}", config.server);

    let store: Arc<dyn Store> = match config.database.backend {
        StoreBackend::Postgres => {
            let db_pool = create_pool(&config.database).await?;
            run_migrations(&db_pool).await?;
            Arc::new(PgStore::new(db_pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Room hub for WebSocket clients, plus Redis pub/sub when enabled
    let hub = RoomHub::new();
    let mut events = FanOut::new().add_channel(Arc::new(hub.clone()));
    let mut redis_manager = None;
    if config.redis.enabled {
        let manager = create_client(&config.redis).await?;
        tracing::info!("Redis connection established");
        events = events.add_channel(Arc::new(RedisEventChannel::new(
            manager.clone(),
            config.redis.channel_prefix.clone(),
        )));
        redis_manager = Some(manager);
    }
    let events: Arc<dyn EventChannel> = Arc::new(events);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let purge_every = Duration::from_secs(config.notifications.purge_interval_seconds);

    let state = AppState::new(config, store, hub, events, redis_manager)?;
    let purge_task = state.services.notifier.spawn_purge(purge_every);
    let app = create_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    purge_task.abort();
    tracing::info!("AccessGuard service stopped");

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
