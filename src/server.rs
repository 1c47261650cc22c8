use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::config::{AppConfig, EngineConfig};
use crate::engine::{DocumentEngine, InMemoryEngine, SurrealEngine};
use crate::store::{MemoryStore, SemanticMemoryStore};

/// Connect the engine named by `engine.provider`.
pub async fn connect_engine(config: &EngineConfig) -> anyhow::Result<Arc<dyn DocumentEngine>> {
    let engine: Arc<dyn DocumentEngine> = match config.provider.as_str() {
        "memory" => Arc::new(InMemoryEngine::new()),
        "surrealdb" => Arc::new(
            SurrealEngine::connect(&config.database_url, &config.namespace, &config.database)
                .await
                .map_err(|e| anyhow::anyhow!("failed to connect to SurrealDB at {}: {e}", config.database_url))?,
        ),
        other => anyhow::bail!("unknown engine provider `{other}` (expected `memory` or `surrealdb`)"),
    };

    info!(
        name: "engine.connected",
        provider = %config.provider,
        "Document engine ready"
    );
    Ok(engine)
}

/// Router with the store API and HTTP tracing.
pub fn build_router(store: Arc<dyn MemoryStore>) -> Router {
    api::router(ApiState { store })
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let engine = connect_engine(&config.engine).await?;
    let options = config.store_options();
    info!(
        name: "store.config.loaded",
        vector_dimension = options.vector_dimension,
        batch_concurrency = options.batch_concurrency,
        request_timeout_ms = options.request_timeout.as_millis() as u64,
        "Memory store configured"
    );

    let store: Arc<dyn MemoryStore> = Arc::new(SemanticMemoryStore::new(engine, options));
    let app = build_router(store);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!(name: "server.stopping", "Shutdown signal received");
}
