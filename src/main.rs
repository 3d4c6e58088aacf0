use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;

use lpr_gateway::admin_hooks::AdminHooks;
use lpr_gateway::bootstrap::{bootstrap, graceful_shutdown};
use lpr_gateway::bridge::Bridge;
use lpr_gateway::config::AppConfig;
use lpr_gateway::http::build_router;
use lpr_gateway::ingest::RepoIngestSink;
use lpr_gateway::pool::Pool;
use lpr_gateway::repo::sqlite::SqliteRepo;
use lpr_gateway::repo::Repository;
use lpr_gateway::state::AppState;
use lpr_gateway::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!(bind = %config.http_bind_addr, "starting lpr-gateway");

    let repo: Arc<dyn Repository> = Arc::new(SqliteRepo::connect(&config.database_url).await?);
    let bridge = Arc::new(Bridge::new());
    let ingest = Arc::new(RepoIngestSink::new(repo.clone()));
    let pool = Arc::new(Pool::new(repo.clone(), config.clone(), bridge.clone(), ingest));
    let hooks = Arc::new(AdminHooks::new(pool.clone()));

    let started = bootstrap(&repo, &pool).await?;
    tracing::info!(started, "bootstrap started connections for active devices");

    let state = AppState {
        repo,
        pool: pool.clone(),
        hooks,
        bridge,
        config: config.clone(),
    };
    let router = build_router(state);

    let listener = TcpListener::bind(&config.http_bind_addr).await?;
    tracing::info!(addr = %config.http_bind_addr, "http server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());
    server.await?;

    graceful_shutdown(&pool, config.shutdown_deadline()).await;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("received shutdown signal");
}
