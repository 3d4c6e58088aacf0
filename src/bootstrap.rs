//! Startup and shutdown sequencing. Grounded in the module-level
//! `connections = {}` global in `original_source/tcp/tcp_manager.py`
//! (which has no explicit bootstrap loader in the source at all): this
//! resolves spec.md's Open Question #2 by treating bootstrap as loading
//! every active device record and adding each independently, so one
//! device's connect failure can't abort the rest.

use std::sync::Arc;
use std::time::Duration;

use crate::pool::Pool;
use crate::repo::Repository;

/// Loads every active device and starts its supervised connection.
/// Each device is added independently — a failure adding one (e.g. a
/// row that went inactive between the query and the call) is logged
/// and does not stop the rest from starting.
pub async fn bootstrap(repo: &Arc<dyn Repository>, pool: &Pool) -> anyhow::Result<usize> {
    let devices = repo.devices_active().await?;
    let mut started = 0;
    for device in devices {
        match pool.add(device.id).await {
            Ok(()) => started += 1,
            Err(e) => tracing::warn!(device_id = device.id, error = %e, "failed to start connection during bootstrap"),
        }
    }
    tracing::info!(started, "bootstrap complete");
    Ok(started)
}

/// Stops every supervised connection, waiting up to `deadline` for the
/// in-flight sessions to close before returning regardless.
pub async fn graceful_shutdown(pool: &Pool, deadline: Duration) {
    tracing::info!(?deadline, "starting graceful shutdown");
    let shutdown = pool.shutdown();
    if tokio::time::timeout(deadline, shutdown).await.is_err() {
        tracing::warn!("shutdown deadline elapsed, forcing exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::AppConfig;
    use crate::ingest::RepoIngestSink;
    use crate::test_support::{device, FakeRepo};

    fn make_pool(devices: Vec<crate::model::DeviceRecord>) -> (Arc<dyn Repository>, Pool) {
        let repo: Arc<dyn Repository> = Arc::new(FakeRepo::new(devices));
        let config = Arc::new(AppConfig::default());
        let bridge = Arc::new(Bridge::new());
        let ingest = Arc::new(RepoIngestSink::new(repo.clone()));
        let pool = Pool::new(repo.clone(), config, bridge, ingest);
        (repo, pool)
    }

    #[tokio::test]
    async fn bootstrap_starts_only_active_devices() {
        let (repo, pool) = make_pool(vec![device(1, true), device(2, false), device(3, true)]);
        let started = bootstrap(&repo, &pool).await.unwrap();

        assert_eq!(started, 2);
        assert!(pool.is_connected(1).await);
        assert!(!pool.is_connected(2).await);
        assert!(pool.is_connected(3).await);
    }

    #[tokio::test]
    async fn bootstrap_with_no_active_devices_starts_nothing() {
        let (repo, pool) = make_pool(vec![device(1, false)]);
        let started = bootstrap(&repo, &pool).await.unwrap();
        assert_eq!(started, 0);
    }

    #[tokio::test]
    async fn graceful_shutdown_within_deadline_drains_the_pool() {
        let (repo, pool) = make_pool(vec![device(1, true)]);
        bootstrap(&repo, &pool).await.unwrap();
        assert!(pool.is_connected(1).await);

        graceful_shutdown(&pool, Duration::from_secs(5)).await;
        assert!(!pool.is_connected(1).await);
    }
}
