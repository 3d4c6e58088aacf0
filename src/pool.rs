//! Connection Pool: an explicit, mutex-guarded map from device id to its
//! `Supervisor`, replacing the bare module-level `connections = {}` dict
//! plus `reactor.callFromThread` dispatch in
//! `original_source/tcp/tcp_manager.py` / `backend/tcp/tcp_manager.py`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bridge::Bridge;
use crate::config::AppConfig;
use crate::error::PoolError;
use crate::ingest::IngestSink;
use crate::model::DeviceRecord;
use crate::repo::Repository;
use crate::session::SessionContext;
use crate::settings_assembler::SettingsAssembler;
use crate::supervisor::Supervisor;
use crate::tls::build_connector;

pub struct Pool {
    supervisors: Mutex<HashMap<i64, Supervisor>>,
    repo: Arc<dyn Repository>,
    config: Arc<AppConfig>,
    assembler: Arc<SettingsAssembler>,
    bridge: Arc<Bridge>,
    ingest: Arc<dyn IngestSink>,
    shutting_down: AtomicBool,
}

impl Pool {
    pub fn new(
        repo: Arc<dyn Repository>,
        config: Arc<AppConfig>,
        bridge: Arc<Bridge>,
        ingest: Arc<dyn IngestSink>,
    ) -> Self {
        Self {
            supervisors: Mutex::new(HashMap::new()),
            assembler: Arc::new(SettingsAssembler::new(repo.clone())),
            repo,
            config,
            bridge,
            ingest,
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Starts a supervised connection for `device_id`. A no-op if one is
    /// already running — idempotent, matching `add(d); add(d) == add(d)`
    /// (canonical single-argument `add` form — spec's resolution of the
    /// two conflicting Python `add_connection` signatures).
    pub async fn add(&self, device_id: i64) -> Result<(), PoolError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown(device_id));
        }

        let mut supervisors = self.supervisors.lock().await;
        if supervisors.contains_key(&device_id) {
            return Ok(());
        }

        let supervisor = self.spawn_supervisor(device_id);
        supervisors.insert(device_id, supervisor);
        tracing::info!(device_id, "added connection");
        Ok(())
    }

    /// Replaces the device's supervisor so the next reconnect picks up
    /// new connection details, mirroring `update_connection`'s
    /// remove-then-add in `tcp_manager.py`. Awaits the old supervisor's
    /// reconnect loop before starting the new one, so the old Session
    /// can never still be Streaming once the new one starts.
    pub async fn update(&self, device_id: i64) -> Result<(), PoolError> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(PoolError::Shutdown(device_id));
        }

        let old = self.supervisors.lock().await.remove(&device_id);
        if let Some(old) = old {
            old.stop();
            old.join().await;
        }

        let supervisor = self.spawn_supervisor(device_id);
        self.supervisors.lock().await.insert(device_id, supervisor);
        tracing::info!(device_id, "updated connection");
        Ok(())
    }

    /// Stops and awaits the device's supervisor. A no-op if the device
    /// isn't present — idempotent, matching `remove(d); remove(d)` being
    /// "not an error." Awaiting the supervisor's join before returning
    /// guarantees no frame for `device_id` reaches the bridge after this
    /// call returns.
    pub async fn remove(&self, device_id: i64) -> Result<(), PoolError> {
        let supervisor = self.supervisors.lock().await.remove(&device_id);
        if let Some(supervisor) = supervisor {
            supervisor.stop();
            supervisor.join().await;
            tracing::info!(device_id, "removed connection");
        }
        Ok(())
    }

    /// Forwards a signed command to the device's active session, if any.
    pub async fn send_command(&self, device_id: i64, data: serde_json::Value) -> Result<(), PoolError> {
        let supervisors = self.supervisors.lock().await;
        let supervisor = supervisors.get(&device_id).ok_or(PoolError::NotFound(device_id))?;
        let _ = supervisor.command_sender().send(data).await;
        Ok(())
    }

    pub async fn is_connected(&self, device_id: i64) -> bool {
        self.supervisors.lock().await.contains_key(&device_id)
    }

    /// Stops every supervisor and waits for its reconnect loop to exit,
    /// mirrors `shutdown_all_connections`. The caller applies the drain
    /// deadline (spec.md §4.8) by wrapping this in `tokio::time::timeout`.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let drained: Vec<_> = self.supervisors.lock().await.drain().collect();
        for (device_id, supervisor) in drained {
            tracing::info!(device_id, "stopping connection for shutdown");
            supervisor.stop();
            supervisor.join().await;
        }
    }

    fn spawn_supervisor(&self, device_id: i64) -> Supervisor {
        let repo = self.repo.clone();
        let config = self.config.clone();
        let assembler = self.assembler.clone();
        let bridge = self.bridge.clone();
        let ingest = self.ingest.clone();

        Supervisor::spawn(device_id, self.config.backoff_initial_ms, self.config.backoff_max_ms, move || {
            let repo = repo.clone();
            let config = config.clone();
            let assembler = assembler.clone();
            let bridge = bridge.clone();
            let ingest = ingest.clone();
            build_session_context(device_id, repo, config, assembler, bridge, ingest)
        })
    }
}

/// Re-reads the device record before every connection attempt, so a
/// row updated via `Pool::update` (which rebuilds this closure) or
/// directly in storage is picked up on the next reconnect.
async fn build_session_context(
    device_id: i64,
    repo: Arc<dyn Repository>,
    config: Arc<AppConfig>,
    assembler: Arc<SettingsAssembler>,
    bridge: Arc<Bridge>,
    ingest: Arc<dyn IngestSink>,
) -> SessionContext {
    let device = repo.device(device_id).await.unwrap_or_else(|_| DeviceRecord {
        id: device_id,
        name: String::new(),
        ip: String::new(),
        port: 0,
        auth_token: String::new(),
        is_active: false,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    });

    let connector = build_connector(&config).expect("tls connector config");

    SessionContext {
        device,
        config,
        connector,
        assembler,
        bridge,
        ingest,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::RepoIngestSink;
    use crate::test_support::{device, FakeRepo};

    fn make_pool(devices: Vec<DeviceRecord>) -> Pool {
        let repo: Arc<dyn Repository> = Arc::new(FakeRepo::new(devices));
        let config = Arc::new(AppConfig::default());
        let bridge = Arc::new(Bridge::new());
        let ingest = Arc::new(RepoIngestSink::new(repo.clone()));
        Pool::new(repo, config, bridge, ingest)
    }

    #[tokio::test]
    async fn add_twice_is_a_no_op() {
        let pool = make_pool(vec![device(1, true)]);
        pool.add(1).await.unwrap();
        assert!(pool.is_connected(1).await);

        pool.add(1).await.unwrap();
        assert!(pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn remove_without_add_is_a_no_op() {
        let pool = make_pool(vec![device(1, true)]);
        pool.remove(1).await.unwrap();
        assert!(!pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn remove_twice_is_a_no_op() {
        let pool = make_pool(vec![device(1, true)]);
        pool.add(1).await.unwrap();
        pool.remove(1).await.unwrap();
        pool.remove(1).await.unwrap();
        assert!(!pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn update_replaces_the_running_supervisor() {
        let pool = make_pool(vec![device(1, true)]);
        pool.add(1).await.unwrap();
        pool.update(1).await.unwrap();
        assert!(pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn update_on_an_unknown_device_starts_it() {
        let pool = make_pool(vec![device(1, true)]);
        pool.update(1).await.unwrap();
        assert!(pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn shutdown_drains_every_supervisor_and_rejects_new_adds() {
        let pool = make_pool(vec![device(1, true), device(2, true)]);
        pool.add(1).await.unwrap();
        pool.add(2).await.unwrap();

        pool.shutdown().await;

        assert!(!pool.is_connected(1).await);
        assert!(!pool.is_connected(2).await);
        let err = pool.add(1).await.unwrap_err();
        assert!(matches!(err, PoolError::Shutdown(1)));
    }

    #[tokio::test]
    async fn send_command_to_an_unknown_device_is_not_found() {
        let pool = make_pool(vec![]);
        let err = pool.send_command(99, serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, PoolError::NotFound(99)));
    }
}
