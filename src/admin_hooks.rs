//! Admin Hooks: the thin bridge between CRUD mutations and the
//! Connection Pool, grounded in `crud/lpr.py`'s `create_lpr` /
//! `update_lpr` / `delete_lpr` calling `add_connection` /
//! `update_connection` / `remove_connection` after each commit, and
//! `crud/camera.py`'s `lpr_ids` mutations needing a hot reconfigure per
//! linked device. Returns typed outcomes rather than raising, so the
//! HTTP layer can decide how to surface a `PoolError::Shutdown` as
//! advisory rather than a hard failure.

use std::sync::Arc;

use crate::error::PoolError;
use crate::pool::Pool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Applied,
    /// The pool is draining; the caller's write still committed, the
    /// live connection just wasn't (re)started.
    DeferredShutdown,
}

pub struct AdminHooks {
    pool: Arc<Pool>,
}

impl AdminHooks {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    pub async fn device_created(&self, device_id: i64, is_active: bool) -> Result<HookOutcome, PoolError> {
        if !is_active {
            return Ok(HookOutcome::Applied);
        }
        self.start_or_defer(device_id).await
    }

    pub async fn device_updated(&self, device_id: i64, is_active: bool) -> Result<HookOutcome, PoolError> {
        if !is_active {
            let _ = self.pool.remove(device_id).await;
            return Ok(HookOutcome::Applied);
        }
        match self.pool.update(device_id).await {
            Ok(()) => Ok(HookOutcome::Applied),
            Err(PoolError::Shutdown(id)) => {
                tracing::warn!(device_id = id, "ignoring update, pool is shutting down");
                Ok(HookOutcome::DeferredShutdown)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn device_deleted(&self, device_id: i64) -> Result<HookOutcome, PoolError> {
        self.pool.remove(device_id).await?;
        Ok(HookOutcome::Applied)
    }

    /// A camera's linked-device set changed; every affected device needs
    /// its settings re-pushed on next reconnect.
    pub async fn camera_links_changed(&self, device_ids: &[i64]) -> Result<HookOutcome, PoolError> {
        let mut deferred = false;
        for &device_id in device_ids {
            match self.pool.update(device_id).await {
                Ok(()) => {}
                Err(PoolError::Shutdown(_)) => deferred = true,
                Err(PoolError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(if deferred { HookOutcome::DeferredShutdown } else { HookOutcome::Applied })
    }

    async fn start_or_defer(&self, device_id: i64) -> Result<HookOutcome, PoolError> {
        match self.pool.add(device_id).await {
            Ok(()) => Ok(HookOutcome::Applied),
            Err(PoolError::Shutdown(id)) => {
                tracing::warn!(device_id = id, "ignoring add, pool is shutting down");
                Ok(HookOutcome::DeferredShutdown)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::AppConfig;
    use crate::ingest::RepoIngestSink;
    use crate::pool::Pool;
    use crate::repo::Repository;
    use crate::test_support::{device, FakeRepo};

    fn make_hooks(devices: Vec<crate::model::DeviceRecord>) -> AdminHooks {
        let repo: Arc<dyn Repository> = Arc::new(FakeRepo::new(devices));
        let config = Arc::new(AppConfig::default());
        let bridge = Arc::new(Bridge::new());
        let ingest = Arc::new(RepoIngestSink::new(repo.clone()));
        AdminHooks::new(Arc::new(Pool::new(repo, config, bridge, ingest)))
    }

    #[tokio::test]
    async fn creating_an_inactive_device_does_not_touch_the_pool() {
        let hooks = make_hooks(vec![device(1, false)]);
        let outcome = hooks.device_created(1, false).await.unwrap();
        assert_eq!(outcome, HookOutcome::Applied);
        assert!(!hooks.pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn creating_an_active_device_starts_a_connection() {
        let hooks = make_hooks(vec![device(1, true)]);
        let outcome = hooks.device_created(1, true).await.unwrap();
        assert_eq!(outcome, HookOutcome::Applied);
        assert!(hooks.pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn deactivating_an_existing_device_removes_its_connection() {
        let hooks = make_hooks(vec![device(1, true)]);
        hooks.device_created(1, true).await.unwrap();
        hooks.device_updated(1, false).await.unwrap();
        assert!(!hooks.pool.is_connected(1).await);
    }

    #[tokio::test]
    async fn deleting_a_device_not_in_the_pool_still_reports_applied() {
        let hooks = make_hooks(vec![device(1, true)]);
        let outcome = hooks.device_deleted(1).await.unwrap();
        assert_eq!(outcome, HookOutcome::Applied);
    }

    #[tokio::test]
    async fn camera_links_changed_starts_every_linked_device() {
        let hooks = make_hooks(vec![device(1, true), device(2, true)]);
        let outcome = hooks.camera_links_changed(&[1, 2]).await.unwrap();
        assert_eq!(outcome, HookOutcome::Applied);
        assert!(hooks.pool.is_connected(1).await);
        assert!(hooks.pool.is_connected(2).await);
    }
}
