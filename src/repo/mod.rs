//! Repository contract: the persisted-state collaborator the Settings
//! Assembler and Admin Hooks read/write through. Grounded in the
//! SQLAlchemy access patterns of `original_source/crud/lpr.py`,
//! `crud/camera.py`, and `backend/crud/traffic.py`, but expressed as a
//! trait so the core gateway logic never depends on `sqlx` directly —
//! the same separation the teacher draws between `camera.rs` (protocol
//! logic) and nothing-persisted (the teacher has no DB layer at all;
//! this trait is this crate's own addition, needed to make the
//! Repository collaborator concrete).

pub mod sqlite;

use async_trait::async_trait;

use crate::model::{CameraRecord, DeviceRecord, SettingEntry, TrafficEvent};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violation: {0}")]
    Constraint(String),
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn device(&self, id: i64) -> Result<DeviceRecord, RepoError>;
    async fn devices_active(&self) -> Result<Vec<DeviceRecord>, RepoError>;
    async fn create_device(&self, name: &str, ip: &str, port: u16, auth_token: &str) -> Result<DeviceRecord, RepoError>;
    async fn update_device(&self, id: i64, name: Option<&str>, ip: Option<&str>, port: Option<u16>, auth_token: Option<&str>) -> Result<DeviceRecord, RepoError>;
    async fn set_device_active(&self, id: i64, active: bool) -> Result<DeviceRecord, RepoError>;
    async fn delete_device(&self, id: i64) -> Result<(), RepoError>;

    async fn camera(&self, id: i64) -> Result<CameraRecord, RepoError>;
    async fn cameras_for_device(&self, device_id: i64) -> Result<Vec<CameraRecord>, RepoError>;
    async fn create_camera(&self, name: &str, gate_id: i64, device_ids: &[i64]) -> Result<CameraRecord, RepoError>;
    async fn update_camera(&self, id: i64, name: Option<&str>, device_ids: Option<&[i64]>) -> Result<CameraRecord, RepoError>;
    async fn delete_camera(&self, id: i64) -> Result<(), RepoError>;

    async fn device_settings(&self, device_id: i64) -> Result<Vec<SettingEntry>, RepoError>;
    async fn camera_settings(&self, camera_id: i64) -> Result<Vec<SettingEntry>, RepoError>;

    async fn record_traffic(&self, event: &TrafficEvent) -> Result<(), RepoError>;
    async fn list_traffic(&self, camera_id: Option<i64>, limit: i64, offset: i64) -> Result<Vec<TrafficEvent>, RepoError>;
}
