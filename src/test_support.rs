//! Shared `Repository` fake for unit tests that exercise the pool,
//! admin hooks, and bootstrap sequencing without a real database.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::model::{CameraRecord, DeviceRecord, SettingEntry, TrafficEvent};
use crate::repo::{RepoError, Repository};

pub fn device(id: i64, is_active: bool) -> DeviceRecord {
    DeviceRecord {
        id,
        name: format!("device-{id}"),
        ip: "127.0.0.1".to_string(),
        port: 9000,
        auth_token: "token".to_string(),
        is_active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub struct FakeRepo {
    devices: Mutex<HashMap<i64, DeviceRecord>>,
}

impl FakeRepo {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices: Mutex::new(devices.into_iter().map(|d| (d.id, d)).collect()),
        }
    }
}

#[async_trait]
impl Repository for FakeRepo {
    async fn device(&self, id: i64) -> Result<DeviceRecord, RepoError> {
        self.devices.lock().unwrap().get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn devices_active(&self) -> Result<Vec<DeviceRecord>, RepoError> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect())
    }

    async fn create_device(&self, _: &str, _: &str, _: u16, _: &str) -> Result<DeviceRecord, RepoError> {
        unimplemented!()
    }
    async fn update_device(
        &self,
        _: i64,
        _: Option<&str>,
        _: Option<&str>,
        _: Option<u16>,
        _: Option<&str>,
    ) -> Result<DeviceRecord, RepoError> {
        unimplemented!()
    }
    async fn set_device_active(&self, id: i64, active: bool) -> Result<DeviceRecord, RepoError> {
        let mut devices = self.devices.lock().unwrap();
        let device = devices.get_mut(&id).ok_or(RepoError::NotFound)?;
        device.is_active = active;
        Ok(device.clone())
    }
    async fn delete_device(&self, id: i64) -> Result<(), RepoError> {
        self.devices.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn camera(&self, _: i64) -> Result<CameraRecord, RepoError> {
        unimplemented!()
    }
    async fn cameras_for_device(&self, _: i64) -> Result<Vec<CameraRecord>, RepoError> {
        Ok(vec![])
    }
    async fn create_camera(&self, _: &str, _: i64, _: &[i64]) -> Result<CameraRecord, RepoError> {
        unimplemented!()
    }
    async fn update_camera(&self, _: i64, _: Option<&str>, _: Option<&[i64]>) -> Result<CameraRecord, RepoError> {
        unimplemented!()
    }
    async fn delete_camera(&self, _: i64) -> Result<(), RepoError> {
        unimplemented!()
    }

    async fn device_settings(&self, _: i64) -> Result<Vec<SettingEntry>, RepoError> {
        Ok(vec![])
    }
    async fn camera_settings(&self, _: i64) -> Result<Vec<SettingEntry>, RepoError> {
        Ok(vec![])
    }

    async fn record_traffic(&self, _: &TrafficEvent) -> Result<(), RepoError> {
        Ok(())
    }
    async fn list_traffic(&self, _: Option<i64>, _: i64, _: i64) -> Result<Vec<TrafficEvent>, RepoError> {
        Ok(vec![])
    }
}
