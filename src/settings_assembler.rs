//! Assembles the `lpr_settings` payload sent to a device after
//! authentication, grounded in `fetch_lpr_settings` in
//! `original_source/tcp/tcp_client.py`:
//!
//! ```python
//! cameras_data.append({"camera_id": camera.id, "settings": [...]})
//! return {"lpr_id": lpr.id, "settings": settings_data, "cameras_data": cameras_data}
//! ```
//!
//! The Python source builds these lists in whatever order the ORM
//! returns rows, which is not guaranteed stable. This assembler sorts
//! settings by name and cameras by id so the canonical JSON used for
//! HMAC signing (and the wire payload itself) is deterministic across
//! runs — the REDESIGN spec.md calls for.

use std::sync::Arc;

use serde::Serialize;

use crate::model::SettingValue;
use crate::repo::{RepoError, Repository};

#[derive(Debug, Clone, Serialize)]
pub struct TypedSetting {
    pub name: String,
    pub value: SettingValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraSettings {
    pub camera_id: i64,
    pub settings: Vec<TypedSetting>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSettingsPayload {
    pub lpr_id: i64,
    pub settings: Vec<TypedSetting>,
    pub cameras_data: Vec<CameraSettings>,
}

pub struct SettingsAssembler {
    repo: Arc<dyn Repository>,
}

impl SettingsAssembler {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn assemble(&self, device_id: i64) -> Result<DeviceSettingsPayload, RepoError> {
        let mut settings = typed_settings(self.repo.device_settings(device_id).await?);
        settings.sort_by(|a, b| a.name.cmp(&b.name));

        let mut cameras = self.repo.cameras_for_device(device_id).await?;
        cameras.sort_by_key(|c| c.id);

        let mut cameras_data = Vec::with_capacity(cameras.len());
        for camera in cameras {
            let mut camera_settings = typed_settings(self.repo.camera_settings(camera.id).await?);
            camera_settings.sort_by(|a, b| a.name.cmp(&b.name));
            cameras_data.push(CameraSettings {
                camera_id: camera.id,
                settings: camera_settings,
            });
        }

        Ok(DeviceSettingsPayload {
            lpr_id: device_id,
            settings,
            cameras_data,
        })
    }
}

fn typed_settings(entries: Vec<crate::model::SettingEntry>) -> Vec<TypedSetting> {
    entries
        .into_iter()
        .map(|e| TypedSetting {
            value: SettingValue::coerce(&e.value, &e.value_type),
            name: e.name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CameraRecord, DeviceRecord, SettingEntry, TrafficEvent};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;

    struct FakeRepo {
        device_settings: HashMap<i64, Vec<SettingEntry>>,
        camera_settings: HashMap<i64, Vec<SettingEntry>>,
        cameras: HashMap<i64, Vec<CameraRecord>>,
    }

    #[async_trait]
    impl Repository for FakeRepo {
        async fn device(&self, _id: i64) -> Result<DeviceRecord, RepoError> {
            unimplemented!()
        }
        async fn devices_active(&self) -> Result<Vec<DeviceRecord>, RepoError> {
            unimplemented!()
        }
        async fn create_device(&self, _: &str, _: &str, _: u16, _: &str) -> Result<DeviceRecord, RepoError> {
            unimplemented!()
        }
        async fn update_device(&self, _: i64, _: Option<&str>, _: Option<&str>, _: Option<u16>, _: Option<&str>) -> Result<DeviceRecord, RepoError> {
            unimplemented!()
        }
        async fn set_device_active(&self, _: i64, _: bool) -> Result<DeviceRecord, RepoError> {
            unimplemented!()
        }
        async fn delete_device(&self, _: i64) -> Result<(), RepoError> {
            unimplemented!()
        }
        async fn camera(&self, _: i64) -> Result<CameraRecord, RepoError> {
            unimplemented!()
        }
        async fn cameras_for_device(&self, device_id: i64) -> Result<Vec<CameraRecord>, RepoError> {
            Ok(self.cameras.get(&device_id).cloned().unwrap_or_default())
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
        async fn device_settings(&self, device_id: i64) -> Result<Vec<SettingEntry>, RepoError> {
            Ok(self.device_settings.get(&device_id).cloned().unwrap_or_default())
        }
        async fn camera_settings(&self, camera_id: i64) -> Result<Vec<SettingEntry>, RepoError> {
            Ok(self.camera_settings.get(&camera_id).cloned().unwrap_or_default())
        }
        async fn record_traffic(&self, _: &TrafficEvent) -> Result<(), RepoError> {
            unimplemented!()
        }
        async fn list_traffic(&self, _: Option<i64>, _: i64, _: i64) -> Result<Vec<TrafficEvent>, RepoError> {
            unimplemented!()
        }
    }

    fn camera(id: i64) -> CameraRecord {
        CameraRecord {
            id,
            name: format!("cam-{id}"),
            gate_id: 1,
            is_active: true,
            device_ids: vec![1],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn settings_are_sorted_by_name_and_cameras_by_id() {
        let mut device_settings = HashMap::new();
        device_settings.insert(
            1,
            vec![
                SettingEntry { name: "zoom".into(), value: "2".into(), value_type: "int".into() },
                SettingEntry { name: "fps".into(), value: "15".into(), value_type: "int".into() },
            ],
        );
        let mut cameras = HashMap::new();
        cameras.insert(1, vec![camera(9), camera(2)]);

        let repo: Arc<dyn Repository> = Arc::new(FakeRepo {
            device_settings,
            camera_settings: HashMap::new(),
            cameras,
        });
        let assembler = SettingsAssembler::new(repo);
        let payload = assembler.assemble(1).await.unwrap();

        assert_eq!(payload.lpr_id, 1);
        assert_eq!(payload.settings[0].name, "fps");
        assert_eq!(payload.settings[1].name, "zoom");
        assert_eq!(payload.cameras_data[0].camera_id, 2);
        assert_eq!(payload.cameras_data[1].camera_id, 9);
    }

    #[tokio::test]
    async fn missing_device_has_empty_settings_and_cameras() {
        let repo: Arc<dyn Repository> = Arc::new(FakeRepo {
            device_settings: HashMap::new(),
            camera_settings: HashMap::new(),
            cameras: HashMap::new(),
        });
        let assembler = SettingsAssembler::new(repo);
        let payload = assembler.assemble(42).await.unwrap();
        assert!(payload.settings.is_empty());
        assert!(payload.cameras_data.is_empty());
    }
}
