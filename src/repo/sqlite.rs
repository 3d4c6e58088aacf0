//! `sqlx`-backed `Repository`, grounded in the connect/migrate shape of
//! the reference pack's SQLite storage layers: `SqliteConnectOptions`
//! with WAL journaling, `include_str!`-embedded migration SQL executed
//! statement-by-statement at startup.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::model::{CameraRecord, DeviceRecord, SettingEntry, TrafficEvent};

use super::{RepoError, Repository};

const MIGRATION_001: &str = include_str!("migrations/001_init.sql");

#[derive(Clone)]
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    pub async fn connect(database_url: &str) -> Result<Self, RepoError> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), RepoError> {
        for stmt in MIGRATION_001.split(';') {
            let stmt = stmt.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(pool).await?;
            }
        }
        Ok(())
    }

    fn row_to_device(row: &sqlx::sqlite::SqliteRow) -> Result<DeviceRecord, RepoError> {
        Ok(DeviceRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            ip: row.try_get("ip")?,
            port: row.try_get::<i64, _>("port")? as u16,
            auth_token: row.try_get("auth_token")?,
            is_active: row.try_get::<i64, _>("is_active")? != 0,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn device_ids_for_camera(&self, camera_id: i64) -> Result<Vec<i64>, RepoError> {
        let rows = sqlx::query("SELECT device_id FROM camera_device_links WHERE camera_id = ?")
            .bind(camera_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| r.try_get::<i64, _>("device_id"))
            .collect::<Result<Vec<_>, _>>()?)
    }

    fn row_to_camera_shell(row: &sqlx::sqlite::SqliteRow) -> Result<(i64, String, i64, bool, String, String), RepoError> {
        Ok((
            row.try_get("id")?,
            row.try_get("name")?,
            row.try_get("gate_id")?,
            row.try_get::<i64, _>("is_active")? != 0,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}

#[async_trait]
impl Repository for SqliteRepo {
    async fn device(&self, id: i64) -> Result<DeviceRecord, RepoError> {
        let row = sqlx::query("SELECT * FROM devices WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)?;
        Self::row_to_device(&row)
    }

    async fn devices_active(&self) -> Result<Vec<DeviceRecord>, RepoError> {
        let rows = sqlx::query("SELECT * FROM devices WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_device).collect()
    }

    async fn create_device(
        &self,
        name: &str,
        ip: &str,
        port: u16,
        auth_token: &str,
    ) -> Result<DeviceRecord, RepoError> {
        let now = Utc::now().to_rfc3339();
        let id = sqlx::query(
            "INSERT INTO devices (name, ip, port, auth_token, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(name)
        .bind(ip)
        .bind(port as i64)
        .bind(auth_token)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.device(id).await
    }

    async fn update_device(
        &self,
        id: i64,
        name: Option<&str>,
        ip: Option<&str>,
        port: Option<u16>,
        auth_token: Option<&str>,
    ) -> Result<DeviceRecord, RepoError> {
        let current = self.device(id).await?;
        let name = name.unwrap_or(&current.name);
        let ip = ip.unwrap_or(&current.ip);
        let port = port.unwrap_or(current.port);
        let auth_token = auth_token.unwrap_or(&current.auth_token);
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE devices SET name = ?, ip = ?, port = ?, auth_token = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(ip)
        .bind(port as i64)
        .bind(auth_token)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.device(id).await
    }

    async fn set_device_active(&self, id: i64, active: bool) -> Result<DeviceRecord, RepoError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE devices SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active as i64)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.device(id).await
    }

    async fn delete_device(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn camera(&self, id: i64) -> Result<CameraRecord, RepoError> {
        let row = sqlx::query("SELECT * FROM cameras WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepoError::NotFound)?;
        let (id, name, gate_id, is_active, created_at, updated_at) = Self::row_to_camera_shell(&row)?;
        let device_ids = self.device_ids_for_camera(id).await?;
        Ok(CameraRecord {
            id,
            name,
            gate_id,
            is_active,
            device_ids,
            created_at: created_at.parse().map_err(|_| RepoError::Constraint("bad created_at".into()))?,
            updated_at: updated_at.parse().map_err(|_| RepoError::Constraint("bad updated_at".into()))?,
        })
    }

    async fn cameras_for_device(&self, device_id: i64) -> Result<Vec<CameraRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT c.* FROM cameras c
             JOIN camera_device_links l ON l.camera_id = c.id
             WHERE l.device_id = ?",
        )
        .bind(device_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, name, gate_id, is_active, created_at, updated_at) = Self::row_to_camera_shell(&row)?;
            let device_ids = self.device_ids_for_camera(id).await?;
            out.push(CameraRecord {
                id,
                name,
                gate_id,
                is_active,
                device_ids,
                created_at: created_at.parse().map_err(|_| RepoError::Constraint("bad created_at".into()))?,
                updated_at: updated_at.parse().map_err(|_| RepoError::Constraint("bad updated_at".into()))?,
            });
        }
        Ok(out)
    }

    async fn create_camera(&self, name: &str, gate_id: i64, device_ids: &[i64]) -> Result<CameraRecord, RepoError> {
        let now = Utc::now().to_rfc3339();
        let id = sqlx::query(
            "INSERT INTO cameras (name, gate_id, is_active, created_at, updated_at) VALUES (?, ?, 1, ?, ?)",
        )
        .bind(name)
        .bind(gate_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        for device_id in device_ids {
            sqlx::query("INSERT INTO camera_device_links (camera_id, device_id) VALUES (?, ?)")
                .bind(id)
                .bind(device_id)
                .execute(&self.pool)
                .await?;
        }

        self.camera(id).await
    }

    async fn update_camera(
        &self,
        id: i64,
        name: Option<&str>,
        device_ids: Option<&[i64]>,
    ) -> Result<CameraRecord, RepoError> {
        let current = self.camera(id).await?;
        let name = name.unwrap_or(&current.name);
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE cameras SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if let Some(device_ids) = device_ids {
            sqlx::query("DELETE FROM camera_device_links WHERE camera_id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            for device_id in device_ids {
                sqlx::query("INSERT INTO camera_device_links (camera_id, device_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(device_id)
                    .execute(&self.pool)
                    .await?;
            }
        }

        self.camera(id).await
    }

    async fn delete_camera(&self, id: i64) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM cameras WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn device_settings(&self, device_id: i64) -> Result<Vec<SettingEntry>, RepoError> {
        self.settings_for("device", device_id).await
    }

    async fn camera_settings(&self, camera_id: i64) -> Result<Vec<SettingEntry>, RepoError> {
        self.settings_for("camera", camera_id).await
    }

    async fn record_traffic(&self, event: &TrafficEvent) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO traffic_events (plate_number, camera_id, timestamp, ocr_accuracy, vision_speed)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&event.plate_number)
        .bind(event.camera_id)
        .bind(event.timestamp.to_rfc3339())
        .bind(&event.ocr_accuracy)
        .bind(&event.vision_speed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_traffic(
        &self,
        camera_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TrafficEvent>, RepoError> {
        let rows = match camera_id {
            Some(camera_id) => {
                sqlx::query(
                    "SELECT * FROM traffic_events WHERE camera_id = ? ORDER BY id DESC LIMIT ? OFFSET ?",
                )
                .bind(camera_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM traffic_events ORDER BY id DESC LIMIT ? OFFSET ?")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| {
                let timestamp: String = row.try_get("timestamp")?;
                Ok(TrafficEvent {
                    camera_id: row.try_get("camera_id")?,
                    timestamp: timestamp
                        .parse()
                        .map_err(|_| RepoError::Constraint("bad timestamp".into()))?,
                    plate_number: row.try_get("plate_number")?,
                    ocr_accuracy: row.try_get("ocr_accuracy")?,
                    vision_speed: row.try_get("vision_speed")?,
                })
            })
            .collect()
    }
}

impl SqliteRepo {
    async fn settings_for(&self, owner_kind: &str, owner_id: i64) -> Result<Vec<SettingEntry>, RepoError> {
        let rows = sqlx::query(
            "SELECT name, value, value_type FROM setting_entries
             WHERE owner_kind = ? AND owner_id = ? ORDER BY name",
        )
        .bind(owner_kind)
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SettingEntry {
                    name: row.try_get("name")?,
                    value: row.try_get("value")?,
                    value_type: row.try_get("value_type")?,
                })
            })
            .collect()
    }
}
