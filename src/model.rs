//! Persisted and wire-facing data shapes shared across the gateway.
//!
//! Mirrors the entities in `original_source/models/` and `schema/`:
//! `DeviceRecord` ~ `DBLpr`, `CameraRecord` ~ `DBCamera`, the
//! camera/device many-to-many ~ `camera_lpr_association`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed LPR/camera configuration value (spec.md §4.2: int|float|string|bool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl SettingValue {
    /// Coerce a stored `(value, value_type)` pair the way
    /// `fetch_lpr_settings` in `tcp_client.py` does: unknown types pass
    /// through as the raw string.
    pub fn coerce(raw: &str, value_type: &str) -> Self {
        match value_type {
            "int" => raw
                .parse::<i64>()
                .map(SettingValue::Int)
                .unwrap_or_else(|_| SettingValue::String(raw.to_string())),
            "float" => raw
                .parse::<f64>()
                .map(SettingValue::Float)
                .unwrap_or_else(|_| SettingValue::String(raw.to_string())),
            "bool" => raw
                .parse::<bool>()
                .map(SettingValue::Bool)
                .unwrap_or_else(|_| SettingValue::String(raw.to_string())),
            _ => SettingValue::String(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub name: String,
    pub value: String,
    pub value_type: String,
}

/// Persisted identity of a field LPR device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub auth_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// The fields that, if changed, require a full reconnect rather than
    /// a hot reconfigure (spec.md §4.5 `update`).
    pub fn endpoint(&self) -> (String, u16, String) {
        (self.ip.clone(), self.port, self.auth_token.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    pub id: i64,
    pub name: String,
    pub gate_id: i64,
    pub is_active: bool,
    pub device_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted traffic row, mirrors `backend/models/traffic.py::DBTraffic`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficEvent {
    pub camera_id: i64,
    pub timestamp: DateTime<Utc>,
    pub plate_number: String,
    pub ocr_accuracy: Option<String>,
    pub vision_speed: Option<String>,
}

/// A car detected within one `plates_data` frame (spec.md §4.3 projection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarDetection {
    pub plate_number: String,
    pub plate_image: String,
    pub ocr_accuracy: String,
    pub vision_speed: f64,
    pub vehicle_class: serde_json::Value,
    pub vehicle_type: serde_json::Value,
    pub vehicle_color: serde_json::Value,
}

/// Projected `plates_data` event, broadcast to the camera's WS room and
/// handed to the ingest sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatesDataEvent {
    #[serde(rename = "messageType")]
    pub message_type: &'static str,
    pub timestamp: Option<String>,
    pub camera_id: i64,
    pub full_image: Option<String>,
    pub cars: Vec<CarDetection>,
}

/// Projected `live` event, WS broadcast only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    #[serde(rename = "messageType")]
    pub message_type: &'static str,
    pub camera_id: i64,
    pub live_image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_known_types() {
        assert_eq!(SettingValue::coerce("42", "int"), SettingValue::Int(42));
        assert_eq!(SettingValue::coerce("0.65", "float"), SettingValue::Float(0.65));
        assert_eq!(SettingValue::coerce("true", "bool"), SettingValue::Bool(true));
    }

    #[test]
    fn unknown_type_passes_through_as_string() {
        assert_eq!(
            SettingValue::coerce("abc", "enum"),
            SettingValue::String("abc".to_string())
        );
    }

    #[test]
    fn malformed_int_falls_back_to_string() {
        assert_eq!(
            SettingValue::coerce("not-a-number", "int"),
            SettingValue::String("not-a-number".to_string())
        );
    }
}
