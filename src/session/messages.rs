//! Wire message construction, grounded in `_create_auth_message`,
//! `_handle_acknowledgment`, and `_create_command_message` in
//! `original_source/tcp/tcp_client.py`.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::canonical::sign;
use crate::settings_assembler::DeviceSettingsPayload;

pub fn authentication(token: &str) -> (String, Value) {
    let message_id = Uuid::new_v4().to_string();
    let body = json!({
        "messageId": message_id,
        "messageType": "authentication",
        "messageBody": { "token": token },
    });
    (message_id, body)
}

/// Builds the `lpr_settings` frame, HMAC-signed over its canonical
/// JSON form — mirrors `data_str = json.dumps(lpr_settings,
/// separators=(',', ':'), sort_keys=True)` then
/// `hmac.new(hmac_key, data_str.encode(), hashlib.sha256).hexdigest()`.
pub fn lpr_settings(
    reply_to: &str,
    secret: &[u8],
    payload: &DeviceSettingsPayload,
) -> serde_json::Result<Value> {
    let hmac = sign(secret, payload)?;
    Ok(json!({
        "messageId": reply_to,
        "messageType": "lpr_settings",
        "messageBody": { "data": payload, "hmac": hmac },
    }))
}

pub fn command(secret: &[u8], command_data: &Value) -> serde_json::Result<Value> {
    let message_id = Uuid::new_v4().to_string();
    let hmac = sign(secret, command_data)?;
    Ok(json!({
        "messageId": message_id,
        "messageType": "command",
        "messageBody": { "data": command_data, "hmac": hmac },
    }))
}

/// Best-effort read of `messageType`, used to dispatch an inbound frame.
pub fn message_type(frame: &Value) -> Option<&str> {
    frame.get("messageType").and_then(Value::as_str)
}

pub fn reply_to(frame: &Value) -> Option<&str> {
    frame
        .get("messageBody")
        .and_then(|b| b.get("replyTo"))
        .and_then(Value::as_str)
}

/// Reads the signature carried by an inbound frame, if any. Not every
/// inbound `messageType` is signed (`acknowledge`, `command_response`
/// carry no `hmac`), so this is `None` rather than an error.
pub fn hmac(frame: &Value) -> Option<&str> {
    frame
        .get("messageBody")
        .and_then(|b| b.get("hmac"))
        .and_then(Value::as_str)
}

/// Reads the signed payload an inbound `hmac` covers.
pub fn data(frame: &Value) -> Value {
    frame
        .get("messageBody")
        .and_then(|b| b.get("data"))
        .cloned()
        .unwrap_or(Value::Null)
}
