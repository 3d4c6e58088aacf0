//! Canonical JSON serialization and HMAC signing for outbound `command`
//! and `lpr_settings` frames, grounded in `_handle_acknowledgment` /
//! `_create_command_message` in `original_source/tcp/tcp_client.py`:
//!
//! ```python
//! data_str = json.dumps(lpr_settings, separators=(',', ':'), sort_keys=True)
//! hmac_signature = hmac.new(hmac_key, data_str.encode(), hashlib.sha256).hexdigest()
//! ```
//!
//! `serde_json::Value::Object` already preserves BTreeMap-like key order
//! only if built from one; `to_canonical_string` below walks the value
//! tree and re-serializes objects with keys sorted, matching Python's
//! `sort_keys=True` exactly (including nested objects, which
//! `sort_keys` also affects).

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Serializes `value` the way `json.dumps(value, separators=(',', ':'),
/// sort_keys=True)` would: no whitespace, object keys sorted
/// lexicographically at every nesting level.
pub fn to_canonical_string<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    Ok(canonicalize(&value).to_string())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// HMAC-SHA256 over the canonical form of `value`, hex-encoded, matching
/// `hmac.new(key, data.encode(), hashlib.sha256).hexdigest()`.
pub fn sign<T: Serialize>(secret: &[u8], value: &T) -> serde_json::Result<String> {
    let canonical = to_canonical_string(value)?;
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies an HMAC-SHA256 hex digest against the canonical form of
/// `value`, using constant-time comparison (`Mac::verify_slice`).
pub fn verify<T: Serialize>(secret: &[u8], value: &T, signature_hex: &str) -> bool {
    let Ok(canonical) = to_canonical_string(value) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let canonical = to_canonical_string(&value).unwrap();
        assert_eq!(canonical, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn key_order_does_not_affect_the_signature() {
        let a = json!({"name": "x", "value": "y"});
        let b = json!({"value": "y", "name": "x"});
        assert_eq!(
            sign(b"secret", &a).unwrap(),
            sign(b"secret", &b).unwrap()
        );
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let value = json!({"camera_id": 5, "settings": [{"name": "fps", "value": "15"}]});
        let signature = sign(b"k", &value).unwrap();
        assert!(verify(b"k", &value, &signature));
    }

    #[test]
    fn verify_rejects_tampered_payload() {
        let value = json!({"camera_id": 5});
        let signature = sign(b"k", &value).unwrap();
        let tampered = json!({"camera_id": 6});
        assert!(!verify(b"k", &tampered, &signature));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let value = json!({"camera_id": 5});
        let signature = sign(b"k1", &value).unwrap();
        assert!(!verify(b"k2", &value, &signature));
    }
}
