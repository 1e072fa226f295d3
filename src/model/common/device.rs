use data_encoding::HEXLOWER;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Only this much of the canvas signature contributes to the hash.
const CANVAS_PREFIX_CHARS: usize = 100;

/// Browser signals a device identifier is derived from.
///
/// Field order and naming matter: the hash is taken over the compact JSON
/// encoding, so the same browser always produces the same identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFingerprint {
    pub user_agent: String,
    pub language: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    #[serde(default)]
    pub canvas: String,
    #[serde(default)]
    pub cookie_enabled: bool,
    #[serde(default)]
    pub local_storage_enabled: bool,
    #[serde(default)]
    pub session_storage_enabled: bool,
}

impl DeviceFingerprint {
    /// The lowercase hex SHA-256 identifier for this device.
    pub fn device_id(&self) -> String {
        let mut signals = self.clone();
        signals.canvas = signals.canvas.chars().take(CANVAS_PREFIX_CHARS).collect();
        // Serialising a struct of strings and bools cannot fail.
        let encoded = serde_json::to_vec(&signals).unwrap_or_default();
        HEXLOWER.encode(&Sha256::digest(encoded))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hex_digest() {
        let fingerprint = DeviceFingerprint::example();
        let id = fingerprint.device_id();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id, DeviceFingerprint::example().device_id());
    }

    #[test]
    fn signals_change_identity() {
        let mut other = DeviceFingerprint::example();
        other.screen_resolution = "1280x720".to_string();
        assert_ne!(DeviceFingerprint::example().device_id(), other.device_id());
    }

    #[test]
    fn canvas_is_truncated() {
        let mut long = DeviceFingerprint::example();
        long.canvas = "x".repeat(CANVAS_PREFIX_CHARS);
        let mut longer = long.clone();
        longer.canvas.push_str("ignored");
        assert_eq!(long.device_id(), longer.device_id());
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(DeviceFingerprint::example()).unwrap();
        assert_eq!(json["screenResolution"], "1920x1080");
        assert_eq!(json["sessionStorageEnabled"], true);
    }
}
