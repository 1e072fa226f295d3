use serde::{Deserialize, Serialize};

use crate::model::common::device::DeviceFingerprint;

/// A student login attempt.
///
/// The device is identified either by an ID the browser cached from an
/// earlier visit, or by the raw signals to derive one from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentLogin {
    pub student_id: String,
    pub password: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<DeviceFingerprint>,
}

impl StudentLogin {
    /// The device this login comes from, if the client told us anything about it.
    pub fn device_id(&self) -> Option<String> {
        self.device_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.fingerprint.as_ref().map(DeviceFingerprint::device_id))
    }
}
