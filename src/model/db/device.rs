use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// Marks a device as spent for one student once they have voted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUsage {
    /// Composite key, see [`DeviceUsage::key`].
    #[serde(rename = "_id")]
    pub id: String,
    pub device_id: String,
    pub used_by: String,
    pub used: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl DeviceUsage {
    /// A used-device record for `student_id` voting from `device_id`.
    pub fn used(device_id: &str, student_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(device_id, student_id),
            device_id: device_id.to_string(),
            used_by: student_id.to_string(),
            used: true,
            timestamp,
        }
    }

    pub fn key(device_id: &str, student_id: &str) -> String {
        format!("{device_id}_{student_id}")
    }
}
