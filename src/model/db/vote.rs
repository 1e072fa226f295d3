use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A single recorded choice of one candidate for one position.
///
/// The voter reference is kept so a student's votes can be removed along
/// with them; it is never exposed through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub position_id: Id,
    pub candidate_id: Id,
    pub voter_id: String,
    pub device_id: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        position_id: Id,
        candidate_id: Id,
        voter_id: String,
        device_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::new(),
            position_id,
            candidate_id,
            voter_id,
            device_id,
            timestamp,
        }
    }
}
