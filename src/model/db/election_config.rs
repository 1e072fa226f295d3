use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::optional_bson_datetime;

/// ID of the singleton settings document.
pub const ELECTION_CONFIG_ID: &str = "electionConfig";

/// How long voting stays open when started without a saved end time.
pub const DEFAULT_VOTING_HOURS: i64 = 8;

fn default_true() -> bool {
    true
}

/// Election-wide settings. There is only ever one, and it is overwritten
/// wholesale on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionConfig {
    #[serde(with = "optional_bson_datetime", default)]
    pub voting_start: Option<DateTime<Utc>>,
    #[serde(with = "optional_bson_datetime", default)]
    pub voting_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enable_departmental_voting: bool,
    #[serde(default = "default_true")]
    pub allow_cross_department_voting: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(with = "optional_bson_datetime", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            voting_start: None,
            voting_end: None,
            enable_departmental_voting: false,
            allow_cross_department_voting: true,
            is_active: false,
            updated_at: None,
        }
    }
}

impl ElectionConfig {
    /// Open voting immediately, keeping the previously saved end time if
    /// it is still ahead of `now`.
    pub fn started_now(previous: Option<&Self>, now: DateTime<Utc>) -> Self {
        let previous = previous.cloned().unwrap_or_default();
        let end = previous
            .voting_end
            .filter(|end| *end > now)
            .unwrap_or_else(|| now + Duration::hours(DEFAULT_VOTING_HOURS));
        Self {
            voting_start: Some(now),
            voting_end: Some(end),
            is_active: true,
            updated_at: Some(now),
            ..previous
        }
    }

    /// Close voting immediately.
    pub fn ended_now(previous: Option<&Self>, now: DateTime<Utc>) -> Self {
        let previous = previous.cloned().unwrap_or_default();
        Self {
            voting_start: Some(previous.voting_start.unwrap_or(now)),
            voting_end: Some(now),
            is_active: false,
            updated_at: Some(now),
            ..previous
        }
    }

    /// Should candidates from other departments be hidden from students?
    pub fn restricts_departments(&self) -> bool {
        self.enable_departmental_voting && !self.allow_cross_department_voting
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionConfig {
        /// An active window that opened an hour ago and closes in an hour.
        pub fn example_active() -> Self {
            let now = Utc::now();
            Self {
                voting_start: Some(now - Duration::hours(1)),
                voting_end: Some(now + Duration::hours(1)),
                is_active: true,
                ..Default::default()
            }
        }

        /// A window that closed an hour ago.
        pub fn example_ended() -> Self {
            let now = Utc::now();
            Self {
                voting_start: Some(now - Duration::hours(2)),
                voting_end: Some(now - Duration::hours(1)),
                is_active: true,
                ..Default::default()
            }
        }
    }
}
