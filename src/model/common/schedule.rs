use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::ElectionConfig;

const MS_PER_SECOND: i64 = 1000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Where the election currently is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    /// No configuration, or no voting window set.
    NotScheduled,
    /// Switched off by an admin, regardless of the window.
    Disabled,
    /// The window has not opened yet.
    NotStarted,
    /// Votes are being accepted.
    Active,
    /// The window has closed.
    Ended,
}

/// The derived voting status, as shown to students and admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub status: ScheduleState,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds until the countdown target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<Countdown>,
}

impl VotingStatus {
    /// Derive the status from the stored configuration at time `now`.
    ///
    /// The checks run in a fixed order: a disabled election reports as
    /// such even inside its window.
    pub fn evaluate(config: Option<&ElectionConfig>, now: DateTime<Utc>) -> Self {
        let config = match config {
            Some(config) => config,
            None => return Self::not_scheduled(),
        };

        if !config.is_active {
            return Self::simple(
                ScheduleState::Disabled,
                "Voting is currently disabled by the administrator.",
            );
        }

        let (start, end) = match (config.voting_start, config.voting_end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Self::not_scheduled(),
        };

        if now < start {
            let remaining = (start - now).num_milliseconds();
            Self {
                status: ScheduleState::NotStarted,
                message: format!("Voting will begin at {}", format_time(start)),
                start_time: Some(start),
                end_time: Some(end),
                time_remaining: Some(remaining),
                countdown: Some(Countdown::from_millis(remaining)),
            }
        } else if now > end {
            Self {
                status: ScheduleState::Ended,
                message: format!("Voting ended at {}", format_time(end)),
                start_time: Some(start),
                end_time: Some(end),
                time_remaining: None,
                countdown: None,
            }
        } else {
            let remaining = (end - now).num_milliseconds();
            Self {
                status: ScheduleState::Active,
                message: format!("Voting is active until {}", format_time(end)),
                start_time: Some(start),
                end_time: Some(end),
                time_remaining: Some(remaining),
                countdown: Some(Countdown::from_millis(remaining)),
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ScheduleState::Active
    }

    fn not_scheduled() -> Self {
        Self::simple(
            ScheduleState::NotScheduled,
            "Voting schedule has not been set.",
        )
    }

    fn simple(status: ScheduleState, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            start_time: None,
            end_time: None,
            time_remaining: None,
            countdown: None,
        }
    }
}

/// Remaining time broken down for a countdown display.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Countdown {
    /// Split a duration in milliseconds; anything non-positive is all zeroes.
    pub fn from_millis(millis: i64) -> Self {
        if millis <= 0 {
            return Self::default();
        }
        Self {
            days: millis / MS_PER_DAY,
            hours: (millis % MS_PER_DAY) / MS_PER_HOUR,
            minutes: (millis % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (millis % MS_PER_MINUTE) / MS_PER_SECOND,
        }
    }
}

/// Compact human-readable duration, e.g. `2h 5m 9s`.
pub fn format_duration(millis: i64) -> String {
    let seconds = millis.max(0) / MS_PER_SECOND;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Format a timestamp for status messages.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
