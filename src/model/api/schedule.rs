use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::schedule::VotingStatus, db::ElectionConfig};

fn default_true() -> bool {
    true
}

/// The election settings as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    #[serde(default)]
    pub voting_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voting_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enable_departmental_voting: bool,
    #[serde(default = "default_true")]
    pub allow_cross_department_voting: bool,
    #[serde(default)]
    pub is_active: bool,
}

impl ScheduleSpec {
    /// Check the window and turn this into the configuration to store.
    pub fn into_config(self, now: DateTime<Utc>) -> Result<ElectionConfig> {
        let (start, end) = match (self.voting_start, self.voting_end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return Err(Error::Status(
                    Status::BadRequest,
                    "Please set both start and end times for voting.".to_string(),
                ))
            }
        };
        if start >= end {
            return Err(Error::Status(
                Status::BadRequest,
                "Voting end time must be after start time.".to_string(),
            ));
        }
        Ok(ElectionConfig {
            voting_start: Some(start),
            voting_end: Some(end),
            enable_departmental_voting: self.enable_departmental_voting,
            allow_cross_department_voting: self.allow_cross_department_voting,
            is_active: self.is_active,
            updated_at: Some(now),
        })
    }
}

/// The stored settings alongside what they currently mean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSchedule {
    pub voting_start: Option<DateTime<Utc>>,
    pub voting_end: Option<DateTime<Utc>>,
    pub enable_departmental_voting: bool,
    pub allow_cross_department_voting: bool,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub status: VotingStatus,
}

impl AdminSchedule {
    pub fn new(config: Option<ElectionConfig>, now: DateTime<Utc>) -> Self {
        let status = VotingStatus::evaluate(config.as_ref(), now);
        let config = config.unwrap_or_default();
        Self {
            voting_start: config.voting_start,
            voting_end: config.voting_end,
            enable_departmental_voting: config.enable_departmental_voting,
            allow_cross_department_voting: config.allow_cross_department_voting,
            is_active: config.is_active,
            updated_at: config.updated_at,
            status,
        }
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::common::schedule::ScheduleState;

    #[test]
    fn both_times_required() {
        let mut spec = ScheduleSpec::example_open();
        spec.voting_end = None;
        assert_eq!(
            spec.into_config(Utc::now()).unwrap_err().status(),
            Status::BadRequest
        );
    }

    #[test]
    fn end_must_follow_start() {
        let mut spec = ScheduleSpec::example_open();
        spec.voting_end = spec.voting_start;
        assert!(spec.into_config(Utc::now()).is_err());

        let mut spec = ScheduleSpec::example_open();
        spec.voting_end = spec.voting_start.map(|start| start - Duration::minutes(1));
        assert!(spec.into_config(Utc::now()).is_err());
    }

    #[test]
    fn saved_config_keeps_flags() {
        let now = Utc::now();
        let mut spec = ScheduleSpec::example_open();
        spec.enable_departmental_voting = true;
        spec.allow_cross_department_voting = false;
        let config = spec.into_config(now).unwrap();
        assert!(config.restricts_departments());
        assert_eq!(config.updated_at, Some(now));

        let schedule = AdminSchedule::new(Some(config), now);
        assert_eq!(schedule.status.status, ScheduleState::Active);
    }

    #[test]
    fn unconfigured_schedule() {
        let schedule = AdminSchedule::new(None, Utc::now());
        assert_eq!(schedule.status.status, ScheduleState::NotScheduled);
        assert!(schedule.allow_cross_department_voting);
        assert!(!schedule.is_active);
    }
}
