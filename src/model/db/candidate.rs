use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{optional_bson_datetime, Id};

/// Core candidate data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    /// Class or department, compared against the student's in departmental voting.
    #[serde(rename = "class")]
    pub department: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo_url: String,
    /// The position this candidate is standing for.
    pub position_id: Id,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "optional_bson_datetime", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn new(candidate: NewCandidate, now: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            candidate,
            created_at: now,
            updated_at: None,
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl CandidateCore {
        pub fn example(position_id: Id) -> Self {
            Self {
                name: "Priya Sharma".to_string(),
                department: "BCA-1".to_string(),
                bio: "Better canteen hours".to_string(),
                photo_url: String::new(),
                position_id,
            }
        }

        pub fn example2(position_id: Id) -> Self {
            Self {
                name: "Rahul Verma".to_string(),
                department: "BCA-2".to_string(),
                bio: "More sports events".to_string(),
                photo_url: String::new(),
                position_id,
            }
        }
    }
}
