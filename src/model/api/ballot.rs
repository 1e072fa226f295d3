use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId, position::PositionDescription},
    common::department::DepartmentNotice,
};

/// One choice on a submitted ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotSpec {
    pub position_id: ApiId,
    pub candidate_id: ApiId,
}

/// A position as it appears on a student's ballot paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPosition {
    #[serde(flatten)]
    pub position: PositionDescription,
    pub candidates: Vec<CandidateDescription>,
}

/// What a student is shown when they go to vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPaper {
    pub positions: Vec<BallotPosition>,
    #[serde(default)]
    pub department: Option<DepartmentNotice>,
}

/// Confirmation of a recorded ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub student_id: String,
    pub votes_cast: usize,
    pub timestamp: DateTime<Utc>,
}
