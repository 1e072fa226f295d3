use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    db::{Candidate, NewCandidate},
};

/// A candidate as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo_url: String,
    pub position_id: ApiId,
}

impl TryFrom<CandidateSpec> for NewCandidate {
    type Error = Error;

    fn try_from(spec: CandidateSpec) -> Result<Self> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::Status(
                Status::BadRequest,
                "Candidate name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            department: spec.department,
            bio: spec.bio,
            photo_url: spec.photo_url,
            position_id: spec.position_id.into(),
        })
    }
}

/// An API-friendly candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    pub bio: String,
    pub photo_url: String,
    pub position_id: ApiId,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            department: candidate.candidate.department,
            bio: candidate.candidate.bio,
            photo_url: candidate.candidate.photo_url,
            position_id: candidate.candidate.position_id.into(),
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;
    use crate::model::mongodb::Id;

    impl CandidateSpec {
        pub fn example(position_id: Id) -> Self {
            let candidate = NewCandidate::example(position_id);
            Self {
                name: candidate.name,
                department: candidate.department,
                bio: candidate.bio,
                photo_url: candidate.photo_url,
                position_id: position_id.into(),
            }
        }

        pub fn example2(position_id: Id) -> Self {
            let candidate = NewCandidate::example2(position_id);
            Self {
                name: candidate.name,
                department: candidate.department,
                bio: candidate.bio,
                photo_url: candidate.photo_url,
                position_id: position_id.into(),
            }
        }
    }
}
