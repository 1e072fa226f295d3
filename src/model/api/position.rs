use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    db::{NewPosition, Position},
};

/// A position as submitted by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl TryFrom<PositionSpec> for NewPosition {
    type Error = Error;

    fn try_from(spec: PositionSpec) -> Result<Self> {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(Error::Status(
                Status::BadRequest,
                "Position name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            description: spec.description,
        })
    }
}

/// An API-friendly position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDescription {
    pub id: ApiId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<Position> for PositionDescription {
    fn from(position: Position) -> Self {
        Self {
            id: position.id.into(),
            name: position.position.name,
            description: position.position.description,
            created_at: position.created_at,
        }
    }
}
