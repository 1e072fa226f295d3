use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::error::Rejection;
use crate::model::mongodb::optional_bson_datetime;

/// Password given to manually created students when none is supplied.
pub const DEFAULT_STUDENT_PASSWORD: &str = "password123";

/// A student voter, keyed by their student ID.
///
/// The password is kept in plaintext: admins hand credentials out and
/// export them again, so it must stay recoverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "_id")]
    pub student_id: String,
    pub name: String,
    /// Class or department, used for departmental voting.
    #[serde(rename = "class")]
    pub department: String,
    pub password: String,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub is_logged_in: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(with = "optional_bson_datetime", default)]
    pub last_login_time: Option<DateTime<Utc>>,
    #[serde(with = "optional_bson_datetime", default)]
    pub vote_timestamp: Option<DateTime<Utc>>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "optional_bson_datetime", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Student {
    /// A fresh student who has neither logged in nor voted.
    pub fn new(
        student_id: String,
        name: String,
        department: String,
        password: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id,
            name,
            department,
            password,
            has_voted: false,
            is_logged_in: false,
            device_id: None,
            last_login_time: None,
            vote_timestamp: None,
            created_at: now,
            updated_at: None,
        }
    }

    /// Check whether this student may log in with the given password.
    ///
    /// The device lock is checked separately, since it lives in its own collection.
    pub fn check_login(&self, password: &str, force: bool) -> Result<(), Rejection> {
        if self.password != password {
            return Err(Rejection::InvalidCredential);
        }
        if self.has_voted {
            return Err(Rejection::AlreadyVoted);
        }
        if self.is_logged_in && !force {
            return Err(Rejection::AlreadyLoggedIn);
        }
        Ok(())
    }

    /// Does an open session from `device_id` belong to this student?
    pub fn session_matches(&self, device_id: Option<&str>) -> bool {
        self.is_logged_in && !self.has_voted && self.device_id.as_deref() == device_id
    }
}

/// Editable student fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentChanges {
    pub name: String,
    pub department: String,
    /// `None` keeps the current password.
    pub password: Option<String>,
}
