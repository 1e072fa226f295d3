use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::schedule::VotingStatus,
    db::{Student, StudentChanges, DEFAULT_STUDENT_PASSWORD},
};

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 8;

/// A fresh random password of letters and digits.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// A random student ID of the form `S1234`. Callers check it is unused.
pub fn generate_student_id() -> String {
    format!("S{}", rand::thread_rng().gen_range(1000..10000))
}

/// How many random IDs to try before giving up on finding a free one.
const ID_ATTEMPTS: usize = 1000;

/// A generated student ID that is not in `taken`.
pub fn free_student_id(taken: &HashSet<String>) -> Result<String> {
    (0..ID_ATTEMPTS)
        .map(|_| generate_student_id())
        .find(|id| !taken.contains(id))
        .ok_or_else(|| {
            Error::Status(
                Status::Conflict,
                "No unused student IDs left to generate".to_string(),
            )
        })
}

/// Password shared by the seeded test students.
pub const SEED_PASSWORD: &str = "pass123";

/// Five test students, S101 to S105, spread over three classes.
pub fn seed_students(now: DateTime<Utc>) -> Vec<Student> {
    [
        ("S101", "Alice Johnson", "BCA-1"),
        ("S102", "Bob Smith", "BCA-1"),
        ("S103", "Charlie Brown", "BCA-2"),
        ("S104", "Diana Prince", "BCA-2"),
        ("S105", "Eve Wilson", "BCA-3"),
    ]
    .into_iter()
    .map(|(id, name, class)| {
        Student::new(
            id.to_string(),
            name.to_string(),
            class.to_string(),
            SEED_PASSWORD.to_string(),
            now,
        )
    })
    .collect()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Student {field} must not be empty"),
        ));
    }
    Ok(())
}

/// A student created by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSpec {
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl StudentSpec {
    /// Build the stored student, falling back to the default password.
    pub fn into_student(self, now: DateTime<Utc>) -> Result<Student> {
        require("ID", &self.student_id)?;
        require("name", &self.name)?;
        let password =
            non_blank(self.password).unwrap_or_else(|| DEFAULT_STUDENT_PASSWORD.to_string());
        Ok(Student::new(
            self.student_id.trim().to_string(),
            self.name,
            self.department,
            password,
            now,
        ))
    }
}

/// Changes to an existing student. A blank password keeps the current one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentUpdate {
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl TryFrom<StudentUpdate> for StudentChanges {
    type Error = Error;

    fn try_from(update: StudentUpdate) -> Result<Self> {
        require("name", &update.name)?;
        Ok(Self {
            name: update.name,
            department: update.department,
            password: non_blank(update.password),
        })
    }
}

/// One row of a bulk import. Blank IDs and passwords are generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRow {
    #[serde(default, alias = "studentId")]
    pub student_id: Option<String>,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl ImportRow {
    /// The explicitly given student ID, if any.
    pub fn given_id(&self) -> Option<String> {
        non_blank(self.student_id.clone()).map(|id| id.trim().to_string())
    }

    /// Build the stored student under `student_id`, generating a password if none was given.
    pub fn into_student(self, student_id: String, now: DateTime<Utc>) -> Student {
        let password = non_blank(self.password).unwrap_or_else(generate_password);
        Student::new(student_id, self.name, self.department, password, now)
    }
}

/// What a bulk import did: the credentials of every student it wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub credentials: Vec<StudentCredentials>,
}

/// How many records a bulk operation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub affected: u64,
}

/// Login details handed out to a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentCredentials {
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    pub password: String,
}

impl From<Student> for StudentCredentials {
    fn from(student: Student) -> Self {
        Self {
            student_id: student.student_id,
            name: student.name,
            department: student.department,
            password: student.password,
        }
    }
}

/// What admins see about a student in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDescription {
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    pub has_voted: bool,
    pub is_logged_in: bool,
    pub last_login_time: Option<DateTime<Utc>>,
    pub vote_timestamp: Option<DateTime<Utc>>,
}

impl From<Student> for StudentDescription {
    fn from(student: Student) -> Self {
        Self {
            student_id: student.student_id,
            name: student.name,
            department: student.department,
            has_voted: student.has_voted,
            is_logged_in: student.is_logged_in,
            last_login_time: student.last_login_time,
            vote_timestamp: student.vote_timestamp,
        }
    }
}

/// A student's own dashboard.
///
/// Every position is worth one voting credit; casting a ballot spends them all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub name: String,
    #[serde(rename = "class")]
    pub department: String,
    pub has_voted: bool,
    pub total_credits: usize,
    pub used_credits: usize,
    pub remaining_credits: usize,
    pub can_vote: bool,
    pub schedule: VotingStatus,
}

impl StudentProfile {
    pub fn new(student: Student, positions: usize, schedule: VotingStatus) -> Self {
        let used_credits = if student.has_voted { positions } else { 0 };
        Self {
            can_vote: schedule.is_active() && !student.has_voted && positions > 0,
            student_id: student.student_id,
            name: student.name,
            department: student.department,
            has_voted: student.has_voted,
            total_credits: positions,
            used_credits,
            remaining_credits: positions - used_credits,
            schedule,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl StudentSpec {
        pub fn example() -> Self {
            Self {
                student_id: "S102".to_string(),
                name: "Bob Smith".to_string(),
                department: "BCA-1".to_string(),
                password: None,
            }
        }
    }

    impl ImportRow {
        pub fn example() -> Self {
            Self {
                student_id: Some("S104".to_string()),
                name: "Diana Prince".to_string(),
                department: "BCA-2".to_string(),
                password: Some("pass123".to_string()),
            }
        }

        pub fn example_blank() -> Self {
            Self {
                student_id: None,
                name: "Eve Wilson".to_string(),
                department: "BCA-3".to_string(),
                password: Some(" ".to_string()),
            }
        }
    }
}
