//! The persistence boundary.
//!
//! Routes never talk to a database directly; they go through [`Db`], which
//! wraps whichever [`Store`] the server was started with.

use std::{ops::Deref, sync::Arc};

use chrono::{DateTime, Utc};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::Result;
use crate::model::{
    db::{
        Admin, Candidate, ElectionConfig, NewAdmin, NewCandidate, NewPosition, Position, Student,
        StudentChanges, Vote,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Everything the election needs from its storage.
///
/// Methods that flip session or voting flags are conditional updates: they
/// report `false` instead of overwriting when the record is not in the
/// expected state.
#[rocket::async_trait]
pub trait Store: Send + Sync {
    // Admins.
    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>>;
    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>>;
    async fn admins(&self) -> Result<Vec<Admin>>;
    /// Returns `None` if the username is taken.
    async fn insert_admin(&self, admin: NewAdmin) -> Result<Option<Id>>;
    async fn delete_admin(&self, username: &str) -> Result<bool>;
    async fn count_admins(&self) -> Result<u64>;

    // Students.
    async fn student(&self, student_id: &str) -> Result<Option<Student>>;
    /// All students, ordered by name.
    async fn students(&self) -> Result<Vec<Student>>;
    /// Returns `false` if the student ID is taken.
    async fn insert_student(&self, student: Student) -> Result<bool>;
    /// Insert or overwrite a student.
    async fn put_student(&self, student: Student) -> Result<()>;
    async fn update_student(
        &self,
        student_id: &str,
        changes: StudentChanges,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    async fn set_password(&self, student_id: &str, password: &str, now: DateTime<Utc>)
        -> Result<bool>;
    /// Delete a student and every vote they cast.
    async fn delete_student(&self, student_id: &str) -> Result<bool>;
    /// Delete every vote, then every student. Returns the number of students removed.
    async fn delete_all_students(&self) -> Result<u64>;

    // Sessions and voting.
    /// Mark a student logged in from `device_id`, provided they have not
    /// voted and, unless `force`, are not already logged in.
    async fn claim_session(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<bool>;
    /// Log a student out, clearing their device.
    async fn release_session(&self, student_id: &str, now: DateTime<Utc>) -> Result<bool>;
    /// Log every student out. Returns the number of sessions released.
    async fn release_all_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
    /// Record a logged-in student's ballot: lock the student, store the
    /// votes and mark the device used. Returns `false` if the student was
    /// not logged in or has already voted, in which case nothing is written.
    async fn record_ballot(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        votes: Vec<Vote>,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Has this student already voted from this device?
    async fn device_used(&self, device_id: &str, student_id: &str) -> Result<bool>;

    // Positions.
    /// All positions, ordered by name.
    async fn positions(&self) -> Result<Vec<Position>>;
    async fn position(&self, id: Id) -> Result<Option<Position>>;
    async fn insert_position(&self, position: Position) -> Result<()>;
    async fn update_position(&self, id: Id, position: NewPosition, now: DateTime<Utc>)
        -> Result<bool>;
    /// Delete a position along with its candidates and their votes.
    async fn delete_position(&self, id: Id) -> Result<bool>;

    // Candidates.
    /// All candidates, ordered by name.
    async fn candidates(&self) -> Result<Vec<Candidate>>;
    async fn candidate(&self, id: Id) -> Result<Option<Candidate>>;
    async fn insert_candidate(&self, candidate: Candidate) -> Result<()>;
    async fn update_candidate(
        &self,
        id: Id,
        candidate: NewCandidate,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Delete a candidate and the votes cast for them.
    async fn delete_candidate(&self, id: Id) -> Result<bool>;

    // Votes.
    async fn votes(&self) -> Result<Vec<Vote>>;

    // Settings.
    async fn election_config(&self) -> Result<Option<ElectionConfig>>;
    async fn save_election_config(&self, config: &ElectionConfig) -> Result<()>;
}

/// Shared handle on the store, managed by Rocket.
#[derive(Clone)]
pub struct Db(Arc<dyn Store>);

impl Db {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self(Arc::new(store))
    }

    /// A fresh, empty in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl Deref for Db {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Db {
    type Error = ();

    /// Get the store from the managed state.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        req.guard::<&State<Db>>().await.map(|db| db.inner().clone())
    }
}
