use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rocket::tokio::sync::Mutex;

use crate::error::Result;
use crate::model::{
    db::{
        Admin, Candidate, DeviceUsage, ElectionConfig, NewAdmin, NewCandidate, NewPosition,
        Position, Student, StudentChanges, Vote,
    },
    mongodb::Id,
};

use super::Store;

#[derive(Default)]
struct Tables {
    admins: Vec<Admin>,
    students: HashMap<String, Student>,
    positions: HashMap<Id, Position>,
    candidates: HashMap<Id, Candidate>,
    votes: Vec<Vote>,
    devices: HashMap<String, DeviceUsage>,
    config: Option<ElectionConfig>,
}

/// A store that lives and dies with the process.
///
/// Every operation holds one lock for its whole duration, so the
/// conditional updates are trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .admins
            .iter()
            .find(|admin| admin.username == username)
            .cloned())
    }

    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>> {
        let tables = self.tables.lock().await;
        Ok(tables.admins.iter().find(|admin| admin.id == id).cloned())
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        Ok(self.tables.lock().await.admins.clone())
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Option<Id>> {
        let mut tables = self.tables.lock().await;
        if tables.admins.iter().any(|a| a.username == admin.username) {
            return Ok(None);
        }
        let id = Id::new();
        tables.admins.push(Admin { id, admin });
        Ok(Some(id))
    }

    async fn delete_admin(&self, username: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.admins.len();
        tables.admins.retain(|admin| admin.username != username);
        Ok(tables.admins.len() < before)
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.tables.lock().await.admins.len() as u64)
    }

    async fn student(&self, student_id: &str) -> Result<Option<Student>> {
        Ok(self.tables.lock().await.students.get(student_id).cloned())
    }

    async fn students(&self) -> Result<Vec<Student>> {
        let mut students: Vec<Student> =
            self.tables.lock().await.students.values().cloned().collect();
        students.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(students)
    }

    async fn insert_student(&self, student: Student) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        if tables.students.contains_key(&student.student_id) {
            return Ok(false);
        }
        tables.students.insert(student.student_id.clone(), student);
        Ok(true)
    }

    async fn put_student(&self, student: Student) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.students.insert(student.student_id.clone(), student);
        Ok(())
    }

    async fn update_student(
        &self,
        student_id: &str,
        changes: StudentChanges,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.get_mut(student_id) else {
            return Ok(false);
        };
        student.name = changes.name;
        student.department = changes.department;
        if let Some(password) = changes.password {
            student.password = password;
        }
        student.updated_at = Some(now);
        Ok(true)
    }

    async fn set_password(
        &self,
        student_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.get_mut(student_id) else {
            return Ok(false);
        };
        student.password = password.to_string();
        student.updated_at = Some(now);
        Ok(true)
    }

    async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.votes.retain(|vote| vote.voter_id != student_id);
        Ok(tables.students.remove(student_id).is_some())
    }

    async fn delete_all_students(&self) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        tables.votes.clear();
        let count = tables.students.len() as u64;
        tables.students.clear();
        Ok(count)
    }

    async fn claim_session(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.get_mut(student_id) else {
            return Ok(false);
        };
        if student.has_voted || (student.is_logged_in && !force) {
            return Ok(false);
        }
        student.is_logged_in = true;
        student.device_id = device_id.map(str::to_string);
        student.last_login_time = Some(now);
        Ok(true)
    }

    async fn release_session(&self, student_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.get_mut(student_id) else {
            return Ok(false);
        };
        student.is_logged_in = false;
        student.device_id = None;
        student.updated_at = Some(now);
        Ok(true)
    }

    async fn release_all_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let mut released = 0;
        for student in tables.students.values_mut().filter(|s| s.is_logged_in) {
            student.is_logged_in = false;
            student.device_id = None;
            student.updated_at = Some(now);
            released += 1;
        }
        Ok(released)
    }

    async fn record_ballot(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        votes: Vec<Vote>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(student) = tables.students.get_mut(student_id) else {
            return Ok(false);
        };
        // A session taken over by a force login no longer owns the ballot.
        if student.has_voted || !student.is_logged_in || student.device_id.as_deref() != device_id {
            return Ok(false);
        }
        student.has_voted = true;
        student.is_logged_in = false;
        student.vote_timestamp = Some(now);

        tables.votes.extend(votes);
        if let Some(device_id) = device_id {
            let usage = DeviceUsage::used(device_id, student_id, now);
            tables.devices.insert(usage.id.clone(), usage);
        }
        Ok(true)
    }

    async fn device_used(&self, device_id: &str, student_id: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables
            .devices
            .get(&DeviceUsage::key(device_id, student_id))
            .map_or(false, |usage| usage.used))
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let mut positions: Vec<Position> =
            self.tables.lock().await.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(positions)
    }

    async fn position(&self, id: Id) -> Result<Option<Position>> {
        Ok(self.tables.lock().await.positions.get(&id).cloned())
    }

    async fn insert_position(&self, position: Position) -> Result<()> {
        self.tables.lock().await.positions.insert(position.id, position);
        Ok(())
    }

    async fn update_position(
        &self,
        id: Id,
        position: NewPosition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.positions.get_mut(&id) else {
            return Ok(false);
        };
        existing.position = position;
        existing.updated_at = Some(now);
        Ok(true)
    }

    async fn delete_position(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.candidates.retain(|_, candidate| candidate.position_id != id);
        tables.votes.retain(|vote| vote.position_id != id);
        Ok(tables.positions.remove(&id).is_some())
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let mut candidates: Vec<Candidate> =
            self.tables.lock().await.candidates.values().cloned().collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(candidates)
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.tables.lock().await.candidates.get(&id).cloned())
    }

    async fn insert_candidate(&self, candidate: Candidate) -> Result<()> {
        self.tables.lock().await.candidates.insert(candidate.id, candidate);
        Ok(())
    }

    async fn update_candidate(
        &self,
        id: Id,
        candidate: NewCandidate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let Some(existing) = tables.candidates.get_mut(&id) else {
            return Ok(false);
        };
        existing.candidate = candidate;
        existing.updated_at = Some(now);
        Ok(true)
    }

    async fn delete_candidate(&self, id: Id) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.votes.retain(|vote| vote.candidate_id != id);
        Ok(tables.candidates.remove(&id).is_some())
    }

    async fn votes(&self) -> Result<Vec<Vote>> {
        Ok(self.tables.lock().await.votes.clone())
    }

    async fn election_config(&self) -> Result<Option<ElectionConfig>> {
        Ok(self.tables.lock().await.config.clone())
    }

    async fn save_election_config(&self, config: &ElectionConfig) -> Result<()> {
        self.tables.lock().await.config = Some(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::Db;

    async fn logged_in(db: &Db, device: Option<&str>) -> Student {
        let student = Student::example();
        db.put_student(student.clone()).await.unwrap();
        assert!(db
            .claim_session(&student.student_id, device, Utc::now(), false)
            .await
            .unwrap());
        student
    }

    #[rocket::async_test]
    async fn claim_session_is_conditional() {
        let db = Db::in_memory();
        let student = logged_in(&db, Some("laptop")).await;
        let id = &student.student_id;

        // Already logged in.
        assert!(!db.claim_session(id, Some("phone"), Utc::now(), false).await.unwrap());
        let stored = db.student(id).await.unwrap().unwrap();
        assert_eq!(stored.device_id.as_deref(), Some("laptop"));
        assert!(stored.last_login_time.is_some());

        // Forcing takes over the session.
        assert!(db.claim_session(id, Some("phone"), Utc::now(), true).await.unwrap());
        let stored = db.student(id).await.unwrap().unwrap();
        assert!(stored.session_matches(Some("phone")));

        // Nobody there.
        assert!(!db.claim_session("S999", None, Utc::now(), true).await.unwrap());
    }

    #[rocket::async_test]
    async fn record_ballot_locks_student_and_device() {
        let db = Db::in_memory();
        let student = logged_in(&db, Some("laptop")).await;
        let id = &student.student_id;
        let vote = Vote::new(Id::new(), Id::new(), id.clone(), Some("laptop".into()), Utc::now());

        assert!(db
            .record_ballot(id, Some("laptop"), vec![vote.clone()], Utc::now())
            .await
            .unwrap());
        let stored = db.student(id).await.unwrap().unwrap();
        assert!(stored.has_voted);
        assert!(!stored.is_logged_in);
        assert!(stored.vote_timestamp.is_some());
        assert!(db.device_used("laptop", id).await.unwrap());
        assert!(!db.device_used("laptop", "S102").await.unwrap());

        // A second submission writes nothing.
        assert!(!db
            .record_ballot(id, Some("laptop"), vec![vote], Utc::now())
            .await
            .unwrap());
        assert_eq!(db.votes().await.unwrap().len(), 1);

        // And the student can't log back in.
        assert!(!db.claim_session(id, None, Utc::now(), true).await.unwrap());
    }

    #[rocket::async_test]
    async fn superseded_session_cannot_vote() {
        let db = Db::in_memory();
        let student = logged_in(&db, Some("laptop")).await;
        let id = &student.student_id;
        assert!(db.claim_session(id, Some("phone"), Utc::now(), true).await.unwrap());

        let vote = Vote::new(Id::new(), Id::new(), id.clone(), Some("laptop".into()), Utc::now());
        assert!(!db
            .record_ballot(id, Some("laptop"), vec![vote], Utc::now())
            .await
            .unwrap());
        let stored = db.student(id).await.unwrap().unwrap();
        assert!(!stored.has_voted);
        assert!(db.votes().await.unwrap().is_empty());
        assert!(!db.device_used("laptop", id).await.unwrap());

        // The session that took over still can.
        assert!(db
            .record_ballot(id, Some("phone"), vec![], Utc::now())
            .await
            .unwrap());
        assert!(db.device_used("phone", id).await.unwrap());
    }

    #[rocket::async_test]
    async fn record_ballot_needs_a_session() {
        let db = Db::in_memory();
        let student = Student::example();
        db.put_student(student.clone()).await.unwrap();
        assert!(!db
            .record_ballot(&student.student_id, None, vec![], Utc::now())
            .await
            .unwrap());
        assert!(!db.student(&student.student_id).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn cascading_deletes() {
        let db = Db::in_memory();
        let now = Utc::now();
        let president = Position::new(NewPosition::example(), now);
        let secretary = Position::new(NewPosition::example2(), now);
        let priya = Candidate::new(NewCandidate::example(president.id), now);
        let rahul = Candidate::new(NewCandidate::example2(secretary.id), now);
        for position in [&president, &secretary] {
            db.insert_position(position.clone()).await.unwrap();
        }
        for candidate in [&priya, &rahul] {
            db.insert_candidate(candidate.clone()).await.unwrap();
        }
        let mut student = Student::example();
        student.is_logged_in = true;
        db.put_student(student.clone()).await.unwrap();
        let votes = vec![
            Vote::new(president.id, priya.id, student.student_id.clone(), None, now),
            Vote::new(secretary.id, rahul.id, student.student_id.clone(), None, now),
        ];
        db.record_ballot(&student.student_id, None, votes, now).await.unwrap();

        assert!(db.delete_position(president.id).await.unwrap());
        assert!(db.candidate(priya.id).await.unwrap().is_none());
        let votes = db.votes().await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].candidate_id, rahul.id);

        assert!(db.delete_candidate(rahul.id).await.unwrap());
        assert!(db.votes().await.unwrap().is_empty());
        assert!(!db.delete_candidate(rahul.id).await.unwrap());
    }

    #[rocket::async_test]
    async fn students_are_sorted_and_unique() {
        let db = Db::in_memory();
        assert!(db.insert_student(Student::example2()).await.unwrap());
        assert!(db.insert_student(Student::example()).await.unwrap());
        assert!(!db.insert_student(Student::example()).await.unwrap());

        let names: Vec<_> = db.students().await.unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Alice Johnson", "Charlie Brown"]);

        assert_eq!(db.delete_all_students().await.unwrap(), 2);
        assert!(db.students().await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn release_all_sessions_counts() {
        let db = Db::in_memory();
        logged_in(&db, Some("laptop")).await;
        db.put_student(Student::example2()).await.unwrap();

        assert_eq!(db.release_all_sessions(Utc::now()).await.unwrap(), 1);
        let student = db.student("S101").await.unwrap().unwrap();
        assert!(!student.is_logged_in);
        assert_eq!(student.device_id, None);
    }
}
