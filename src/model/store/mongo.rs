use chrono::{DateTime, Utc};
use log::debug;
use mongodb::{
    bson::{self, doc, Bson, Document},
    options::{FindOptions, ReplaceOptions},
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::Result;
use crate::model::{
    db::{
        Admin, Candidate, DeviceUsage, ElectionConfig, NewAdmin, NewCandidate, NewPosition,
        Position, Student, StudentChanges, Vote, ELECTION_CONFIG_ID,
    },
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll, Id},
};

use super::Store;

/// The production store, backed by a MongoDB replica set.
///
/// Multi-document writes run in a transaction, so a replica set is required.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the given database, creating any missing indexes.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        Ok(Self { client, db })
    }

    fn coll<T: crate::model::mongodb::MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }
}

fn by_name() -> FindOptions {
    FindOptions::builder().sort(doc! { "name": 1 }).build()
}

fn upsert() -> ReplaceOptions {
    ReplaceOptions::builder().upsert(true).build()
}

fn bson_time(time: DateTime<Utc>) -> Bson {
    Bson::DateTime(bson::DateTime::from_chrono(time))
}

fn student_filter(student_id: &str) -> Document {
    doc! { "_id": student_id }
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn admin_by_username(&self, username: &str) -> Result<Option<Admin>> {
        let filter = doc! { "username": username };
        Ok(self.coll::<Admin>().find_one(filter, None).await?)
    }

    async fn admin_by_id(&self, id: Id) -> Result<Option<Admin>> {
        Ok(self.coll::<Admin>().find_one(id.as_doc(), None).await?)
    }

    async fn admins(&self) -> Result<Vec<Admin>> {
        let cursor = self.coll::<Admin>().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_admin(&self, admin: NewAdmin) -> Result<Option<Id>> {
        let result = self.coll::<NewAdmin>().insert_one(&admin, None).await;
        if is_duplicate_key_error(result.as_ref()) {
            return Ok(None);
        }
        // The driver always reports the generated ObjectId.
        Ok(result?.inserted_id.as_object_id().map(Id::from))
    }

    async fn delete_admin(&self, username: &str) -> Result<bool> {
        let filter = doc! { "username": username };
        let result = self.coll::<Admin>().delete_one(filter, None).await?;
        Ok(result.deleted_count == 1)
    }

    async fn count_admins(&self) -> Result<u64> {
        Ok(self.coll::<Admin>().count_documents(None, None).await?)
    }

    async fn student(&self, student_id: &str) -> Result<Option<Student>> {
        let filter = student_filter(student_id);
        Ok(self.coll::<Student>().find_one(filter, None).await?)
    }

    async fn students(&self) -> Result<Vec<Student>> {
        let cursor = self.coll::<Student>().find(None, by_name()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_student(&self, student: Student) -> Result<bool> {
        let result = self.coll::<Student>().insert_one(&student, None).await;
        if is_duplicate_key_error(result.as_ref()) {
            return Ok(false);
        }
        result?;
        Ok(true)
    }

    async fn put_student(&self, student: Student) -> Result<()> {
        let filter = student_filter(&student.student_id);
        self.coll::<Student>()
            .replace_one(filter, &student, upsert())
            .await?;
        Ok(())
    }

    async fn update_student(
        &self,
        student_id: &str,
        changes: StudentChanges,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut set = doc! {
            "name": changes.name,
            "class": changes.department,
            "updated_at": bson_time(now),
        };
        if let Some(password) = changes.password {
            set.insert("password", password);
        }
        let result = self
            .coll::<Student>()
            .update_one(student_filter(student_id), doc! { "$set": set }, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn set_password(
        &self,
        student_id: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let update = doc! {
            "$set": {
                "password": password,
                "updated_at": bson_time(now),
            }
        };
        let result = self
            .coll::<Student>()
            .update_one(student_filter(student_id), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_student(&self, student_id: &str) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        self.coll::<Vote>()
            .delete_many_with_session(doc! { "voter_id": student_id }, None, &mut session)
            .await?;
        let result = self
            .coll::<Student>()
            .delete_one_with_session(student_filter(student_id), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(result.deleted_count == 1)
    }

    async fn delete_all_students(&self) -> Result<u64> {
        // Votes go first, so a failure part way never leaves orphaned votes.
        self.coll::<Vote>().delete_many(doc! {}, None).await?;
        let result = self.coll::<Student>().delete_many(doc! {}, None).await?;
        Ok(result.deleted_count)
    }

    async fn claim_session(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<bool> {
        let mut filter = doc! {
            "_id": student_id,
            "has_voted": false,
        };
        if !force {
            filter.insert("is_logged_in", false);
        }
        let update = doc! {
            "$set": {
                "is_logged_in": true,
                "device_id": device_id,
                "last_login_time": bson_time(now),
            }
        };
        let result = self
            .coll::<Student>()
            .update_one(filter, update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn release_session(&self, student_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let update = doc! {
            "$set": {
                "is_logged_in": false,
                "device_id": Bson::Null,
                "updated_at": bson_time(now),
            }
        };
        let result = self
            .coll::<Student>()
            .update_one(student_filter(student_id), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn release_all_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let update = doc! {
            "$set": {
                "is_logged_in": false,
                "device_id": Bson::Null,
                "updated_at": bson_time(now),
            }
        };
        let result = self
            .coll::<Student>()
            .update_many(doc! { "is_logged_in": true }, update, None)
            .await?;
        Ok(result.modified_count)
    }

    async fn record_ballot(
        &self,
        student_id: &str,
        device_id: Option<&str>,
        votes: Vec<Vote>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Lock the student first. Losing this race means someone else voted,
        // or a force login moved the session to another device.
        let filter = doc! {
            "_id": student_id,
            "has_voted": false,
            "is_logged_in": true,
            "device_id": device_id,
        };
        let update = doc! {
            "$set": {
                "has_voted": true,
                "is_logged_in": false,
                "vote_timestamp": bson_time(now),
            }
        };
        let result = self
            .coll::<Student>()
            .update_one_with_session(filter, update, None, &mut session)
            .await?;
        if result.matched_count != 1 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        if !votes.is_empty() {
            self.coll::<Vote>()
                .insert_many_with_session(&votes, None, &mut session)
                .await?;
        }

        if let Some(device_id) = device_id {
            let usage = DeviceUsage::used(device_id, student_id, now);
            self.coll::<DeviceUsage>()
                .replace_one_with_session(doc! { "_id": &usage.id }, &usage, upsert(), &mut session)
                .await?;
        }

        session.commit_transaction().await?;
        debug!("Recorded {} votes for {student_id}", votes.len());
        Ok(true)
    }

    async fn device_used(&self, device_id: &str, student_id: &str) -> Result<bool> {
        let filter = doc! {
            "_id": DeviceUsage::key(device_id, student_id),
            "used": true,
        };
        let count = self
            .coll::<DeviceUsage>()
            .count_documents(filter, None)
            .await?;
        Ok(count > 0)
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let cursor = self.coll::<Position>().find(None, by_name()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn position(&self, id: Id) -> Result<Option<Position>> {
        Ok(self.coll::<Position>().find_one(id.as_doc(), None).await?)
    }

    async fn insert_position(&self, position: Position) -> Result<()> {
        self.coll::<Position>().insert_one(&position, None).await?;
        Ok(())
    }

    async fn update_position(
        &self,
        id: Id,
        position: NewPosition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let update = doc! {
            "$set": {
                "name": position.name,
                "description": position.description,
                "updated_at": bson_time(now),
            }
        };
        let result = self
            .coll::<Position>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_position(&self, id: Id) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let with_position = doc! { "position_id": id };
        self.coll::<Vote>()
            .delete_many_with_session(with_position.clone(), None, &mut session)
            .await?;
        self.coll::<Candidate>()
            .delete_many_with_session(with_position, None, &mut session)
            .await?;
        let result = self
            .coll::<Position>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(result.deleted_count == 1)
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let cursor = self.coll::<Candidate>().find(None, by_name()).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn candidate(&self, id: Id) -> Result<Option<Candidate>> {
        Ok(self.coll::<Candidate>().find_one(id.as_doc(), None).await?)
    }

    async fn insert_candidate(&self, candidate: Candidate) -> Result<()> {
        self.coll::<Candidate>().insert_one(&candidate, None).await?;
        Ok(())
    }

    async fn update_candidate(
        &self,
        id: Id,
        candidate: NewCandidate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let update = doc! {
            "$set": {
                "name": candidate.name,
                "class": candidate.department,
                "bio": candidate.bio,
                "photo_url": candidate.photo_url,
                "position_id": candidate.position_id,
                "updated_at": bson_time(now),
            }
        };
        let result = self
            .coll::<Candidate>()
            .update_one(id.as_doc(), update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_candidate(&self, id: Id) -> Result<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        self.coll::<Vote>()
            .delete_many_with_session(doc! { "candidate_id": id }, None, &mut session)
            .await?;
        let result = self
            .coll::<Candidate>()
            .delete_one_with_session(id.as_doc(), None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(result.deleted_count == 1)
    }

    async fn votes(&self) -> Result<Vec<Vote>> {
        let cursor = self.coll::<Vote>().find(None, None).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn election_config(&self) -> Result<Option<ElectionConfig>> {
        let filter = doc! { "_id": ELECTION_CONFIG_ID };
        Ok(self.coll::<ElectionConfig>().find_one(filter, None).await?)
    }

    async fn save_election_config(&self, config: &ElectionConfig) -> Result<()> {
        let filter = doc! { "_id": ELECTION_CONFIG_ID };
        self.coll::<ElectionConfig>()
            .replace_one(filter, config, upsert())
            .await?;
        Ok(())
    }
}
