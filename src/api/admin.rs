use std::collections::HashSet;

use chrono::Utc;
use log::info;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::{AdminCredentials, AdminDescription},
            auth::AuthToken,
            candidate::{CandidateDescription, CandidateSpec},
            position::{PositionDescription, PositionSpec},
            results::{ElectionResults, ElectionStats},
            schedule::{AdminSchedule, ScheduleSpec},
            student::{
                free_student_id, generate_password, seed_students, BulkOutcome, ImportRow,
                ImportSummary, StudentCredentials, StudentDescription, StudentSpec,
                StudentUpdate,
            },
        },
        db::{
            sweeper::SessionSweeper, Admin, Candidate, ElectionConfig, NewAdmin, NewCandidate,
            NewPosition, Position, StudentChanges,
        },
        mongodb::Id,
        store::Db,
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_positions,
        create_position,
        modify_position,
        delete_position,
        get_candidates,
        create_candidate,
        modify_candidate,
        delete_candidate,
        get_students,
        create_student,
        modify_student,
        delete_student,
        delete_all_students,
        import_students,
        seed_test_students,
        reset_password,
        reset_all_passwords,
        export_credentials,
        get_schedule,
        save_schedule,
        start_voting,
        end_voting,
        get_results,
        get_stats,
        get_admins,
        create_admin,
        delete_admin,
    ]
}

// Positions.

#[get("/admin/positions")]
async fn get_positions(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<PositionDescription>>> {
    let positions = db.positions().await?;
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[post("/admin/positions", data = "<spec>", format = "json")]
async fn create_position(
    _token: AuthToken<Admin>,
    spec: Json<PositionSpec>,
    db: Db,
) -> Result<Json<PositionDescription>> {
    let position: NewPosition = spec.into_inner().try_into()?;
    let position = Position::new(position, Utc::now());
    db.insert_position(position.clone()).await?;
    info!("Created position '{}' ({})", position.name, position.id);
    Ok(Json(position.into()))
}

#[put("/admin/positions/<position_id>", data = "<spec>", format = "json")]
async fn modify_position(
    _token: AuthToken<Admin>,
    position_id: Id,
    spec: Json<PositionSpec>,
    db: Db,
) -> Result<Json<PositionDescription>> {
    let position: NewPosition = spec.into_inner().try_into()?;
    if !db.update_position(position_id, position, Utc::now()).await? {
        return Err(Error::not_found(format!("Position {position_id}")));
    }
    let position = db
        .position(position_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position {position_id}")))?;
    Ok(Json(position.into()))
}

/// Delete a position, and with it its candidates and their votes.
#[delete("/admin/positions/<position_id>")]
async fn delete_position(_token: AuthToken<Admin>, position_id: Id, db: Db) -> Result<()> {
    if !db.delete_position(position_id).await? {
        return Err(Error::not_found(format!("Position {position_id}")));
    }
    info!("Deleted position {position_id}");
    Ok(())
}

// Candidates.

#[get("/admin/candidates")]
async fn get_candidates(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<CandidateDescription>>> {
    let candidates = db.candidates().await?;
    Ok(Json(candidates.into_iter().map(Into::into).collect()))
}

/// Candidates can only stand for positions that exist.
async fn check_position_exists(db: &Db, position_id: Id) -> Result<()> {
    if db.position(position_id).await?.is_none() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Position {position_id} does not exist"),
        ));
    }
    Ok(())
}

#[post("/admin/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _token: AuthToken<Admin>,
    spec: Json<CandidateSpec>,
    db: Db,
) -> Result<Json<CandidateDescription>> {
    let candidate: NewCandidate = spec.into_inner().try_into()?;
    check_position_exists(&db, candidate.position_id).await?;

    let candidate = Candidate::new(candidate, Utc::now());
    db.insert_candidate(candidate.clone()).await?;
    info!("Created candidate '{}' ({})", candidate.name, candidate.id);
    Ok(Json(candidate.into()))
}

#[put("/admin/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn modify_candidate(
    _token: AuthToken<Admin>,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    db: Db,
) -> Result<Json<CandidateDescription>> {
    let candidate: NewCandidate = spec.into_inner().try_into()?;
    check_position_exists(&db, candidate.position_id).await?;

    if !db
        .update_candidate(candidate_id, candidate, Utc::now())
        .await?
    {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    let candidate = db
        .candidate(candidate_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
    Ok(Json(candidate.into()))
}

/// Delete a candidate and the votes cast for them.
#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(_token: AuthToken<Admin>, candidate_id: Id, db: Db) -> Result<()> {
    if !db.delete_candidate(candidate_id).await? {
        return Err(Error::not_found(format!("Candidate {candidate_id}")));
    }
    info!("Deleted candidate {candidate_id}");
    Ok(())
}

// Students.

#[get("/admin/students")]
async fn get_students(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<StudentDescription>>> {
    let students = db.students().await?;
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

#[post("/admin/students", data = "<spec>", format = "json")]
async fn create_student(
    _token: AuthToken<Admin>,
    spec: Json<StudentSpec>,
    db: Db,
) -> Result<Json<StudentCredentials>> {
    let student = spec.into_inner().into_student(Utc::now())?;
    if !db.insert_student(student.clone()).await? {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Student ID already in use: {}", student.student_id),
        ));
    }
    info!("Created student {}", student.student_id);
    Ok(Json(student.into()))
}

#[put("/admin/students/<student_id>", data = "<update>", format = "json")]
async fn modify_student(
    _token: AuthToken<Admin>,
    student_id: &str,
    update: Json<StudentUpdate>,
    db: Db,
) -> Result<Json<StudentDescription>> {
    let changes: StudentChanges = update.into_inner().try_into()?;
    if !db.update_student(student_id, changes, Utc::now()).await? {
        return Err(Error::not_found(format!("Student {student_id}")));
    }
    let student = db
        .student(student_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Student {student_id}")))?;
    Ok(Json(student.into()))
}

/// Delete a student along with any votes they cast.
#[delete("/admin/students/<student_id>")]
async fn delete_student(_token: AuthToken<Admin>, student_id: &str, db: Db) -> Result<()> {
    if !db.delete_student(student_id).await? {
        return Err(Error::not_found(format!("Student {student_id}")));
    }
    info!("Deleted student {student_id}");
    Ok(())
}

/// Delete every vote, then every student.
#[delete("/admin/students")]
async fn delete_all_students(_token: AuthToken<Admin>, db: Db) -> Result<Json<BulkOutcome>> {
    let affected = db.delete_all_students().await?;
    info!("Deleted all {affected} students and their votes");
    Ok(Json(BulkOutcome { affected }))
}

/// Write a batch of students, generating any missing IDs and passwords.
/// Rows naming an existing student overwrite them.
#[post("/admin/students/import", data = "<rows>", format = "json")]
async fn import_students(
    _token: AuthToken<Admin>,
    rows: Json<Vec<ImportRow>>,
    db: Db,
) -> Result<Json<ImportSummary>> {
    let now = Utc::now();
    let mut taken: HashSet<String> = db
        .students()
        .await?
        .into_iter()
        .map(|student| student.student_id)
        .collect();
    taken.extend(rows.iter().filter_map(ImportRow::given_id));

    let mut credentials = Vec::with_capacity(rows.len());
    for row in rows.into_inner() {
        if row.name.trim().is_empty() {
            continue;
        }
        let student_id = match row.given_id() {
            Some(id) => id,
            None => {
                let id = free_student_id(&taken)?;
                taken.insert(id.clone());
                id
            }
        };
        let student = row.into_student(student_id, now);
        db.put_student(student.clone()).await?;
        credentials.push(StudentCredentials::from(student));
    }

    info!("Imported {} students", credentials.len());
    Ok(Json(ImportSummary {
        imported: credentials.len(),
        credentials,
    }))
}

/// Add the five test students, S101 to S105.
#[post("/admin/students/seed")]
async fn seed_test_students(_token: AuthToken<Admin>, db: Db) -> Result<Json<BulkOutcome>> {
    let mut affected = 0;
    for student in seed_students(Utc::now()) {
        db.put_student(student).await?;
        affected += 1;
    }
    info!("Seeded {affected} test students");
    Ok(Json(BulkOutcome { affected }))
}

#[post("/admin/students/<student_id>/password")]
async fn reset_password(
    _token: AuthToken<Admin>,
    student_id: &str,
    db: Db,
) -> Result<Json<StudentCredentials>> {
    let password = generate_password();
    if !db.set_password(student_id, &password, Utc::now()).await? {
        return Err(Error::not_found(format!("Student {student_id}")));
    }
    let student = db
        .student(student_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Student {student_id}")))?;
    info!("Reset the password of {student_id}");
    Ok(Json(student.into()))
}

/// Give every student a new random password.
#[post("/admin/students/passwords")]
async fn reset_all_passwords(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<StudentCredentials>>> {
    let now = Utc::now();
    let mut credentials = Vec::new();
    for mut student in db.students().await? {
        student.password = generate_password();
        if db
            .set_password(&student.student_id, &student.password, now)
            .await?
        {
            credentials.push(StudentCredentials::from(student));
        }
    }
    info!("Reset the passwords of {} students", credentials.len());
    Ok(Json(credentials))
}

#[get("/admin/students/credentials")]
async fn export_credentials(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<StudentCredentials>>> {
    let students = db.students().await?;
    info!("Exported credentials for {} students", students.len());
    Ok(Json(students.into_iter().map(Into::into).collect()))
}

// Schedule.

#[get("/admin/schedule")]
async fn get_schedule(_token: AuthToken<Admin>, db: Db) -> Result<Json<AdminSchedule>> {
    let config = db.election_config().await?;
    Ok(Json(AdminSchedule::new(config, Utc::now())))
}

#[put("/admin/schedule", data = "<spec>", format = "json")]
async fn save_schedule(
    _token: AuthToken<Admin>,
    spec: Json<ScheduleSpec>,
    db: Db,
    sweeper: &State<SessionSweeper>,
) -> Result<Json<AdminSchedule>> {
    let now = Utc::now();
    let config = spec.into_inner().into_config(now)?;
    db.save_election_config(&config).await?;
    sweeper.schedule(&db, &config).await;
    info!(
        "Election scheduled from {:?} to {:?}, active: {}",
        config.voting_start, config.voting_end, config.is_active
    );
    Ok(Json(AdminSchedule::new(Some(config), now)))
}

/// Open voting right away.
#[post("/admin/schedule/start")]
async fn start_voting(
    _token: AuthToken<Admin>,
    db: Db,
    sweeper: &State<SessionSweeper>,
) -> Result<Json<AdminSchedule>> {
    let now = Utc::now();
    let previous = db.election_config().await?;
    let config = ElectionConfig::started_now(previous.as_ref(), now);
    db.save_election_config(&config).await?;
    sweeper.schedule(&db, &config).await;
    info!("Voting started, closing at {:?}", config.voting_end);
    Ok(Json(AdminSchedule::new(Some(config), now)))
}

/// Close voting right away and log every student out.
#[post("/admin/schedule/end")]
async fn end_voting(
    _token: AuthToken<Admin>,
    db: Db,
    sweeper: &State<SessionSweeper>,
) -> Result<Json<AdminSchedule>> {
    let now = Utc::now();
    let previous = db.election_config().await?;
    let config = ElectionConfig::ended_now(previous.as_ref(), now);
    db.save_election_config(&config).await?;
    sweeper.sweep_now(&db).await?;
    info!("Voting ended");
    Ok(Json(AdminSchedule::new(Some(config), now)))
}

// Results.

#[get("/admin/results")]
async fn get_results(_token: AuthToken<Admin>, db: Db) -> Result<Json<ElectionResults>> {
    let positions = db.positions().await?;
    let candidates = db.candidates().await?;
    let votes = db.votes().await?;
    Ok(Json(ElectionResults::tally(positions, candidates, &votes)))
}

#[get("/admin/stats")]
async fn get_stats(_token: AuthToken<Admin>, db: Db) -> Result<Json<ElectionStats>> {
    let students = db.students().await?;
    let voted = students.iter().filter(|student| student.has_voted).count();
    let votes = db.votes().await?.len();
    Ok(Json(ElectionStats::new(
        students.len() as u64,
        voted as u64,
        votes as u64,
    )))
}

// Admin accounts.

#[get("/admins")]
async fn get_admins(
    _token: AuthToken<Admin>,
    db: Db,
) -> Result<Json<Vec<AdminDescription>>> {
    let admins = db.admins().await?;
    let admin_names = admins
        .into_iter()
        .map(|admin| AdminDescription {
            username: admin.admin.username,
        })
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    db: Db,
) -> Result<()> {
    let username = new_admin.username.clone();
    let admin: NewAdmin = new_admin
        .into_inner()
        .try_into()
        .map_err(|_| Error::Status(Status::BadRequest, "Illegal admin credentials".to_string()))?;

    // Usernames are unique.
    if db.insert_admin(admin).await?.is_none() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Admin username already in use: {username}"),
        ));
    }
    info!("Created admin '{username}'");
    Ok(())
}

#[delete("/admins", data = "<admin>", format = "json")]
async fn delete_admin(
    _token: AuthToken<Admin>,
    admin: Json<AdminDescription>,
    db: Db,
) -> Result<()> {
    // Prevent deleting the last admin.
    if db.count_admins().await? <= 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    if !db.delete_admin(&admin.username).await? {
        return Err(Error::not_found(format!("Admin {}", admin.username)));
    }
    info!("Deleted admin '{}'", admin.username);
    Ok(())
}
