use chrono::Utc;
use log::info;
use rocket::{
    http::{Cookie, CookieJar},
    serde::json::Json,
    Route,
};

use crate::error::{Error, Rejection, Result};
use crate::model::{
    api::{
        auth::{StudentSession, AUTH_TOKEN_COOKIE},
        ballot::{BallotPaper, BallotPosition, BallotSpec, VoteReceipt},
        student::StudentProfile,
    },
    common::{
        ballot::validate_ballot,
        department::{visible_candidates, DepartmentNotice},
        schedule::VotingStatus,
    },
    db::Vote,
    store::Db,
};

pub fn routes() -> Vec<Route> {
    routes![profile, ballot_paper, cast_ballot]
}

#[get("/student")]
async fn profile(session: StudentSession, db: Db) -> Result<Json<StudentProfile>> {
    let positions = db.positions().await?.len();
    Ok(Json(StudentProfile::new(
        session.student,
        positions,
        session.schedule,
    )))
}

/// The positions and the candidates this student may choose between.
#[get("/student/ballot")]
async fn ballot_paper(session: StudentSession, db: Db) -> Result<Json<BallotPaper>> {
    if !session.schedule.is_active() {
        return Err(Error::Rejected(
            Rejection::VotingInactive,
            session.schedule.message,
        ));
    }

    let config = session.config.as_ref();
    let department = &session.student.department;
    let mut candidates = visible_candidates(config, department, db.candidates().await?);
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    let positions = db
        .positions()
        .await?
        .into_iter()
        .map(|position| {
            let standing = candidates
                .iter()
                .filter(|candidate| candidate.position_id == position.id)
                .cloned()
                .map(Into::into)
                .collect();
            BallotPosition {
                position: position.into(),
                candidates: standing,
            }
        })
        .collect();

    Ok(Json(BallotPaper {
        positions,
        department: DepartmentNotice::new(config, department),
    }))
}

/// Record the student's choices and end their session.
#[post("/student/ballot", data = "<ballot>", format = "json")]
async fn cast_ballot(
    session: StudentSession,
    ballot: Json<Vec<BallotSpec>>,
    cookies: &CookieJar<'_>,
    db: Db,
) -> Result<Json<VoteReceipt>> {
    // The window may have closed since the session was loaded.
    let now = Utc::now();
    let config = db.election_config().await?;
    let schedule = VotingStatus::evaluate(config.as_ref(), now);
    if !schedule.is_active() {
        return Err(Error::Rejected(Rejection::VotingInactive, schedule.message));
    }

    let student = session.student;
    let positions = db.positions().await?;
    let candidates = db.candidates().await?;
    validate_ballot(
        &ballot,
        &positions,
        &candidates,
        config.as_ref(),
        &student.department,
    )?;

    let votes: Vec<Vote> = ballot
        .iter()
        .map(|selection| {
            Vote::new(
                selection.position_id.into(),
                selection.candidate_id.into(),
                student.student_id.clone(),
                session.device_id.clone(),
                now,
            )
        })
        .collect();
    let votes_cast = votes.len();

    if !db
        .record_ballot(&student.student_id, session.device_id.as_deref(), votes, now)
        .await?
    {
        return Err(Error::rejected(Rejection::AlreadyVoted));
    }

    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    info!("{} cast a ballot for {votes_cast} positions", student.student_id);

    Ok(Json(VoteReceipt {
        student_id: student.student_id,
        votes_cast,
        timestamp: now,
    }))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::{
        error::ErrorBody,
        model::{
            api::auth::StudentLogin,
            db::{Candidate, ElectionConfig, NewCandidate, NewPosition, Position},
        },
    };

    use super::*;

    struct Slate {
        president: Position,
        secretary: Position,
        priya: Candidate,
        rahul: Candidate,
        meera: Candidate,
    }

    impl Slate {
        /// Two positions: Priya (BCA-1) and Rahul (BCA-2) for president,
        /// Meera (BCA-1) for secretary.
        async fn seed(db: &Db) -> Self {
            let now = Utc::now();
            let president = Position::new(NewPosition::example(), now);
            let secretary = Position::new(NewPosition::example2(), now);
            let priya = Candidate::new(NewCandidate::example(president.id), now);
            let rahul = Candidate::new(NewCandidate::example2(president.id), now);
            let mut meera = NewCandidate::example(secretary.id);
            meera.name = "Meera Iyer".to_string();
            let meera = Candidate::new(meera, now);

            for position in [&president, &secretary] {
                db.insert_position(position.clone()).await.unwrap();
            }
            for candidate in [&priya, &rahul, &meera] {
                db.insert_candidate(candidate.clone()).await.unwrap();
            }
            Self {
                president,
                secretary,
                priya,
                rahul,
                meera,
            }
        }

        fn full_ballot(&self) -> Vec<BallotSpec> {
            vec![
                pick(&self.president, &self.rahul),
                pick(&self.secretary, &self.meera),
            ]
        }
    }

    fn pick(position: &Position, candidate: &Candidate) -> BallotSpec {
        BallotSpec {
            position_id: position.id.into(),
            candidate_id: candidate.id.into(),
        }
    }

    async fn submit(client: &Client, ballot: &[BallotSpec]) -> (Status, String) {
        let response = client
            .post(uri!(cast_ballot))
            .header(ContentType::JSON)
            .body(json!(ballot).to_string())
            .dispatch()
            .await;
        let status = response.status();
        let key = match status {
            s if s == Status::Ok => String::new(),
            _ => response
                .into_json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_default(),
        };
        (status, key)
    }

    #[backend_test(student)]
    async fn profile_shows_credits(client: Client, db: Db) {
        Slate::seed(&db).await;

        let response = client.get(uri!(profile)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let profile = response.into_json::<StudentProfile>().await.unwrap();
        assert_eq!(profile.student_id, "S101");
        assert_eq!(profile.total_credits, 2);
        assert_eq!(profile.remaining_credits, 2);
        assert!(!profile.can_vote);
    }

    #[backend_test]
    async fn profile_needs_session(client: Client) {
        let response = client.get(uri!(profile)).dispatch().await;
        assert_eq!(Status::NotFound, response.status());
    }

    #[backend_test(student)]
    async fn closed_election_refuses_ballots(client: Client, db: Db) {
        let slate = Slate::seed(&db).await;
        db.save_election_config(&ElectionConfig::example_ended())
            .await
            .unwrap();

        let response = client.get(uri!(ballot_paper)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
        let body = response.into_json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "voting-inactive");
        assert!(body.message.starts_with("Voting ended at"));

        assert_eq!(
            submit(&client, &slate.full_ballot()).await,
            (Status::Forbidden, "voting-inactive".to_string())
        );
        assert!(!db.student("S101").await.unwrap().unwrap().has_voted);
        assert!(db.votes().await.unwrap().is_empty());
    }

    #[backend_test(student)]
    async fn ballot_paper_lists_candidates(client: Client, db: Db) {
        let slate = Slate::seed(&db).await;
        db.save_election_config(&ElectionConfig::example_active())
            .await
            .unwrap();

        let response = client.get(uri!(ballot_paper)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let paper = response.into_json::<BallotPaper>().await.unwrap();
        assert_eq!(paper.positions.len(), 2);
        assert_eq!(paper.department, None);
        let presidency = paper
            .positions
            .iter()
            .find(|p| p.position.name == slate.president.name)
            .unwrap();
        let names: Vec<_> = presidency.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Priya Sharma", "Rahul Verma"]);
    }

    #[backend_test(student)]
    async fn casting_a_ballot(client: Client, db: Db) {
        let slate = Slate::seed(&db).await;
        db.save_election_config(&ElectionConfig::example_active())
            .await
            .unwrap();

        let response = client
            .post(uri!(cast_ballot))
            .header(ContentType::JSON)
            .body(json!(slate.full_ballot()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipt = response.into_json::<VoteReceipt>().await.unwrap();
        assert_eq!(receipt.student_id, "S101");
        assert_eq!(receipt.votes_cast, 2);

        // The session is over.
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
        let student = db.student("S101").await.unwrap().unwrap();
        assert!(student.has_voted);
        assert!(!student.is_logged_in);
        assert!(student.vote_timestamp.is_some());

        let votes = db.votes().await.unwrap();
        assert_eq!(votes.len(), 2);
        assert!(votes
            .iter()
            .all(|vote| vote.device_id.as_deref() == Some("test-device")));
        assert!(db.device_used("test-device", "S101").await.unwrap());

        // No second go.
        let response = client
            .post(uri!(crate::api::auth::login_student))
            .header(ContentType::JSON)
            .body(json!(StudentLogin::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test(student)]
    async fn incomplete_ballot_changes_nothing(client: Client, db: Db) {
        let slate = Slate::seed(&db).await;
        db.save_election_config(&ElectionConfig::example_active())
            .await
            .unwrap();

        let ballot = [pick(&slate.president, &slate.priya)];
        assert_eq!(
            submit(&client, &ballot).await,
            (Status::UnprocessableEntity, "incomplete-ballot".to_string())
        );
        assert_eq!(
            submit(&client, &[]).await,
            (Status::UnprocessableEntity, "incomplete-ballot".to_string())
        );

        let student = db.student("S101").await.unwrap().unwrap();
        assert!(!student.has_voted);
        assert!(student.is_logged_in);
        assert!(db.votes().await.unwrap().is_empty());

        // The session survives, so the student can try again.
        assert_eq!(submit(&client, &slate.full_ballot()).await.0, Status::Ok);
    }

    #[backend_test(student)]
    async fn departmental_ballot(client: Client, db: Db) {
        let slate = Slate::seed(&db).await;
        let config = ElectionConfig {
            enable_departmental_voting: true,
            allow_cross_department_voting: false,
            ..ElectionConfig::example_active()
        };
        db.save_election_config(&config).await.unwrap();

        // S101 is in BCA-1, so Rahul (BCA-2) is hidden.
        let paper = client
            .get(uri!(ballot_paper))
            .dispatch()
            .await
            .into_json::<BallotPaper>()
            .await
            .unwrap();
        let notice = paper.department.unwrap();
        assert!(notice.restricted_mode);
        assert_eq!(notice.user_department, "BCA-1");
        let shown: Vec<_> = paper
            .positions
            .iter()
            .flat_map(|p| p.candidates.iter().map(|c| c.name.clone()))
            .collect();
        assert!(!shown.contains(&slate.rahul.name));

        assert_eq!(submit(&client, &slate.full_ballot()).await.0, Status::Forbidden);

        let ballot = [
            pick(&slate.president, &slate.priya),
            pick(&slate.secretary, &slate.meera),
        ];
        assert_eq!(submit(&client, &ballot).await.0, Status::Ok);
    }
}
