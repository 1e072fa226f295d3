use chrono::Utc;
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Error;
use crate::model::{
    common::schedule::VotingStatus,
    db::{ElectionConfig, Student},
    store::Db,
};

use super::AuthToken;

/// Everything a student route needs to know about the caller, loaded fresh
/// for every request.
pub struct StudentSession {
    pub student: Student,
    /// The device the session was opened from.
    pub device_id: Option<String>,
    pub config: Option<ElectionConfig>,
    /// The schedule as of the start of this request.
    pub schedule: VotingStatus,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StudentSession {
    type Error = Error;

    /// Forwards unless the cookie belongs to a student who is still logged
    /// in on the same device and has not voted.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(AuthToken::<Student>::from_cookie_jar(req));
        let db = try_outcome!(req.guard::<Db>().await.map_failure(|(status, ())| {
            (status, Error::Status(status, "Store is not available".to_string()))
        }));

        let loaded = async {
            let student = db.student(&token.id).await?;
            let config = db.election_config().await?;
            Ok::<_, Error>((student, config))
        };
        let (student, config) = match loaded.await {
            Ok(loaded) => loaded,
            Err(e) => return Outcome::Failure((Status::InternalServerError, e)),
        };

        match student {
            Some(student) if student.session_matches(token.device_id.as_deref()) => {
                let schedule = VotingStatus::evaluate(config.as_ref(), Utc::now());
                Outcome::Success(Self {
                    student,
                    device_id: token.device_id,
                    config,
                    schedule,
                })
            }
            _ => Outcome::Forward(()),
        }
    }
}
