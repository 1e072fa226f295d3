use chrono::Utc;
use log::{info, warn};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Rejection, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, StudentLogin, AUTH_TOKEN_COOKIE},
            student::StudentProfile,
        },
        common::schedule::VotingStatus,
        db::Student,
        store::Db,
    },
};

pub fn routes() -> Vec<Route> {
    routes![authenticate_admin, login_student, force_login_student, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate_admin(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    db: Db,
    config: &State<Config>,
) -> Result<()> {
    let admin = db
        .admin_by_username(&credentials.username)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin, None);
    cookies.add(token.into_cookie(config)?);
    info!("Admin '{}' logged in", admin.username);

    Ok(())
}

#[post("/auth/student", data = "<login>", format = "json")]
pub async fn login_student(
    cookies: &CookieJar<'_>,
    login: Json<StudentLogin>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<StudentProfile>> {
    open_session(login.into_inner(), false, cookies, &db, config).await
}

/// Log in even if the student already has a session elsewhere, which is
/// then invalidated.
#[post("/auth/student/force", data = "<login>", format = "json")]
pub async fn force_login_student(
    cookies: &CookieJar<'_>,
    login: Json<StudentLogin>,
    db: Db,
    config: &State<Config>,
) -> Result<Json<StudentProfile>> {
    open_session(login.into_inner(), true, cookies, &db, config).await
}

fn refuse(student_id: &str, rejection: Rejection) -> Error {
    warn!("Refused login for {student_id}: {rejection}");
    Error::rejected(rejection)
}

async fn open_session(
    login: StudentLogin,
    force: bool,
    cookies: &CookieJar<'_>,
    db: &Db,
    config: &Config,
) -> Result<Json<StudentProfile>> {
    let student_id = login.student_id.trim();
    let student = db
        .student(student_id)
        .await?
        .ok_or_else(|| refuse(student_id, Rejection::NotFound))?;
    student
        .check_login(&login.password, force)
        .map_err(|rejection| refuse(student_id, rejection))?;

    // Without any device information the device lock cannot apply.
    let device_id = login.device_id();
    if let Some(ref device_id) = device_id {
        if db.device_used(device_id, student_id).await? {
            return Err(refuse(student_id, Rejection::DeviceAlreadyUsed));
        }
    }

    let now = Utc::now();
    if !db
        .claim_session(student_id, device_id.as_deref(), now, force)
        .await?
    {
        // Someone else got there between the check and the update.
        let rejection = match db.student(student_id).await? {
            Some(student) if student.has_voted => Rejection::AlreadyVoted,
            Some(_) => Rejection::AlreadyLoggedIn,
            None => Rejection::NotFound,
        };
        return Err(refuse(student_id, rejection));
    }

    let token = AuthToken::<Student>::new(&student, device_id.clone());
    cookies.add(token.into_cookie(config)?);
    if force && student.is_logged_in {
        info!("{student_id} force logged in, replacing their other session");
    } else {
        info!("{student_id} logged in");
    }

    let positions = db.positions().await?.len();
    let config = db.election_config().await?;
    let schedule = VotingStatus::evaluate(config.as_ref(), now);
    let mut student = student;
    student.is_logged_in = true;
    student.device_id = device_id;
    Ok(Json(StudentProfile::new(student, positions, schedule)))
}

/// Drop the session cookie, and for students close the session too.
#[delete("/auth")]
pub async fn logout(
    token: Option<AuthToken<Student>>,
    cookies: &CookieJar<'_>,
    db: Db,
) -> Result<Status> {
    if let Some(token) = token {
        db.release_session(&token.id, Utc::now()).await?;
        info!("{} logged out", token.id);
    }
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Ok(Status::Ok)
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::serde_json::json,
    };

    use crate::{
        error::ErrorBody,
        model::{
            common::device::DeviceFingerprint,
            db::{NewAdmin, Vote},
        },
    };

    use super::*;

    async fn post_login<'c>(client: &'c Client, login: &StudentLogin) -> LocalResponse<'c> {
        client
            .post(uri!(login_student))
            .header(ContentType::JSON)
            .body(json!(login).to_string())
            .dispatch()
            .await
    }

    async fn error_key(response: LocalResponse<'_>) -> String {
        response.into_json::<ErrorBody>().await.unwrap().error
    }

    #[backend_test]
    async fn admin_authenticate_valid(client: Client, db: Db) {
        // Ensure there is an admin to login as
        db.insert_admin(NewAdmin::example()).await.unwrap();

        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client, db: Db) {
        db.insert_admin(NewAdmin::example()).await.unwrap();

        // Use invalid username to attempt admin login
        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::empty()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Use invalid password to attempt admin login
        let response = client
            .post(uri!(authenticate_admin))
            .header(ContentType::JSON)
            .body(
                json! ({
                    "username": &NewAdmin::example().username,
                    "password": "",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn student_login_opens_session(client: Client, db: Db) {
        db.put_student(Student::example()).await.unwrap();

        let response = post_login(&client, &StudentLogin::example()).await;
        assert_eq!(Status::Ok, response.status());
        let profile = response.into_json::<StudentProfile>().await.unwrap();
        assert_eq!(profile.student_id, "S101");
        assert!(!profile.has_voted);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        let student = db.student("S101").await.unwrap().unwrap();
        assert!(student.session_matches(Some("test-device")));
        assert!(student.last_login_time.is_some());
    }

    #[backend_test]
    async fn fingerprint_identifies_device(client: Client, db: Db) {
        db.put_student(Student::example2()).await.unwrap();

        let response = post_login(&client, &StudentLogin::example2()).await;
        assert_eq!(Status::Ok, response.status());

        let student = db.student("S103").await.unwrap().unwrap();
        let expected = DeviceFingerprint::example().device_id();
        assert_eq!(student.device_id, Some(expected));
    }

    #[backend_test]
    async fn student_login_refusals(client: Client, db: Db) {
        db.put_student(Student::example()).await.unwrap();

        let mut login = StudentLogin::example();
        login.student_id = "S999".to_string();
        let response = post_login(&client, &login).await;
        assert_eq!(Status::NotFound, response.status());
        assert_eq!(error_key(response).await, "not-found");

        let mut login = StudentLogin::example();
        login.password = "wrong".to_string();
        let response = post_login(&client, &login).await;
        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(error_key(response).await, "invalid-credential");

        // Nothing was changed by the failed attempts.
        assert!(!db.student("S101").await.unwrap().unwrap().is_logged_in);
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn second_login_needs_force(client: Client, db: Db) {
        db.put_student(Student::example()).await.unwrap();
        assert_eq!(
            Status::Ok,
            post_login(&client, &StudentLogin::example()).await.status()
        );
        let first_cookie = client.cookies().get(AUTH_TOKEN_COOKIE).cloned().unwrap();

        let mut login = StudentLogin::example();
        login.device_id = Some("phone".to_string());
        let response = post_login(&client, &login).await;
        assert_eq!(Status::Conflict, response.status());
        assert_eq!(error_key(response).await, "already-logged-in");

        let response = client
            .post(uri!(force_login_student))
            .header(ContentType::JSON)
            .body(json!(login).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // The first session's token no longer matches the stored session.
        let config = client.rocket().state::<Config>().unwrap();
        let old = AuthToken::<Student>::from_cookie(&first_cookie, config).unwrap();
        let student = db.student("S101").await.unwrap().unwrap();
        assert!(!student.session_matches(old.device_id.as_deref()));
        assert!(student.session_matches(Some("phone")));
    }

    #[backend_test]
    async fn voted_students_cannot_log_in(client: Client, db: Db) {
        db.put_student(Student::example()).await.unwrap();
        db.claim_session("S101", Some("test-device"), Utc::now(), false)
            .await
            .unwrap();
        db.record_ballot("S101", Some("test-device"), Vec::<Vote>::new(), Utc::now())
            .await
            .unwrap();

        let response = post_login(&client, &StudentLogin::example()).await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(error_key(response).await, "already-voted");

        // Forcing does not get around it either.
        let response = client
            .post(uri!(force_login_student))
            .header(ContentType::JSON)
            .body(json!(StudentLogin::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn used_device_is_locked(client: Client, db: Db) {
        db.put_student(Student::example()).await.unwrap();
        db.claim_session("S101", Some("test-device"), Utc::now(), false)
            .await
            .unwrap();
        db.record_ballot("S101", Some("test-device"), Vec::<Vote>::new(), Utc::now())
            .await
            .unwrap();

        // Re-importing the student clears their flags but not the device record.
        db.put_student(Student::example()).await.unwrap();

        let response = post_login(&client, &StudentLogin::example()).await;
        assert_eq!(Status::Forbidden, response.status());
        assert_eq!(error_key(response).await, "device-already-used");

        let mut login = StudentLogin::example();
        login.device_id = Some("library-pc".to_string());
        assert_eq!(Status::Ok, post_login(&client, &login).await.status());
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(student)]
    async fn logout_student(client: Client, db: Db) {
        assert!(db.student("S101").await.unwrap().unwrap().is_logged_in);

        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
        let student = db.student("S101").await.unwrap().unwrap();
        assert!(!student.is_logged_in);
        assert_eq!(student.device_id, None);
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
