use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{mongodb::Id, store::Db};

use super::user::{Rights, User};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific user with specific rights.
///
/// Student tokens also carry the device the session was opened from, so a
/// force login elsewhere invalidates them.
#[derive(Serialize, Deserialize)]
pub struct AuthToken<U> {
    pub id: String,
    #[serde(rename = "rgt")]
    pub rights: Rights,
    #[serde(rename = "dev", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip)]
    phantom: PhantomData<U>,
}

impl<U> AuthToken<U> {
    /// Does this token permit the given rights?
    pub fn permits(&self, target: Rights) -> bool {
        self.rights == target
    }
}

impl<U> AuthToken<U>
where
    U: User,
{
    /// Create a new [`AuthToken`] for the given user, with the correct rights for that user type.
    pub fn new(user: &U, device_id: Option<String>) -> Self {
        Self {
            id: user.id(),
            rights: U::RIGHTS,
            device_id,
            phantom: PhantomData,
        }
    }

    /// Sign this token into a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        Ok(Cookie::build(AUTH_TOKEN_COOKIE, token)
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .finish())
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims<U>>| claims.claims.token)?;
        Ok(token)
    }

    /// Read and verify the token in the request's cookie, without checking
    /// that the user still exists.
    ///
    /// Requests without a valid token for this user type are forwarded.
    pub(crate) fn from_cookie_jar(req: &Request<'_>) -> Outcome<Self, Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                let error = Error::Status(
                    Status::InternalServerError,
                    "Application config is not loaded".to_string(),
                );
                return Outcome::Failure((Status::InternalServerError, error));
            }
        };

        // Forward to any routes that do not require an authentication token.
        let cookie = try_outcome!(req.cookies().get(AUTH_TOKEN_COOKIE).or_forward(()));
        let token: Self = try_outcome!(Self::from_cookie(cookie, config).or_forward(()));

        if !token.permits(U::RIGHTS) {
            return Outcome::Forward(());
        }
        Outcome::Success(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<U> {
    #[serde(flatten, bound = "")]
    token: AuthToken<U>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r, U> FromRequest<'r> for AuthToken<U>
where
    U: User + Send,
{
    type Error = Error;

    /// Get an [`AuthToken`] from the cookie and check it still refers to a
    /// live user: an existing admin, or a student whose session is still
    /// open on the token's device.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token: Self = try_outcome!(Self::from_cookie_jar(req));
        let db = try_outcome!(req.guard::<Db>().await.map_failure(|(status, ())| {
            (status, Error::Status(status, "Store is not available".to_string()))
        }));

        let live = match token.rights {
            Rights::Student => db.student(&token.id).await.map(|student| {
                student.map_or(false, |s| s.session_matches(token.device_id.as_deref()))
            }),
            Rights::Admin => match token.id.parse::<Id>() {
                Ok(id) => db.admin_by_id(id).await.map(|admin| admin.is_some()),
                Err(_) => Ok(false),
            },
        };

        match live {
            Ok(true) => Outcome::Success(token),
            Ok(false) => Outcome::Forward(()),
            Err(e) => Outcome::Failure((Status::InternalServerError, e)),
        }
    }
}
