use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::Responder,
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{1}")]
    Status(Status, String),
    #[error("{1}")]
    Rejected(Rejection, String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
}

impl Error {
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    /// Reject the request with the default message for `rejection`.
    pub fn rejected(rejection: Rejection) -> Self {
        Self::Rejected(rejection, rejection.to_string())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Status(status, _) => *status,
            Self::Rejected(rejection, _) => rejection.status(),
            Self::Db(_) | Self::Argon2(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
        }
    }

    /// Short machine-readable key for the error.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Rejected(rejection, _) => rejection.key(),
            Self::Db(_) => "storage-failure",
            _ => match self.status().class() {
                StatusClass::ServerError => "internal",
                _ => "bad-request",
            },
        }
    }
}

/// The ways a login or vote can be refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    #[error("Student ID not found")]
    NotFound,
    #[error("Invalid password")]
    InvalidCredential,
    #[error("You have already voted and cannot login again")]
    AlreadyVoted,
    #[error("Account is already logged in on another device")]
    AlreadyLoggedIn,
    #[error("You have already used this device for voting")]
    DeviceAlreadyUsed,
    #[error("Voting is not currently active")]
    VotingInactive,
    #[error("Please select a candidate for all positions before submitting")]
    IncompleteBallot,
}

impl Rejection {
    pub fn key(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::InvalidCredential => "invalid-credential",
            Self::AlreadyVoted => "already-voted",
            Self::AlreadyLoggedIn => "already-logged-in",
            Self::DeviceAlreadyUsed => "device-already-used",
            Self::VotingInactive => "voting-inactive",
            Self::IncompleteBallot => "incomplete-ballot",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotFound => Status::NotFound,
            Self::InvalidCredential => Status::Unauthorized,
            Self::AlreadyVoted | Self::DeviceAlreadyUsed | Self::VotingInactive => {
                Status::Forbidden
            }
            Self::AlreadyLoggedIn => Status::Conflict,
            Self::IncompleteBallot => Status::UnprocessableEntity,
        }
    }
}

/// JSON body sent alongside every error status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let id = req.local_cache(RequestId::next);
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("  req{id} failed: {self}");
        } else {
            warn!("  req{id} refused: {self}");
        }

        // Don't leak storage internals to the client.
        let message = match self {
            Self::Db(_) | Self::Argon2(_) => "Internal error, please try again".to_string(),
            _ => self.to_string(),
        };
        let body = ErrorBody {
            error: self.key().to_string(),
            message,
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_statuses() {
        assert_eq!(Rejection::NotFound.status(), Status::NotFound);
        assert_eq!(Rejection::InvalidCredential.status(), Status::Unauthorized);
        assert_eq!(Rejection::AlreadyVoted.status(), Status::Forbidden);
        assert_eq!(Rejection::AlreadyLoggedIn.status(), Status::Conflict);
        assert_eq!(
            Rejection::IncompleteBallot.status(),
            Status::UnprocessableEntity
        );
    }

    #[test]
    fn keys_match_serialised_names() {
        for rejection in [
            Rejection::NotFound,
            Rejection::InvalidCredential,
            Rejection::AlreadyVoted,
            Rejection::AlreadyLoggedIn,
            Rejection::DeviceAlreadyUsed,
            Rejection::VotingInactive,
            Rejection::IncompleteBallot,
        ] {
            let serialised = rocket::serde::json::serde_json::to_value(rejection).unwrap();
            assert_eq!(serialised.as_str(), Some(rejection.key()));
            assert_eq!(Error::rejected(rejection).key(), rejection.key());
        }
    }

    #[test]
    fn generic_keys() {
        let err = Error::not_found("Position 1".to_string());
        assert_eq!(err.status(), Status::NotFound);
        assert_eq!(err.key(), "bad-request");
        assert_eq!(err.to_string(), "Position 1 not found");

        let err = Error::Status(Status::InternalServerError, "boom".to_string());
        assert_eq!(err.key(), "internal");
    }
}
