use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::db::NewAdmin;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw admin credentials, received from a user. These are never stored
/// directly; only the argon2 hash of the password is kept.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = ();

    /// Hash the password into a new admin record, refusing an empty username
    /// or a password under [`MIN_PASSWORD_LENGTH`].
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        if cred.username.trim().is_empty() || cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(());
        }

        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        // The default config is always valid, so this only fails on absurd input.
        let password_hash = argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default())
            .map_err(|_| ())?;
        Ok(Self {
            username: cred.username,
            password_hash,
        })
    }
}

/// Admin account as listed to other admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminDescription {
    pub username: String,
}
