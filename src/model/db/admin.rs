use std::ops::{Deref, DerefMut};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::admin::AdminCredentials, mongodb::Id, store::Db};

/// Core admin user data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed hash can never match.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Create the bootstrap admin if there are no admins at all.
pub async fn ensure_admin_exists(db: &Db, credentials: AdminCredentials) -> Result<()> {
    if db.count_admins().await? > 0 {
        return Ok(());
    }

    let username = credentials.username.clone();
    let admin: NewAdmin = credentials.try_into().map_err(|_| {
        Error::Status(
            rocket::http::Status::InternalServerError,
            "Configured bootstrap admin credentials are not acceptable".to_string(),
        )
    })?;
    db.insert_admin(admin).await?;
    info!("Created bootstrap admin '{username}'");
    warn!("Change the bootstrap admin password before the election opens");
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCore {
        pub fn example() -> Self {
            AdminCredentials::example().try_into().unwrap()
        }

        pub fn example2() -> Self {
            AdminCredentials::example2().try_into().unwrap()
        }
    }
}
