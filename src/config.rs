use chrono::Duration;
use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    api::admin::AdminCredentials,
    db::admin::ensure_admin_exists,
    store::{Db, MongoStore},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

fn default_db_name() -> String {
    "council_vote".to_string()
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    admin_username: Option<String>,
    // secrets
    db_uri: Option<String>,
    admin_password: Option<String>,
}

impl StoreConfig {
    fn bootstrap_admin(&self) -> Option<AdminCredentials> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) => Some(AdminCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// A fairing that loads the store config, connects to MongoDB (or falls back
/// to an in-memory store), performs any setup necessary, and places a [`Db`]
/// into managed state.
/// A [`Db`] that is already managed is kept as it is.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let managed = rocket.state::<Db>().cloned();
        let db = if let Some(db) = managed {
            db
        } else {
            let db = match config.db_uri {
                Some(ref uri) => {
                    info!("Loaded store config, connecting to database {}...", config.db_name);
                    match MongoStore::connect(uri, &config.db_name).await {
                        Ok(store) => Db::new(store),
                        Err(e) => {
                            error!("Failed to connect to database: {e}");
                            return Err(rocket);
                        }
                    }
                }
                None => {
                    warn!("No `db_uri` configured, keeping everything in memory");
                    warn!("All election data will be lost when the server stops");
                    Db::in_memory()
                }
            };
            rocket = rocket.manage(db.clone());
            db
        };

        // Ensure there is at least one admin user.
        if let Some(credentials) = config.bootstrap_admin() {
            if let Err(e) = ensure_admin_exists(&db, credentials).await {
                error!("Failed to set up the bootstrap admin: {e}");
                return Err(rocket);
            }
        } else if matches!(db.count_admins().await, Ok(0)) {
            warn!("There are no admins and no `admin_username`/`admin_password` to create one");
        }
        info!("...store online!");

        Ok(rocket)
    }
}

/// A figment for tests: built-in defaults plus the secrets the server needs,
/// ignoring `Rocket.toml` and the environment.
#[cfg(test)]
pub fn test_figment() -> rocket::figment::Figment {
    rocket::figment::Figment::from(rocket::Config::debug_default())
        .merge(("auth_ttl", 3600))
        .merge(("jwt_secret", "test-jwt-secret"))
        .merge(("log_level", "off"))
}
