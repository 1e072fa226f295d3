#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::model::db::sweeper::SweeperFairing;
#[cfg(test)]
use crate::model::store::Db;
#[cfg(test)]
use rocket::figment::Figment;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
mod scheduled_task;

/// The server, configured from `Rocket.toml` and `ROCKET_*` variables.
pub fn build() -> Rocket<Build> {
    assemble(rocket::build())
}

/// A server over the given store, for tests.
#[cfg(test)]
pub(crate) fn rocket_for_db(db: Db, figment: Figment) -> Rocket<Build> {
    assemble(rocket::custom(figment).manage(db))
}

/// Mount the routes and attach the fairings.
/// The store must be in place before the sweeper looks at the schedule, so
/// the order of the fairings matters.
fn assemble(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(SweeperFairing)
}
