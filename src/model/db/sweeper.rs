use chrono::Utc;
use log::{debug, error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::Mutex,
    Build, Rocket,
};

use crate::{
    error::Result,
    model::{db::ElectionConfig, store::Db},
    scheduled_task::ScheduledTask,
};

/// Logs every student out when the voting window closes, so that nobody is
/// left holding a session they can no longer use.
pub struct SessionSweeper {
    task: Mutex<Option<ScheduledTask<Result<u64>>>>,
}

impl SessionSweeper {
    pub fn new() -> Self {
        Self {
            task: Mutex::new(None),
        }
    }

    /// Is a sweep currently pending?
    pub async fn is_scheduled(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Replace any pending sweep with one for the given configuration.
    ///
    /// Only an active window that has yet to close gets a sweep.
    pub async fn schedule(&self, db: &Db, config: &ElectionConfig) {
        let mut task = self.task.lock().await;
        if let Some(previous) = task.take() {
            if previous.cancel().await {
                debug!("Previous session sweep had already run");
            }
        }

        let end = match config.voting_end {
            Some(end) if config.is_active && end > Utc::now() => end,
            _ => return,
        };
        *task = Some(ScheduledTask::new(Self::sweep(db.clone()), end));
        debug!("Session sweep scheduled for {end}");
    }

    /// Cancel any pending sweep and release all sessions right away.
    pub async fn sweep_now(&self, db: &Db) -> Result<u64> {
        if let Some(previous) = self.task.lock().await.take() {
            previous.cancel().await;
        }
        Self::sweep(db.clone()).await
    }

    async fn sweep(db: Db) -> Result<u64> {
        let released = db.release_all_sessions(Utc::now()).await;
        match released {
            Ok(0) => debug!("Session sweep had nothing to do"),
            Ok(count) => info!("Voting closed, released {count} open sessions"),
            Err(ref e) => error!("Session sweep failed, students may stay logged in: {e}"),
        }
        released
    }
}

impl Default for SessionSweeper {
    fn default() -> Self {
        Self::new()
    }
}

/// A fairing that schedules the session sweep for the stored election
/// configuration during Rocket ignition, and places a [`SessionSweeper`]
/// into managed state.
/// This fairing depends on the [`Db`] being in managed state, and so must be
/// attached after the fairing responsible for that.
pub struct SweeperFairing;

#[rocket::async_trait]
impl Fairing for SweeperFairing {
    fn info(&self) -> Info {
        Info {
            name: "Session Sweeper",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let sweeper = SessionSweeper::new();
        let db = match rocket.state::<Db>() {
            Some(db) => db.clone(),
            None => {
                error!("Store was not available when scheduling the session sweep");
                return Err(rocket);
            }
        };
        match db.election_config().await {
            Ok(Some(config)) => sweeper.schedule(&db, &config).await,
            Ok(None) => debug!("No election configured, nothing to sweep"),
            Err(e) => {
                warn!("Could not read the election configuration: {e}");
                return Err(rocket);
            }
        }
        Ok(rocket.manage(sweeper))
    }
}
