use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::{
    api::position::PositionDescription, common::schedule::VotingStatus, store::Db,
};

pub fn routes() -> Vec<Route> {
    routes![schedule, positions]
}

/// Where the election stands right now, for the login page countdown.
#[get("/schedule")]
async fn schedule(db: Db) -> Result<Json<VotingStatus>> {
    let config = db.election_config().await?;
    Ok(Json(VotingStatus::evaluate(config.as_ref(), Utc::now())))
}

#[get("/positions")]
async fn positions(db: Db) -> Result<Json<Vec<PositionDescription>>> {
    let positions = db.positions().await?;
    Ok(Json(positions.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::{
        common::schedule::ScheduleState,
        db::{ElectionConfig, NewPosition, Position},
    };

    use super::*;

    #[backend_test]
    async fn unscheduled_election(client: Client) {
        let response = client.get(uri!(schedule)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let status = response.into_json::<VotingStatus>().await.unwrap();
        assert_eq!(status.status, ScheduleState::NotScheduled);
        assert_eq!(status.countdown, None);
    }

    #[backend_test]
    async fn active_election(client: Client, db: Db) {
        db.save_election_config(&ElectionConfig::example_active())
            .await
            .unwrap();

        let status = client
            .get(uri!(schedule))
            .dispatch()
            .await
            .into_json::<VotingStatus>()
            .await
            .unwrap();
        assert_eq!(status.status, ScheduleState::Active);
        assert!(status.time_remaining.unwrap() > 0);
        assert!(status.countdown.is_some());
    }

    #[backend_test]
    async fn positions_are_listed_by_name(client: Client, db: Db) {
        let now = Utc::now();
        let secretary = Position::new(NewPosition::example2(), now);
        let president = Position::new(NewPosition::example(), now);
        db.insert_position(secretary.clone()).await.unwrap();
        db.insert_position(president.clone()).await.unwrap();

        let response = client.get(uri!(positions)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let listed = response
            .into_json::<Vec<PositionDescription>>()
            .await
            .unwrap();
        let mut expected = vec![
            PositionDescription::from(president),
            PositionDescription::from(secretary),
        ];
        expected.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(listed, expected);
    }
}
