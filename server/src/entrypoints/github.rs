use std::{collections::BTreeMap, sync::Arc};

use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use gitrats_server::{
    db::Storage,
    types::{ActivityResponse, ContributionsResponse},
};
use rocket::{serde::json::Json, State};
use shared::ContributionCalendar;

const DEFAULT_ACTIVITY_LIMIT: u64 = 10;
const MAX_ACTIVITY_LIMIT: u64 = 100;

#[utoipa::path(context_path = "/api/github", responses(
    (status = 200, description = "Get the user's latest logged activity", body = [ActivityResponse]),
    (status = 404, description = "User is not registered")
))]
#[get("/activity?<username>&<limit>")]
pub async fn get_activity(
    username: &str,
    limit: Option<u64>,
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<Vec<ActivityResponse>>> {
    let limit = limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let user = match storage.find_user(username).await {
        Err(e) => {
            rocket::error!("Failed to get user: {username}: {e}");
            return None;
        }
        Ok(value) => value?,
    };
    let records = match storage.get_recent_activity(&user.login, limit as i64).await {
        Err(e) => {
            rocket::error!("Failed to get activity: {username}: {e}");
            return None;
        }
        Ok(value) => value,
    };
    Some(Json(records.into_iter().map(Into::into).collect()))
}

#[utoipa::path(context_path = "/api/github", responses(
    (status = 200, description = "Get the user's contribution calendar for a year", body = ContributionsResponse),
    (status = 404, description = "User is not registered or the year is out of range")
))]
#[get("/contributions?<username>&<year>")]
pub async fn get_contributions(
    username: &str,
    year: Option<i32>,
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<ContributionsResponse>> {
    let year = year.unwrap_or_else(|| Utc::now().year());
    let from = Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?);
    let to = Utc.from_utc_datetime(&NaiveDate::from_ymd_opt(year + 1, 1, 1)?.and_hms_opt(0, 0, 0)?);

    let user = match storage.find_user(username).await {
        Err(e) => {
            rocket::error!("Failed to get user: {username}: {e}");
            return None;
        }
        Ok(value) => value?,
    };
    let days = match storage.get_activity_days(&user.login, from, to).await {
        Err(e) => {
            rocket::error!("Failed to get contributions: {username}: {e}");
            return None;
        }
        Ok(value) => value,
    };

    let counts: BTreeMap<NaiveDate, u32> = days
        .into_iter()
        .map(|(day, count)| (day, count.max(0) as u32))
        .collect();
    let calendar = ContributionCalendar::for_year(year, &counts)?;
    Some(Json(calendar.into()))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing github entrypoints", |rocket| async {
        rocket.mount(
            "/api/github",
            rocket::routes![get_activity, get_contributions],
        )
    })
}
