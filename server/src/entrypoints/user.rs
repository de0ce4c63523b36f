use std::sync::Arc;

use gitrats_server::{
    db::{types::NewUser, Storage},
    sync::SyncContext,
    types::{
        LeaderboardResponse, PaginatedResponse, RegisterUserRequest, UserProfile, UserStats,
    },
};
use rocket::{http::Status, serde::json::Json, State};

use super::auth::AuthenticatedUser;

const DEFAULT_PAGE_LIMIT: u64 = 50;
const MAX_PAGE_LIMIT: u64 = 100;
/// Keeps `page * limit` within the storage offset type.
const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PAGE_LIMIT;

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get user leaderboard", body = PaginatedLeaderboardResponse)
))]
#[get("/leaderboard?<page>&<limit>&<search>")]
pub async fn get_leaderboard(
    storage: &State<Arc<dyn Storage>>,
    page: Option<u64>,
    limit: Option<u64>,
    search: Option<&str>,
) -> Option<Json<PaginatedResponse<LeaderboardResponse>>> {
    let page = page.unwrap_or(0).min(MAX_PAGE);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let (records, total) = match storage
        .get_leaderboard(search, page as i64, limit as i64)
        .await
    {
        Err(e) => {
            rocket::error!("Failed to get leaderboard: {e}");
            return None;
        }
        Ok(value) => value,
    };
    Some(Json(PaginatedResponse::new(
        records.into_iter().map(Into::into).collect(),
        page + 1,
        limit,
        total,
    )))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get user profile and refresh it in the background", body = UserProfile),
    (status = 404, description = "User is not registered")
))]
#[get("/<username>", rank = 2)]
pub async fn get_user(
    username: &str,
    storage: &State<Arc<dyn Storage>>,
    context: &State<SyncContext>,
) -> Option<Json<UserProfile>> {
    let user = match storage.get_user(username).await {
        Err(e) => {
            rocket::error!("Failed to get user: {username}: {e}");
            return None;
        }
        Ok(value) => value?,
    };
    let place = match storage.get_leaderboard_place(&user.login).await {
        Err(e) => {
            rocket::error!("Failed to get leaderboard place: {username}: {e}");
            None
        }
        Ok(value) => value,
    };

    context
        .syncer(storage.inner().clone())
        .sync_in_background(user.login.clone());

    Some(Json(UserProfile::new(user, place)))
}

#[utoipa::path(context_path = "/api/users", responses(
    (status = 200, description = "Get user progress and activity totals", body = UserStats),
    (status = 404, description = "User is not registered")
))]
#[get("/<username>/stats")]
pub async fn get_user_stats(
    username: &str,
    storage: &State<Arc<dyn Storage>>,
) -> Option<Json<UserStats>> {
    let user = match storage.get_user(username).await {
        Err(e) => {
            rocket::error!("Failed to get user: {username}: {e}");
            return None;
        }
        Ok(value) => value?,
    };
    let totals = match storage.get_activity_totals(&user.login).await {
        Err(e) => {
            rocket::error!("Failed to get activity totals: {username}: {e}");
            return None;
        }
        Ok(value) => value,
    };
    Some(Json(UserStats::new(&user, totals)))
}

#[utoipa::path(context_path = "/api/users", request_body = RegisterUserRequest, responses(
    (status = 200, description = "Register or refresh the caller's profile", body = UserProfile),
    (status = 401, description = "Missing login header"),
    (status = 403, description = "Caller is not this user")
))]
#[put("/<username>", data = "<profile>")]
pub async fn register_user(
    username: &str,
    caller: AuthenticatedUser,
    profile: Json<RegisterUserRequest>,
    storage: &State<Arc<dyn Storage>>,
) -> Result<Json<UserProfile>, Status> {
    if !caller.is(username) {
        return Err(Status::Forbidden);
    }
    let profile = profile.into_inner();
    let user = NewUser {
        login: caller.login,
        name: profile.name,
        avatar: profile.avatar,
        bio: profile.bio,
    };
    if let Err(e) = storage.upsert_user(&user).await {
        rocket::error!("Failed to register user: {username}: {e}");
        return Err(Status::InternalServerError);
    }

    let record = match storage.get_user(&user.login).await {
        Ok(Some(record)) => record,
        Ok(None) => return Err(Status::InternalServerError),
        Err(e) => {
            rocket::error!("Failed to get user: {username}: {e}");
            return Err(Status::InternalServerError);
        }
    };
    let place = storage
        .get_leaderboard_place(&record.login)
        .await
        .unwrap_or_default();
    rocket::info!("Registered user {}", record.login);
    Ok(Json(UserProfile::new(record, place)))
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing user entrypoints", |rocket| async {
        rocket.mount(
            "/api/users",
            rocket::routes![get_leaderboard, get_user, get_user_stats, register_user],
        )
    })
}
