use std::sync::Arc;

use gitrats_server::{
    db::Storage,
    sync::{SyncContext, SyncReport},
};
use rocket::{serde::json::Json, State};

/// Failures are logged and reported as an empty run.
#[utoipa::path(context_path = "/api/sync", responses(
    (status = 200, description = "Sync the user's recent GitHub activity now", body = SyncReport)
))]
#[post("/<username>")]
pub async fn sync_user(
    username: &str,
    storage: &State<Arc<dyn Storage>>,
    context: &State<SyncContext>,
) -> Json<SyncReport> {
    let syncer = context.syncer(storage.inner().clone());
    Json(syncer.sync_logged(username).await)
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing sync entrypoints", |rocket| async {
        rocket.mount("/api/sync", rocket::routes![sync_user])
    })
}
