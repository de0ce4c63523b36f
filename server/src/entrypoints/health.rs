use std::{sync::Arc, time::Instant};

use chrono::Utc;
use gitrats_server::{
    db::Storage,
    types::{HealthResponse, HealthStats},
};
use rocket::{serde::json::Json, State};

pub struct StartedAt(pub Instant);

#[utoipa::path(context_path = "/api", responses(
    (status = 200, description = "Get service status and totals", body = HealthResponse)
))]
#[get("/health")]
pub async fn get_health(
    storage: &State<Arc<dyn Storage>>,
    started_at: &State<StartedAt>,
) -> Json<HealthResponse> {
    let (status, stats) = match storage.statistics().await {
        Ok(statistics) => ("ok", statistics.into()),
        Err(e) => {
            rocket::error!("Failed to fetch statistics: {e}");
            ("degraded", HealthStats::default())
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        uptime_seconds: started_at.0.elapsed().as_secs(),
        stats,
    })
}

pub fn stage() -> rocket::fairing::AdHoc {
    rocket::fairing::AdHoc::on_ignite("Installing health entrypoints", |rocket| async {
        rocket
            .manage(StartedAt(Instant::now()))
            .mount("/api", rocket::routes![get_health])
    })
}
