use gitrats_server::{sync::SyncReport, types::*};
use rocket::fairing::AdHoc;
use utoipa::OpenApi;

pub mod auth;
pub mod github;
pub mod health;
pub mod squads;
pub mod sync;
pub mod user;

#[derive(OpenApi)]
#[openapi(
    paths(
        user::get_leaderboard,
        user::get_user,
        user::get_user_stats,
        user::register_user,
        github::get_activity,
        github::get_contributions,
        squads::create_squad,
        squads::get_public_squads,
        squads::get_my_squads,
        squads::join_squad,
        squads::get_squad,
        sync::sync_user,
        health::get_health,
    ),
    components(schemas(
        GithubMeta,
        PaginatedLeaderboardResponse,
        LeaderboardResponse,
        UserProfile,
        UserStats,
        RegisterUserRequest,
        ActivityResponse,
        ContributionsResponse,
        ContributionDayResponse,
        SquadResponse,
        MySquadResponse,
        SquadMemberResponse,
        SquadDetailsResponse,
        CreateSquadRequest,
        JoinSquadRequest,
        JoinSquadResponse,
        SyncReport,
        HealthResponse,
        HealthStats,
    ))
)]
pub struct ApiDoc;

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("Installing entrypoints", |rocket| async {
        rocket
            .attach(user::stage())
            .attach(github::stage())
            .attach(squads::stage())
            .attach(sync::stage())
            .attach(health::stage())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use gitrats_server::{
        config::{Env, StorageBackend},
        db::memory::{self, MemoryStore, FIXTURE_LOGIN},
        sync::EventSource,
    };
    use rocket::{
        http::{Header, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
    };
    use shared::{ActivityEvent, ActivityKind};

    use super::auth::LOGIN_HEADER;

    /// Two fresh events for anyone: a two-commit push and a branch creation.
    struct StubSource;

    #[async_trait]
    impl EventSource for StubSource {
        async fn fetch_events(
            &self,
            _login: &str,
            _page_size: u8,
        ) -> anyhow::Result<Vec<ActivityEvent>> {
            let now = Utc::now();
            Ok(vec![
                ActivityEvent::new(
                    "2",
                    ActivityKind::Push { commits: 2 },
                    "gitrats/gitrats",
                    now - Duration::minutes(1),
                ),
                ActivityEvent::new(
                    "1",
                    ActivityKind::Create,
                    "gitrats/gitrats",
                    now - Duration::minutes(2),
                ),
            ])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl EventSource for FailingSource {
        async fn fetch_events(
            &self,
            _login: &str,
            _page_size: u8,
        ) -> anyhow::Result<Vec<ActivityEvent>> {
            anyhow::bail!("GitHub returned 503")
        }
    }

    async fn client() -> Client {
        client_with(Arc::new(StubSource)).await
    }

    async fn client_with(source: Arc<dyn EventSource>) -> Client {
        let env = Env {
            github_token: None,
            storage: StorageBackend::Fixture,
            sync_interval_in_minutes: Some(0),
            events_page_size: None,
            frontend_url: None,
        };
        let rocket = crate::build(
            &env,
            memory::stage(MemoryStore::with_fixture()),
            source,
        )
        .unwrap();
        Client::tracked(rocket).await.unwrap()
    }

    async fn json(response: LocalResponse<'_>) -> Value {
        response.into_json::<Value>().await.unwrap()
    }

    async fn register(client: &Client, login: &str) {
        let response = client
            .put(format!("/api/users/{login}"))
            .header(Header::new(LOGIN_HEADER, login.to_string()))
            .json(&json!({ "name": login }))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn leaderboard_lists_fixture_user() {
        let client = client().await;
        let response = client.get("/api/users/leaderboard").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let body = json(response).await;
        assert_eq!(body["page"], 1);
        assert_eq!(body["total_records"], 1);
        assert_eq!(body["records"][0]["user"]["login"], FIXTURE_LOGIN);
        assert_eq!(body["records"][0]["place"], 1);
    }

    #[rocket::async_test]
    async fn leaderboard_survives_huge_page() {
        let client = client().await;
        let response = client
            .get(format!("/api/users/leaderboard?page={}", u64::MAX))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json(response).await;
        assert_eq!(body["total_records"], 1);
        assert_eq!(body["records"].as_array().map(Vec::len), Some(0));
    }

    async fn stats_xp(client: &Client) -> Value {
        json(
            client
                .get(format!("/api/users/{FIXTURE_LOGIN}/stats"))
                .dispatch()
                .await,
        )
        .await["xp"]
            .clone()
    }

    #[rocket::async_test]
    async fn profile_view_syncs_in_background() {
        let client = client().await;
        let response = client
            .get(format!("/api/users/{FIXTURE_LOGIN}"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json(response).await["user"]["login"], FIXTURE_LOGIN);

        let mut xp = stats_xp(&client).await;
        for _ in 0..100 {
            if xp == 15 {
                break;
            }
            rocket::tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            xp = stats_xp(&client).await;
        }
        assert_eq!(xp, 15);
    }

    #[rocket::async_test]
    async fn profile_view_survives_source_failure() {
        let client = client_with(Arc::new(FailingSource)).await;
        let response = client
            .get(format!("/api/users/{FIXTURE_LOGIN}"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json(response).await;
        assert_eq!(body["xp"], 0);
        assert_eq!(body["streak"], 0);

        rocket::tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats_xp(&client).await, 0);
        let body = json(
            client
                .get(format!("/api/users/{FIXTURE_LOGIN}"))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(body["xp"], 0);
        assert_eq!(body["level"], 1);
    }

    #[rocket::async_test]
    async fn registration_requires_matching_login() {
        let client = client().await;

        let response = client
            .put("/api/users/rat")
            .json(&json!({}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let response = client
            .put("/api/users/rat")
            .header(Header::new(LOGIN_HEADER, "mouse"))
            .json(&json!({}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .put("/api/users/rat")
            .header(Header::new(LOGIN_HEADER, "rat"))
            .json(&json!({ "name": "Rat", "bio": "squeak" }))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body = json(response).await;
        assert_eq!(body["user"]["login"], "rat");
        assert_eq!(body["xp"], 0);
        assert_eq!(body["level"], 1);
        assert_eq!(body["place"], 1);
    }

    #[rocket::async_test]
    async fn sync_scores_events_once() {
        let client = client().await;
        let uri = format!("/api/sync/{FIXTURE_LOGIN}");

        let body = json(client.post(uri.as_str()).dispatch().await).await;
        assert_eq!(body["events_count"], 2);
        assert_eq!(body["xp_delta"], 15);
        assert_eq!(body["streak"], 1);

        let body = json(client.post(uri.as_str()).dispatch().await).await;
        assert_eq!(body["new_events"], 0);
        assert_eq!(body["xp_delta"], 0);

        let stats = json(
            client
                .get(format!("/api/users/{FIXTURE_LOGIN}/stats"))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(stats["xp"], 15);
        assert_eq!(stats["best_streak"], 1);
        assert_eq!(stats["activities"]["push"], 1);

        let activity = json(
            client
                .get(format!("/api/github/activity?username={FIXTURE_LOGIN}"))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(activity.as_array().map(Vec::len), Some(1));
        assert_eq!(activity[0]["xp_earned"], 15);

        let calendar = json(
            client
                .get(format!("/api/github/contributions?username={FIXTURE_LOGIN}"))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(calendar["total_contributions"], 1);
    }

    #[rocket::async_test]
    async fn unknown_users_are_not_found() {
        let client = client().await;

        let response = client.get("/api/users/ghost").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get("/api/github/contributions?username=ghost")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let body = json(client.post("/api/sync/ghost").dispatch().await).await;
        assert_eq!(body["events_count"], 0);
        assert_eq!(body["xp_delta"], 0);
    }

    #[rocket::async_test]
    async fn squad_membership_flow() {
        let client = client().await;
        register(&client, "rat").await;

        let response = client
            .post("/api/squads")
            .header(Header::new(LOGIN_HEADER, FIXTURE_LOGIN))
            .json(&json!({ "name": "Sewer Crew", "description": "we ship" }))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let created = json(response).await;
        assert_eq!(created["role"], "ADMIN");
        let code = created["invite_code"].as_str().unwrap().to_string();
        let id = created["squad"]["id"].as_u64().unwrap();

        let public = json(client.get("/api/squads/public").dispatch().await).await;
        assert_eq!(public[0]["name"], "Sewer Crew");

        let join = |code: String| {
            client
                .post("/api/squads/join")
                .header(Header::new(LOGIN_HEADER, "rat"))
                .json(&json!({ "code": code }))
        };
        let response = join(code.to_lowercase()).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json(response).await["role"], "MEMBER");
        assert_eq!(join(code).dispatch().await.status(), Status::BadRequest);
        assert_eq!(
            join("NOPE0000".to_string()).dispatch().await.status(),
            Status::NotFound
        );

        let mine = json(
            client
                .get("/api/squads/my")
                .header(Header::new(LOGIN_HEADER, "rat"))
                .dispatch()
                .await,
        )
        .await;
        assert_eq!(mine[0]["role"], "MEMBER");

        let details = json(client.get(format!("/api/squads/{id}")).dispatch().await).await;
        assert_eq!(details["squad"]["member_count"], 2);
        assert_eq!(details["members"].as_array().map(Vec::len), Some(2));

        let response = client.get("/api/squads/my").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn private_squads_are_hidden_from_outsiders() {
        let client = client().await;
        register(&client, "rat").await;

        let created = json(
            client
                .post("/api/squads")
                .header(Header::new(LOGIN_HEADER, FIXTURE_LOGIN))
                .json(&json!({ "name": "Burrow", "is_private": true }))
                .dispatch()
                .await,
        )
        .await;
        let uri = format!("/api/squads/{}", created["squad"]["id"]);

        let response = client.get(uri.as_str()).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(uri.as_str())
            .header(Header::new(LOGIN_HEADER, "rat"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let response = client
            .get(uri.as_str())
            .header(Header::new(LOGIN_HEADER, FIXTURE_LOGIN))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(json(response).await["members"][0]["role"], "ADMIN");

        let public = json(client.get("/api/squads/public").dispatch().await).await;
        assert_eq!(public.as_array().map(Vec::len), Some(0));
    }

    #[rocket::async_test]
    async fn health_reports_totals() {
        let client = client().await;
        let body = json(client.get("/api/health").dispatch().await).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stats"]["users"], 1);
        assert_eq!(body["stats"]["activities"], 0);
    }

    #[rocket::async_test]
    async fn serves_openapi_document() {
        let client = client().await;
        let response = client.get("/api/openapi.json").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body = json(response).await;
        assert!(body["paths"]["/api/users/leaderboard"].is_object());
    }
}
