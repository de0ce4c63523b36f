#[macro_use]
extern crate rocket;

mod entrypoints;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use gitrats_server::{
    config::{Env, StorageBackend},
    db::{self, memory::MemoryStore},
    github_pull::GithubClient,
    sync::{self, EventSource, SyncContext},
};
use rocket::{fairing::AdHoc, http::Method, Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_prometheus::PrometheusMetrics;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[launch]
async fn rocket() -> _ {
    dotenv::dotenv().ok();

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let env = Env::from_env().expect("Failed to load environment variables");
    let github =
        GithubClient::new(env.github_token.clone()).expect("Failed to create Github client");
    if env.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN is not set, GitHub requests are rate limited per IP");
    }

    let storage = match env.storage {
        StorageBackend::Postgres => db::stage(),
        StorageBackend::Fixture => {
            tracing::warn!("Using in-memory fixture storage, nothing will be persisted");
            db::memory::stage(MemoryStore::with_fixture())
        }
    };

    let span = tracing::info_span!("Starting Rocket");
    let _enter = span.enter();

    build(&env, storage, Arc::new(github)).expect("Failed to build rocket")
}

fn cors(frontend_url: &str) -> anyhow::Result<rocket_cors::Cors> {
    Ok(CorsOptions {
        allowed_origins: AllowedOrigins::some_exact(&[frontend_url]),
        allowed_methods: [Method::Get, Method::Post, Method::Put, Method::Options]
            .into_iter()
            .map(From::from)
            .collect(),
        allow_credentials: true,
        ..Default::default()
    }
    .to_cors()?)
}

fn build(
    env: &Env,
    storage: AdHoc,
    source: Arc<dyn EventSource>,
) -> anyhow::Result<Rocket<Build>> {
    let atomic_bool = Arc::new(AtomicBool::new(true));
    let atomic_bool_clone = atomic_bool.clone();
    let prometheus = PrometheusMetrics::new();
    let context = SyncContext::new(source, env.events_page_size());

    Ok(rocket::build()
        .attach(storage)
        .attach(sync::stage(context, env.sync_interval(), atomic_bool))
        .attach(AdHoc::on_shutdown("Stop syncing users", |_| {
            Box::pin(async move {
                atomic_bool_clone.store(false, Ordering::Relaxed);
            })
        }))
        .attach(cors(env.frontend_url())?)
        .attach(prometheus.clone())
        .attach(entrypoints::stage())
        .mount("/metrics", prometheus)
        .mount(
            "/",
            SwaggerUi::new("/api/docs/<_..>")
                .url("/api/openapi.json", entrypoints::ApiDoc::openapi()),
        ))
}
