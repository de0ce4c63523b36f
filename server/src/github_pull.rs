use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Serialize;
use shared::{github::RawEvent, ActivityEvent, EVENTS_PAGE_SIZE};
use tracing::instrument;

use crate::sync::EventSource;

pub const MAX_LOGIN_LENGTH: usize = 39;

/// Alphanumerics plus `-` and `_`, no leading, trailing or doubled hyphens.
pub fn is_valid_login(login: &str) -> bool {
    !login.is_empty()
        && login.len() <= MAX_LOGIN_LENGTH
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !login.starts_with('-')
        && !login.ends_with('-')
        && !login.contains("--")
}

#[derive(Serialize)]
struct EventsQuery {
    per_page: u8,
}

pub struct GithubClient {
    pub octocrab: Octocrab,
}

impl GithubClient {
    /// Unauthenticated clients work too, at a much lower rate limit.
    pub fn new(github_token: Option<String>) -> anyhow::Result<Self> {
        let builder = octocrab::Octocrab::builder();
        let octocrab = match github_token {
            Some(token) => builder.personal_token(token).build()?,
            None => builder.build()?,
        };
        Ok(Self { octocrab })
    }
}

#[async_trait]
impl EventSource for GithubClient {
    #[instrument(skip(self))]
    async fn fetch_events(
        &self,
        login: &str,
        page_size: u8,
    ) -> anyhow::Result<Vec<ActivityEvent>> {
        anyhow::ensure!(is_valid_login(login), "invalid GitHub login: {login}");

        let query = EventsQuery {
            per_page: page_size.clamp(1, EVENTS_PAGE_SIZE),
        };
        let raw: Vec<RawEvent> = self
            .octocrab
            .get(format!("/users/{login}/events/public"), Some(&query))
            .await?;

        raw.into_iter()
            .map(|event| ActivityEvent::try_from(event).map_err(Into::into))
            .collect()
    }
}
