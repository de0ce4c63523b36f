use std::time::Duration;

use serde::Deserialize;
use shared::EVENTS_PAGE_SIZE;

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
pub const DEFAULT_SYNC_INTERVAL_IN_MINUTES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    /// In-memory store seeded with a demo user. Nothing survives a restart.
    Fixture,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Env {
    pub github_token: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    pub sync_interval_in_minutes: Option<u32>,
    pub events_page_size: Option<u8>,
    pub frontend_url: Option<String>,
}

impl Env {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(envy::from_env::<Self>()?)
    }

    /// `None` disables the periodic sync.
    pub fn sync_interval(&self) -> Option<Duration> {
        match self
            .sync_interval_in_minutes
            .unwrap_or(DEFAULT_SYNC_INTERVAL_IN_MINUTES)
        {
            0 => None,
            minutes => Some(Duration::from_secs(minutes as u64 * 60)),
        }
    }

    pub fn events_page_size(&self) -> u8 {
        self.events_page_size
            .unwrap_or(EVENTS_PAGE_SIZE)
            .clamp(1, EVENTS_PAGE_SIZE)
    }

    pub fn frontend_url(&self) -> &str {
        self.frontend_url.as_deref().unwrap_or(DEFAULT_FRONTEND_URL)
    }
}
