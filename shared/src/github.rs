//! Wire format of the GitHub public events API.
//!
//! Payloads are validated here, at the boundary, and turned into the typed
//! [`ActivityKind`] union. Anything the XP table doesn't care about is kept as
//! [`ActivityKind::Other`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{ActivityEvent, ActivityKind};

pub const PUSH_EVENT: &str = "PushEvent";
pub const PULL_REQUEST_EVENT: &str = "PullRequestEvent";
pub const ISSUES_EVENT: &str = "IssuesEvent";
pub const CREATE_EVENT: &str = "CreateEvent";

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("event {id} of type {event_type} has a malformed payload: {source}")]
    Malformed {
        id: String,
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub repo: RawRepo,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepo {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    size: Option<u32>,
    #[serde(default)]
    commits: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ActionPayload {
    action: String,
}

impl RawEvent {
    fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, PayloadError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| PayloadError::Malformed {
            id: self.id.clone(),
            event_type: self.event_type.clone(),
            source,
        })
    }

    fn kind(&self) -> Result<ActivityKind, PayloadError> {
        Ok(match self.event_type.as_str() {
            PUSH_EVENT => {
                let payload: PushPayload = self.payload()?;
                let commits = payload
                    .size
                    .unwrap_or_else(|| payload.commits.len() as u32);
                ActivityKind::Push { commits }
            }
            PULL_REQUEST_EVENT => ActivityKind::PullRequest {
                action: self.payload::<ActionPayload>()?.action,
            },
            ISSUES_EVENT => ActivityKind::Issue {
                action: self.payload::<ActionPayload>()?.action,
            },
            CREATE_EVENT => ActivityKind::Create,
            other => ActivityKind::Other {
                name: other.to_string(),
            },
        })
    }
}

impl TryFrom<RawEvent> for ActivityEvent {
    type Error = PayloadError;

    fn try_from(event: RawEvent) -> Result<Self, Self::Error> {
        let kind = event.kind()?;
        Ok(Self {
            id: event.id,
            kind,
            repository: event.repo.name,
            created_at: event.created_at,
        })
    }
}
