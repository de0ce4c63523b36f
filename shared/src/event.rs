use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub type EventId = String;

/// Pull request and issue actions that carry XP.
pub const ACTION_OPENED: &str = "opened";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    Push { commits: u32 },
    PullRequest { action: String },
    Issue { action: String },
    Create,
    Other { name: String },
}

/// Flat tag of [`ActivityKind`], used where the payload is not needed
/// (activity log rows, statistics).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    Push,
    PullRequest,
    Issue,
    Create,
    Other,
}

impl ActivityKind {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            Self::Push { .. } => ActivityType::Push,
            Self::PullRequest { .. } => ActivityType::PullRequest,
            Self::Issue { .. } => ActivityType::Issue,
            Self::Create => ActivityType::Create,
            Self::Other { .. } => ActivityType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: EventId,
    pub kind: ActivityKind,
    pub repository: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(
        id: impl Into<EventId>,
        kind: ActivityKind,
        repository: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            repository: repository.into(),
            created_at,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}
