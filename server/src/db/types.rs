use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::ActivityType;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SquadRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i32,
    pub login: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub xp: i64,
    pub streak: i32,
    pub best_streak: i32,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The part of a user the sync run reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserProgress {
    pub login: String,
    pub xp: i64,
    pub streak: i32,
    pub best_streak: i32,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for UserProgress {
    fn from(user: &UserRecord) -> Self {
        Self {
            login: user.login.clone(),
            xp: user.xp,
            streak: user.streak,
            best_streak: user.best_streak,
            last_event_at: user.last_event_at,
            last_event_id: user.last_event_id.clone(),
            updated_at: user.updated_at,
        }
    }
}

/// Absolute values written back by a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressPatch {
    pub xp: i64,
    pub streak: i32,
    pub best_streak: i32,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_event_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub login: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub login: String,
    pub activity_type: ActivityType,
    pub repository: String,
    pub date: DateTime<Utc>,
    pub xp_earned: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: String,
    pub repository: String,
    pub date: DateTime<Utc>,
    pub xp_earned: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ActivityTypeCount {
    pub activity_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub login: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub xp: i64,
    pub streak: i32,
    pub place: i64,
}

#[derive(Debug, Clone, Default, sqlx::FromRow, Serialize, Deserialize)]
pub struct Statistics {
    pub users: i64,
    pub total_xp: i64,
    pub activities: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSquad {
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SquadRecord {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub invite_code: String,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    pub member_count: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct MySquadRecord {
    #[sqlx(flatten)]
    pub squad: SquadRecord,
    pub role: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct SquadMemberRecord {
    pub login: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub xp: i64,
    pub streak: i32,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquadDetailsRecord {
    pub squad: SquadRecord,
    pub members: Vec<SquadMemberRecord>,
}

#[derive(Debug, Clone)]
pub enum JoinResult {
    Joined { squad_id: i32, role: SquadRole },
    InvalidCode,
    AlreadyMember,
    UnknownUser,
}
