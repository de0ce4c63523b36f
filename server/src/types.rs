use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{level, ContributionCalendar, ContributionDay};
use utoipa::ToSchema;

use crate::db::types::{
    ActivityRecord, ActivityTypeCount, LeaderboardRecord, MySquadRecord, SquadDetailsRecord,
    SquadMemberRecord, SquadRecord, Statistics, UserRecord,
};

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
#[aliases(PaginatedLeaderboardResponse = PaginatedResponse<LeaderboardResponse>)]
pub struct PaginatedResponse<T: Serialize> {
    pub records: Vec<T>,
    pub page: u64,
    pub total_pages: u64,
    pub limit: u64,
    pub total_records: u64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(records: Vec<T>, page: u64, limit: u64, total_records: u64) -> Self {
        let limit = limit.max(1);
        let extra_page = if total_records % limit == 0 { 0 } else { 1 };
        let total_pages = (total_records / limit) + extra_page;
        Self {
            records,
            page,
            total_pages,
            limit,
            total_records,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GithubMeta {
    pub login: String,
    pub name: Option<String>,
    pub image: String,
}

impl GithubMeta {
    pub fn new(login: String, name: Option<String>, avatar: Option<String>) -> Self {
        let image = avatar.unwrap_or_else(|| format!("https://github.com/{}.png", login));
        Self { login, name, image }
    }
}

fn user_level(xp: i64) -> u32 {
    level(xp.max(0) as u64)
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub user: GithubMeta,
    pub bio: Option<String>,
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub place: Option<u32>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(record: UserRecord, place: Option<i64>) -> Self {
        Self {
            xp: record.xp.max(0) as u64,
            level: user_level(record.xp),
            streak: record.streak.max(0) as u32,
            best_streak: record.best_streak.max(0) as u32,
            place: place.map(|place| place as u32),
            last_event_at: record.last_event_at,
            joined_at: record.created_at,
            bio: record.bio,
            user: GithubMeta::new(record.login, record.name, record.avatar),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UserStats {
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub best_streak: u32,
    /// Logged activity entries per activity type.
    pub activities: BTreeMap<String, u32>,
}

impl UserStats {
    pub fn new(record: &UserRecord, totals: Vec<ActivityTypeCount>) -> Self {
        Self {
            xp: record.xp.max(0) as u64,
            level: user_level(record.xp),
            streak: record.streak.max(0) as u32,
            best_streak: record.best_streak.max(0) as u32,
            activities: totals
                .into_iter()
                .map(|total| (total.activity_type, total.count as u32))
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    pub user: GithubMeta,
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub place: u32,
}

impl From<LeaderboardRecord> for LeaderboardResponse {
    fn from(record: LeaderboardRecord) -> Self {
        Self {
            xp: record.xp.max(0) as u64,
            level: user_level(record.xp),
            streak: record.streak.max(0) as u32,
            place: record.place as u32,
            user: GithubMeta::new(record.login, record.name, record.avatar),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    pub activity_type: String,
    pub repository: String,
    pub repository_link: String,
    pub date: DateTime<Utc>,
    pub xp_earned: u64,
}

impl From<ActivityRecord> for ActivityResponse {
    fn from(record: ActivityRecord) -> Self {
        Self {
            repository_link: format!("https://github.com/{}", record.repository),
            activity_type: record.activity_type,
            repository: record.repository,
            date: record.date,
            xp_earned: record.xp_earned.max(0) as u64,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContributionDayResponse {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

impl From<ContributionDay> for ContributionDayResponse {
    fn from(day: ContributionDay) -> Self {
        Self {
            date: day.date,
            count: day.count,
            level: day.level,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ContributionsResponse {
    pub year: i32,
    pub total_contributions: u32,
    pub weeks: Vec<Vec<ContributionDayResponse>>,
}

impl From<ContributionCalendar> for ContributionsResponse {
    fn from(calendar: ContributionCalendar) -> Self {
        Self {
            year: calendar.year,
            total_contributions: calendar.total_contributions,
            weeks: calendar
                .weeks
                .into_iter()
                .map(|week| week.into_iter().map(Into::into).collect())
                .collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SquadResponse {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
}

impl From<SquadRecord> for SquadResponse {
    fn from(record: SquadRecord) -> Self {
        Self {
            id: record.id as u32,
            name: record.name,
            description: record.description,
            is_private: record.is_private,
            member_count: record.member_count as u32,
            created_at: record.created_at,
        }
    }
}

/// A squad as seen by one of its members. Only members get the invite code.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct MySquadResponse {
    pub squad: SquadResponse,
    pub invite_code: String,
    pub role: String,
}

impl From<MySquadRecord> for MySquadResponse {
    fn from(record: MySquadRecord) -> Self {
        Self {
            invite_code: record.squad.invite_code.clone(),
            squad: record.squad.into(),
            role: record.role,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SquadMemberResponse {
    pub user: GithubMeta,
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl From<SquadMemberRecord> for SquadMemberResponse {
    fn from(record: SquadMemberRecord) -> Self {
        Self {
            xp: record.xp.max(0) as u64,
            level: user_level(record.xp),
            streak: record.streak.max(0) as u32,
            role: record.role,
            joined_at: record.joined_at,
            user: GithubMeta::new(record.login, record.name, record.avatar),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SquadDetailsResponse {
    pub squad: SquadResponse,
    pub total_xp: u64,
    pub members: Vec<SquadMemberResponse>,
}

impl From<SquadDetailsRecord> for SquadDetailsResponse {
    fn from(record: SquadDetailsRecord) -> Self {
        let members: Vec<SquadMemberResponse> =
            record.members.into_iter().map(Into::into).collect();
        Self {
            squad: record.squad.into(),
            total_xp: members.iter().map(|member| member.xp).sum(),
            members,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinSquadResponse {
    pub squad_id: u32,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct HealthStats {
    pub users: u64,
    pub xp: u64,
    pub activities: u64,
}

impl From<Statistics> for HealthStats {
    fn from(value: Statistics) -> Self {
        Self {
            users: value.users.max(0) as u64,
            xp: value.total_xp.max(0) as u64,
            activities: value.activities.max(0) as u64,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub stats: HealthStats,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
pub struct RegisterUserRequest {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSquadRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct JoinSquadRequest {
    pub code: String,
}
