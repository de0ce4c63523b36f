//! In-memory storage for local development and tests.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use rocket::{fairing::AdHoc, tokio::sync::RwLock};

use super::{
    generate_invite_code,
    types::{
        ActivityRecord, ActivityTypeCount, JoinResult, LeaderboardRecord, MySquadRecord,
        NewActivity, NewSquad, NewUser, ProgressPatch, SquadDetailsRecord, SquadMemberRecord,
        SquadRecord, SquadRole, Statistics, UserProgress, UserRecord,
    },
    ProgressStore, Storage,
};

pub const FIXTURE_LOGIN: &str = "GitRat_Tester";

#[derive(Debug, Clone)]
struct ActivityRow {
    user_id: i32,
    record: ActivityRecord,
}

#[derive(Debug, Clone)]
struct SquadRow {
    id: i32,
    name: String,
    description: Option<String>,
    invite_code: String,
    is_private: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MemberRow {
    squad_id: i32,
    user_id: i32,
    role: SquadRole,
    joined_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRecord>,
    activities: Vec<ActivityRow>,
    squads: Vec<SquadRow>,
    members: Vec<MemberRow>,
}

impl Tables {
    fn user(&self, login: &str) -> Option<&UserRecord> {
        self.users
            .iter()
            .find(|u| u.login.eq_ignore_ascii_case(login))
    }

    fn user_mut(&mut self, login: &str) -> Option<&mut UserRecord> {
        self.users
            .iter_mut()
            .find(|u| u.login.eq_ignore_ascii_case(login))
    }

    fn place(&self, xp: i64) -> i64 {
        1 + self.users.iter().filter(|u| u.xp > xp).count() as i64
    }

    fn activities_of(&self, login: &str) -> Vec<&ActivityRecord> {
        let Some(user_id) = self.user(login).map(|u| u.id) else {
            return vec![];
        };
        self.activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .map(|a| &a.record)
            .collect()
    }

    fn squad_record(&self, squad: &SquadRow) -> SquadRecord {
        SquadRecord {
            id: squad.id,
            name: squad.name.clone(),
            description: squad.description.clone(),
            invite_code: squad.invite_code.clone(),
            is_private: squad.is_private,
            created_at: squad.created_at,
            member_count: self
                .members
                .iter()
                .filter(|m| m.squad_id == squad.id)
                .count() as i64,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with a single demo user.
    pub fn with_fixture() -> Self {
        let mut tables = Tables::default();
        tables.users.push(UserRecord {
            id: 1,
            login: FIXTURE_LOGIN.to_string(),
            name: Some("Test User".to_string()),
            avatar: Some("https://api.dicebear.com/7.x/avataaars/svg?seed=GitRat".to_string()),
            bio: Some("Just a mock user for testing".to_string()),
            xp: 0,
            streak: 0,
            best_streak: 0,
            last_event_at: None,
            last_event_id: None,
            created_at: Utc::now(),
            updated_at: None,
        });
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_user(&self, login: &str) -> anyhow::Result<Option<UserProgress>> {
        Ok(self.tables.read().await.user(login).map(Into::into))
    }

    async fn update_progress(&self, login: &str, patch: ProgressPatch) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.user_mut(login) {
            user.xp = patch.xp;
            user.streak = patch.streak;
            user.best_streak = patch.best_streak;
            user.last_event_at = patch.last_event_at;
            user.last_event_id = patch.last_event_id;
            user.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn append_activity(&self, entry: NewActivity) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let Some(user_id) = tables.user(&entry.login).map(|u| u.id) else {
            return Ok(());
        };
        tables.activities.push(ActivityRow {
            user_id,
            record: ActivityRecord {
                activity_type: entry.activity_type.to_string(),
                repository: entry.repository,
                date: entry.date,
                xp_earned: entry.xp_earned,
            },
        });
        Ok(())
    }

    async fn logins(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .map(|u| u.login.clone())
            .collect())
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn upsert_user(&self, user: &NewUser) -> anyhow::Result<i32> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.user_mut(&user.login) {
            existing.name.clone_from(&user.name);
            existing.avatar.clone_from(&user.avatar);
            existing.bio.clone_from(&user.bio);
            return Ok(existing.id);
        }

        let id = tables.users.iter().map(|u| u.id).max().unwrap_or_default() + 1;
        tables.users.push(UserRecord {
            id,
            login: user.login.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            bio: user.bio.clone(),
            xp: 0,
            streak: 0,
            best_streak: 0,
            last_event_at: None,
            last_event_id: None,
            created_at: Utc::now(),
            updated_at: None,
        });
        Ok(id)
    }

    async fn get_user(&self, login: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.tables.read().await.user(login).cloned())
    }

    async fn get_leaderboard_place(&self, login: &str) -> anyhow::Result<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables.user(login).map(|u| tables.place(u.xp)))
    }

    async fn get_leaderboard(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> anyhow::Result<(Vec<LeaderboardRecord>, u64)> {
        let tables = self.tables.read().await;
        let search = search.map(str::to_lowercase);
        let matching: Vec<LeaderboardRecord> = tables
            .users
            .iter()
            .filter(|u| {
                search
                    .as_ref()
                    .map_or(true, |s| u.login.to_lowercase().contains(s.as_str()))
            })
            .map(|u| LeaderboardRecord {
                login: u.login.clone(),
                name: u.name.clone(),
                avatar: u.avatar.clone(),
                xp: u.xp,
                streak: u.streak,
                place: tables.place(u.xp),
            })
            .sorted_by(|a, b| a.place.cmp(&b.place).then_with(|| a.login.cmp(&b.login)))
            .collect();

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(page.saturating_mul(limit).max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((records, total))
    }

    async fn get_recent_activity(
        &self,
        login: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ActivityRecord>> {
        let tables = self.tables.read().await;
        // Insertion order breaks ties on equal dates, newest first.
        Ok(tables
            .activities_of(login)
            .into_iter()
            .rev()
            .sorted_by(|a, b| b.date.cmp(&a.date))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn get_activity_days(
        &self,
        login: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
        let tables = self.tables.read().await;
        let days: BTreeMap<NaiveDate, i64> = tables
            .activities_of(login)
            .into_iter()
            .filter(|a| a.date >= from && a.date < to)
            .map(|a| a.date.date_naive())
            .counts()
            .into_iter()
            .map(|(day, count)| (day, count as i64))
            .collect();
        Ok(days.into_iter().collect())
    }

    async fn get_activity_totals(&self, login: &str) -> anyhow::Result<Vec<ActivityTypeCount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .activities_of(login)
            .into_iter()
            .map(|a| a.activity_type.clone())
            .counts()
            .into_iter()
            .sorted()
            .map(|(activity_type, count)| ActivityTypeCount {
                activity_type,
                count: count as i64,
            })
            .collect())
    }

    async fn create_squad(
        &self,
        owner: &str,
        squad: &NewSquad,
    ) -> anyhow::Result<Option<SquadRecord>> {
        let mut tables = self.tables.write().await;
        let Some(owner_id) = tables.user(owner).map(|u| u.id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let row = SquadRow {
            id: tables.squads.iter().map(|s| s.id).max().unwrap_or_default() + 1,
            name: squad.name.clone(),
            description: squad.description.clone(),
            invite_code: generate_invite_code(),
            is_private: squad.is_private,
            created_at: now,
        };
        tables.members.push(MemberRow {
            squad_id: row.id,
            user_id: owner_id,
            role: SquadRole::Admin,
            joined_at: now,
        });
        let record = tables.squad_record(&row);
        tables.squads.push(row);
        Ok(Some(record))
    }

    async fn get_public_squads(&self) -> anyhow::Result<Vec<SquadRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .squads
            .iter()
            .filter(|s| !s.is_private)
            .rev()
            .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
            .map(|s| tables.squad_record(s))
            .collect())
    }

    async fn get_user_squads(&self, login: &str) -> anyhow::Result<Vec<MySquadRecord>> {
        let tables = self.tables.read().await;
        let Some(user_id) = tables.user(login).map(|u| u.id) else {
            return Ok(vec![]);
        };
        Ok(tables
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                let squad = tables.squads.iter().find(|s| s.id == m.squad_id)?;
                Some(MySquadRecord {
                    squad: tables.squad_record(squad),
                    role: m.role.to_string(),
                })
            })
            .sorted_by(|a, b| b.squad.created_at.cmp(&a.squad.created_at))
            .collect())
    }

    async fn join_squad(&self, login: &str, invite_code: &str) -> anyhow::Result<JoinResult> {
        let mut tables = self.tables.write().await;
        let Some(squad_id) = tables
            .squads
            .iter()
            .find(|s| s.invite_code == invite_code)
            .map(|s| s.id)
        else {
            return Ok(JoinResult::InvalidCode);
        };
        let Some(user_id) = tables.user(login).map(|u| u.id) else {
            return Ok(JoinResult::UnknownUser);
        };
        if tables
            .members
            .iter()
            .any(|m| m.squad_id == squad_id && m.user_id == user_id)
        {
            return Ok(JoinResult::AlreadyMember);
        }

        tables.members.push(MemberRow {
            squad_id,
            user_id,
            role: SquadRole::Member,
            joined_at: Utc::now(),
        });
        Ok(JoinResult::Joined {
            squad_id,
            role: SquadRole::Member,
        })
    }

    async fn get_squad(&self, squad_id: i32) -> anyhow::Result<Option<SquadDetailsRecord>> {
        let tables = self.tables.read().await;
        let Some(squad) = tables.squads.iter().find(|s| s.id == squad_id) else {
            return Ok(None);
        };

        let members = tables
            .members
            .iter()
            .filter(|m| m.squad_id == squad_id)
            .filter_map(|m| {
                let user = tables.users.iter().find(|u| u.id == m.user_id)?;
                Some(SquadMemberRecord {
                    login: user.login.clone(),
                    name: user.name.clone(),
                    avatar: user.avatar.clone(),
                    xp: user.xp,
                    streak: user.streak,
                    role: m.role.to_string(),
                    joined_at: m.joined_at,
                })
            })
            .sorted_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.login.cmp(&b.login)))
            .collect();

        Ok(Some(SquadDetailsRecord {
            squad: tables.squad_record(squad),
            members,
        }))
    }

    async fn statistics(&self) -> anyhow::Result<Statistics> {
        let tables = self.tables.read().await;
        Ok(Statistics {
            users: tables.users.len() as i64,
            total_xp: tables.users.iter().map(|u| u.xp).sum(),
            activities: tables.activities.len() as i64,
        })
    }
}

pub fn stage(store: MemoryStore) -> AdHoc {
    AdHoc::on_ignite("In-memory storage", |rocket| async move {
        let storage: Arc<dyn Storage> = Arc::new(store);
        rocket.manage(storage)
    })
}
