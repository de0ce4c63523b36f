use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rocket::{
    fairing::{self, AdHoc},
    Build, Rocket,
};
use rocket_db_pools::Database;
use sqlx::PgPool;

#[derive(Database, Clone, Debug)]
#[database("gitrats")]
pub struct DB(PgPool);

pub mod memory;
pub mod types;

use self::types::{
    ActivityRecord, ActivityTypeCount, JoinResult, LeaderboardRecord, MySquadRecord, NewActivity,
    NewSquad, NewUser, ProgressPatch, SquadDetailsRecord, SquadMemberRecord, SquadRecord,
    SquadRole, Statistics, UserProgress, UserRecord,
};

pub const INVITE_CODE_LENGTH: usize = 8;

/// Storage operations used by the sync run.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_user(&self, login: &str) -> anyhow::Result<Option<UserProgress>>;

    async fn update_progress(&self, login: &str, patch: ProgressPatch) -> anyhow::Result<()>;

    async fn append_activity(&self, entry: NewActivity) -> anyhow::Result<()>;

    /// Logins of every registered user, oldest first.
    async fn logins(&self) -> anyhow::Result<Vec<String>>;
}

/// Everything the HTTP layer reads and writes.
#[async_trait]
pub trait Storage: ProgressStore {
    async fn upsert_user(&self, user: &NewUser) -> anyhow::Result<i32>;

    async fn get_user(&self, login: &str) -> anyhow::Result<Option<UserRecord>>;

    async fn get_leaderboard_place(&self, login: &str) -> anyhow::Result<Option<i64>>;

    async fn get_leaderboard(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> anyhow::Result<(Vec<LeaderboardRecord>, u64)>;

    async fn get_recent_activity(
        &self,
        login: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ActivityRecord>>;

    /// Number of activity log entries per UTC day within `[from, to)`.
    async fn get_activity_days(
        &self,
        login: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>>;

    async fn get_activity_totals(&self, login: &str) -> anyhow::Result<Vec<ActivityTypeCount>>;

    /// Returns `None` when the owner is not registered.
    async fn create_squad(
        &self,
        owner: &str,
        squad: &NewSquad,
    ) -> anyhow::Result<Option<SquadRecord>>;

    async fn get_public_squads(&self) -> anyhow::Result<Vec<SquadRecord>>;

    async fn get_user_squads(&self, login: &str) -> anyhow::Result<Vec<MySquadRecord>>;

    async fn join_squad(&self, login: &str, invite_code: &str) -> anyhow::Result<JoinResult>;

    async fn get_squad(&self, squad_id: i32) -> anyhow::Result<Option<SquadDetailsRecord>>;

    async fn statistics(&self) -> anyhow::Result<Statistics>;
}

pub fn generate_invite_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_CODE_LENGTH)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

/// Escapes `LIKE` wildcards so the search term matches literally.
pub fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

const SQUAD_COLUMNS: &str = r#"
    s.id, s.name, s.description, s.invite_code, s.is_private, s.created_at,
    (SELECT COUNT(*) FROM squad_members c WHERE c.squad_id = s.id) AS member_count
"#;

impl DB {
    async fn get_user_id(&self, login: &str) -> anyhow::Result<Option<i32>> {
        Ok(
            sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE lower(login) = lower($1)")
                .bind(login)
                .fetch_optional(&self.0)
                .await?,
        )
    }

    async fn get_squad_record(&self, squad_id: i32) -> anyhow::Result<Option<SquadRecord>> {
        Ok(sqlx::query_as::<_, SquadRecord>(&format!(
            "SELECT {SQUAD_COLUMNS} FROM squads s WHERE s.id = $1"
        ))
        .bind(squad_id)
        .fetch_optional(&self.0)
        .await?)
    }
}

#[async_trait]
impl ProgressStore for DB {
    async fn find_user(&self, login: &str) -> anyhow::Result<Option<UserProgress>> {
        Ok(sqlx::query_as::<_, UserProgress>(
            r#"
            SELECT login, xp, streak, best_streak, last_event_at, last_event_id, updated_at
            FROM users
            WHERE lower(login) = lower($1)
            "#,
        )
        .bind(login)
        .fetch_optional(&self.0)
        .await?)
    }

    async fn update_progress(&self, login: &str, patch: ProgressPatch) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET xp = $2, streak = $3, best_streak = $4, last_event_at = $5, last_event_id = $6,
                updated_at = now()
            WHERE lower(login) = lower($1)
            "#,
        )
        .bind(login)
        .bind(patch.xp)
        .bind(patch.streak)
        .bind(patch.best_streak)
        .bind(patch.last_event_at)
        .bind(&patch.last_event_id)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn append_activity(&self, entry: NewActivity) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (user_id, activity_type, repository, date, xp_earned)
            SELECT id, $2, $3, $4, $5
            FROM users
            WHERE lower(login) = lower($1)
            "#,
        )
        .bind(&entry.login)
        .bind(entry.activity_type.to_string())
        .bind(&entry.repository)
        .bind(entry.date)
        .bind(entry.xp_earned)
        .execute(&self.0)
        .await?;
        Ok(())
    }

    async fn logins(&self) -> anyhow::Result<Vec<String>> {
        Ok(
            sqlx::query_scalar::<_, String>("SELECT login FROM users ORDER BY id")
                .fetch_all(&self.0)
                .await?,
        )
    }
}

#[async_trait]
impl Storage for DB {
    async fn upsert_user(&self, user: &NewUser) -> anyhow::Result<i32> {
        // First try to update the user
        let rec = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE users
            SET name = $2, avatar = $3, bio = $4
            WHERE lower(login) = lower($1)
            RETURNING id
            "#,
        )
        .bind(&user.login)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.bio)
        .fetch_optional(&self.0)
        .await?;

        // If the update did not find a matching row, insert the user
        if let Some(id) = rec {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO users (login, name, avatar, bio)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.login)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.bio)
        .fetch_one(&self.0)
        .await?;

        Ok(id)
    }

    async fn get_user(&self, login: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, login, name, avatar, bio, xp, streak, best_streak, last_event_at, last_event_id,
                created_at, updated_at
            FROM users
            WHERE lower(login) = lower($1)
            "#,
        )
        .bind(login)
        .fetch_optional(&self.0)
        .await?)
    }

    async fn get_leaderboard_place(&self, login: &str) -> anyhow::Result<Option<i64>> {
        Ok(sqlx::query_scalar::<_, i64>(
            r#"
            SELECT place FROM (
                SELECT login, RANK() OVER (ORDER BY xp DESC) AS place
                FROM users
            ) ranked
            WHERE lower(login) = lower($1)
            "#,
        )
        .bind(login)
        .fetch_optional(&self.0)
        .await?)
    }

    async fn get_leaderboard(
        &self,
        search: Option<&str>,
        page: i64,
        limit: i64,
    ) -> anyhow::Result<(Vec<LeaderboardRecord>, u64)> {
        let pattern = search.map(like_pattern);
        let records = sqlx::query_as::<_, LeaderboardRecord>(
            r#"
            SELECT login, name, avatar, xp, streak, place FROM (
                SELECT login, name, avatar, xp, streak, RANK() OVER (ORDER BY xp DESC) AS place
                FROM users
            ) ranked
            WHERE $1::TEXT IS NULL OR login ILIKE $1
            ORDER BY place, login
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(page.saturating_mul(limit))
        .fetch_all(&self.0)
        .await?;

        // TODO: Replace this with a single query
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR login ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.0)
        .await?;

        Ok((records, total as u64))
    }

    async fn get_recent_activity(
        &self,
        login: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<ActivityRecord>> {
        Ok(sqlx::query_as::<_, ActivityRecord>(
            r#"
            SELECT a.activity_type, a.repository, a.date, a.xp_earned
            FROM activities a
            JOIN users u ON a.user_id = u.id
            WHERE lower(u.login) = lower($1)
            ORDER BY a.date DESC, a.id DESC
            LIMIT $2
            "#,
        )
        .bind(login)
        .bind(limit)
        .fetch_all(&self.0)
        .await?)
    }

    async fn get_activity_days(
        &self,
        login: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<(NaiveDate, i64)>> {
        Ok(sqlx::query_as::<_, (NaiveDate, i64)>(
            r#"
            SELECT (a.date AT TIME ZONE 'UTC')::DATE AS day, COUNT(*) AS count
            FROM activities a
            JOIN users u ON a.user_id = u.id
            WHERE lower(u.login) = lower($1) AND a.date >= $2 AND a.date < $3
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(login)
        .bind(from)
        .bind(to)
        .fetch_all(&self.0)
        .await?)
    }

    async fn get_activity_totals(&self, login: &str) -> anyhow::Result<Vec<ActivityTypeCount>> {
        Ok(sqlx::query_as::<_, ActivityTypeCount>(
            r#"
            SELECT a.activity_type, COUNT(*) AS count
            FROM activities a
            JOIN users u ON a.user_id = u.id
            WHERE lower(u.login) = lower($1)
            GROUP BY a.activity_type
            ORDER BY a.activity_type
            "#,
        )
        .bind(login)
        .fetch_all(&self.0)
        .await?)
    }

    async fn create_squad(
        &self,
        owner: &str,
        squad: &NewSquad,
    ) -> anyhow::Result<Option<SquadRecord>> {
        let mut tx = self.0.begin().await?;
        let Some(owner_id) =
            sqlx::query_scalar::<_, i32>("SELECT id FROM users WHERE lower(login) = lower($1)")
                .bind(owner)
                .fetch_optional(tx.as_mut())
                .await?
        else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, SquadRecord>(
            r#"
            INSERT INTO squads (name, description, invite_code, is_private)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, invite_code, is_private, created_at, 1::BIGINT AS member_count
            "#,
        )
        .bind(&squad.name)
        .bind(&squad.description)
        .bind(generate_invite_code())
        .bind(squad.is_private)
        .fetch_one(tx.as_mut())
        .await?;

        sqlx::query("INSERT INTO squad_members (squad_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(record.id)
            .bind(owner_id)
            .bind(SquadRole::Admin.to_string())
            .execute(tx.as_mut())
            .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn get_public_squads(&self) -> anyhow::Result<Vec<SquadRecord>> {
        Ok(sqlx::query_as::<_, SquadRecord>(&format!(
            "SELECT {SQUAD_COLUMNS} FROM squads s WHERE NOT s.is_private ORDER BY s.created_at DESC"
        ))
        .fetch_all(&self.0)
        .await?)
    }

    async fn get_user_squads(&self, login: &str) -> anyhow::Result<Vec<MySquadRecord>> {
        Ok(sqlx::query_as::<_, MySquadRecord>(&format!(
            r#"
            SELECT {SQUAD_COLUMNS}, m.role
            FROM squads s
            JOIN squad_members m ON m.squad_id = s.id
            JOIN users u ON u.id = m.user_id
            WHERE lower(u.login) = lower($1)
            ORDER BY s.created_at DESC
            "#
        ))
        .bind(login)
        .fetch_all(&self.0)
        .await?)
    }

    async fn join_squad(&self, login: &str, invite_code: &str) -> anyhow::Result<JoinResult> {
        let Some(squad_id) =
            sqlx::query_scalar::<_, i32>("SELECT id FROM squads WHERE invite_code = $1")
                .bind(invite_code)
                .fetch_optional(&self.0)
                .await?
        else {
            return Ok(JoinResult::InvalidCode);
        };
        let Some(user_id) = self.get_user_id(login).await? else {
            return Ok(JoinResult::UnknownUser);
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO squad_members (squad_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (squad_id, user_id) DO NOTHING
            "#,
        )
        .bind(squad_id)
        .bind(user_id)
        .bind(SquadRole::Member.to_string())
        .execute(&self.0)
        .await?;

        if inserted.rows_affected() == 0 {
            return Ok(JoinResult::AlreadyMember);
        }
        Ok(JoinResult::Joined {
            squad_id,
            role: SquadRole::Member,
        })
    }

    async fn get_squad(&self, squad_id: i32) -> anyhow::Result<Option<SquadDetailsRecord>> {
        let Some(squad) = self.get_squad_record(squad_id).await? else {
            return Ok(None);
        };

        let members = sqlx::query_as::<_, SquadMemberRecord>(
            r#"
            SELECT u.login, u.name, u.avatar, u.xp, u.streak, m.role, m.joined_at
            FROM squad_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.squad_id = $1
            ORDER BY u.xp DESC, u.login
            "#,
        )
        .bind(squad_id)
        .fetch_all(&self.0)
        .await?;

        Ok(Some(SquadDetailsRecord { squad, members }))
    }

    async fn statistics(&self) -> anyhow::Result<Statistics> {
        Ok(sqlx::query_as::<_, Statistics>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COALESCE(SUM(xp), 0) FROM users)::BIGINT AS total_xp,
                (SELECT COUNT(*) FROM activities) AS activities
            "#,
        )
        .fetch_one(&self.0)
        .await?)
    }
}

async fn run_migrations(rocket: Rocket<Build>) -> fairing::Result {
    match DB::fetch(&rocket) {
        Some(db) => match sqlx::migrate!("./migrations").run(&**db).await {
            Ok(_) => Ok(rocket),
            Err(e) => {
                rocket::error!("Failed to initialize SQLx database: {}", e);
                Err(rocket)
            }
        },
        None => Err(rocket),
    }
}

async fn manage_storage(rocket: Rocket<Build>) -> fairing::Result {
    match DB::fetch(&rocket) {
        Some(db) => {
            let storage: Arc<dyn Storage> = Arc::new(db.clone());
            Ok(rocket.manage(storage))
        }
        None => Err(rocket),
    }
}

pub fn stage() -> AdHoc {
    AdHoc::on_ignite("SQLx Stage", |rocket| async {
        rocket
            .attach(DB::init())
            .attach(AdHoc::try_on_ignite("SQLx Migrations", run_migrations))
            .attach(AdHoc::try_on_ignite("Postgres storage", manage_storage))
    })
}
