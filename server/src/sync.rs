use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocket::fairing::AdHoc;
use serde::{Deserialize, Serialize};
use shared::{activity_dates, calculate_streak, total_xp, ActivityEvent};
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    db::{
        types::{NewActivity, ProgressPatch},
        ProgressStore, Storage,
    },
    error::SyncError,
};

/// GitHub event ids are increasing numbers. Anything else sorts first.
fn event_seq(id: &str) -> u64 {
    id.parse().unwrap_or_default()
}

/// Order of events against the high-water mark.
fn event_key(event: &ActivityEvent) -> (DateTime<Utc>, u64) {
    (event.created_at, event_seq(&event.id))
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Up to `page_size` most recent public events of `login`, newest first.
    async fn fetch_events(&self, login: &str, page_size: u8)
        -> anyhow::Result<Vec<ActivityEvent>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncReport {
    pub events_count: u32,
    pub new_events: u32,
    pub xp_delta: u64,
    pub streak: u32,
}

pub struct Syncer<S: ?Sized> {
    store: Arc<S>,
    source: Arc<dyn EventSource>,
    page_size: u8,
}

pub type AppSyncer = Syncer<dyn Storage>;

impl<S: ProgressStore + ?Sized + 'static> Syncer<S> {
    pub fn new(store: Arc<S>, source: Arc<dyn EventSource>, page_size: u8) -> Self {
        Self {
            store,
            source,
            page_size,
        }
    }

    pub async fn sync(&self, login: &str) -> Result<SyncReport, SyncError> {
        self.sync_at(login, Utc::now()).await
    }

    /// One sync run as of `now`.
    ///
    /// Only events ordered after the stored high-water mark are scored, so
    /// repeated runs over the same window don't credit XP twice. The streak
    /// is derived from the whole fetched window, so a window without any
    /// event resets it to zero.
    #[instrument(skip(self))]
    pub async fn sync_at(&self, login: &str, now: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        let Some(progress) = self
            .store
            .find_user(login)
            .await
            .map_err(SyncError::PersistenceFailure)?
        else {
            return Err(SyncError::UserNotFound(login.to_string()));
        };

        let events = self
            .source
            .fetch_events(login, self.page_size)
            .await
            .map_err(SyncError::SourceUnavailable)?;

        let mark = progress
            .last_event_at
            .map(|at| (at, progress.last_event_id.as_deref().map_or(u64::MAX, event_seq)));
        let new_events: Vec<&ActivityEvent> = events
            .iter()
            .filter(|event| mark.map_or(true, |mark| event_key(event) > mark))
            .collect();
        let xp_delta = total_xp(new_events.iter().copied());
        let streak = calculate_streak(&activity_dates(&events), now.date_naive());

        let newest = events.iter().max_by_key(|event| event_key(event));
        let (last_event_at, last_event_id) = match newest {
            Some(event) if mark.map_or(true, |mark| event_key(event) > mark) => {
                (Some(event.created_at), Some(event.id.clone()))
            }
            _ => (progress.last_event_at, progress.last_event_id.clone()),
        };

        let patch = ProgressPatch {
            xp: progress.xp.saturating_add(xp_delta as i64),
            streak: streak as i32,
            best_streak: progress.best_streak.max(streak as i32),
            last_event_at,
            last_event_id,
        };
        self.store
            .update_progress(login, patch)
            .await
            .map_err(SyncError::PersistenceFailure)?;

        if let Some(latest) = new_events.iter().max_by_key(|event| event_key(event)) {
            self.store
                .append_activity(NewActivity {
                    login: progress.login.clone(),
                    activity_type: latest.kind.activity_type(),
                    repository: latest.repository.clone(),
                    date: latest.created_at,
                    xp_earned: xp_delta as i64,
                })
                .await
                .map_err(SyncError::PersistenceFailure)?;
        }

        let report = SyncReport {
            events_count: events.len() as u32,
            new_events: new_events.len() as u32,
            xp_delta,
            streak,
        };
        info!(
            "Synced {login}: {} events, {} new, +{} XP, streak {}",
            report.events_count, report.new_events, report.xp_delta, report.streak
        );
        Ok(report)
    }

    /// Runs a sync and swallows its failure. The caller can't tell a failed
    /// run from one that found nothing new.
    pub async fn sync_logged(&self, login: &str) -> SyncReport {
        match self.sync(login).await {
            Ok(report) => report,
            Err(e @ SyncError::UserNotFound(_)) => {
                debug!("Skipping sync: {e}");
                SyncReport::default()
            }
            Err(e @ SyncError::SourceUnavailable(_)) => {
                warn!("Failed to sync {login}: {e}");
                SyncReport::default()
            }
            Err(e @ SyncError::PersistenceFailure(_)) => {
                error!("Failed to sync {login}: {e}");
                SyncReport::default()
            }
        }
    }
}

impl<S: ProgressStore + ?Sized + 'static> Syncer<S> {
    pub fn sync_in_background(self: &Arc<Self>, login: String) {
        let syncer = self.clone();
        rocket::tokio::spawn(async move {
            syncer.sync_logged(&login).await;
        });
    }
}

/// Event source and page size shared by request handlers and the periodic
/// sync task.
#[derive(Clone)]
pub struct SyncContext {
    pub source: Arc<dyn EventSource>,
    pub page_size: u8,
}

impl SyncContext {
    pub fn new(source: Arc<dyn EventSource>, page_size: u8) -> Self {
        Self { source, page_size }
    }

    pub fn syncer(&self, storage: Arc<dyn Storage>) -> Arc<AppSyncer> {
        Arc::new(Syncer::new(storage, self.source.clone(), self.page_size))
    }
}

#[instrument(skip(syncer, storage))]
pub async fn sync_all_users(syncer: &AppSyncer, storage: &dyn Storage) -> anyhow::Result<()> {
    let logins = storage.logins().await?;
    let mut total_xp = 0;
    for login in &logins {
        total_xp += syncer.sync_logged(login).await.xp_delta;
    }
    info!("Synced {} users, +{total_xp} XP", logins.len());
    Ok(())
}

/// Manages the [`SyncContext`] and, when `sleep_duration` is set, syncs every
/// registered user on that interval until `atomic_bool` is cleared.
pub fn stage(
    context: SyncContext,
    sleep_duration: Option<Duration>,
    atomic_bool: Arc<AtomicBool>,
) -> AdHoc {
    AdHoc::on_ignite("Activity sync", move |rocket| async move {
        let rocket = rocket.manage(context);
        let Some(sleep_duration) = sleep_duration else {
            return rocket;
        };

        rocket.attach(AdHoc::on_liftoff(
            "Syncs user activity every X minutes",
            move |rocket| {
                Box::pin(async move {
                    let storage: Arc<dyn Storage> = rocket
                        .state()
                        .cloned()
                        .expect("Failed to get storage");
                    let context: SyncContext = rocket
                        .state()
                        .cloned()
                        .expect("Failed to get sync context");
                    let syncer = context.syncer(storage.clone());

                    rocket::tokio::spawn(async move {
                        let mut interval = rocket::tokio::time::interval(sleep_duration);
                        while atomic_bool.load(Ordering::Relaxed) {
                            interval.tick().await;

                            if let Err(e) = sync_all_users(&syncer, storage.as_ref()).await {
                                error!("Failed to sync users: {:#?}", e);
                            }
                        }
                    });
                })
            },
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Days, TimeZone};
    use shared::ActivityKind;

    use super::*;
    use crate::db::{memory::MemoryStore, types::NewUser};

    /// Serves a fixed batch, or fails when `events` is `None`.
    struct StubSource {
        events: Option<Vec<ActivityEvent>>,
        calls: Mutex<u32>,
    }

    impl StubSource {
        fn new(events: Vec<ActivityEvent>) -> Arc<Self> {
            Arc::new(Self {
                events: Some(events),
                calls: Mutex::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                events: None,
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl EventSource for StubSource {
        async fn fetch_events(
            &self,
            _login: &str,
            page_size: u8,
        ) -> anyhow::Result<Vec<ActivityEvent>> {
            *self.calls.lock().unwrap() += 1;
            match &self.events {
                Some(events) => Ok(events.iter().take(page_size as usize).cloned().collect()),
                None => anyhow::bail!("GitHub returned 503"),
            }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap()
    }

    fn event(id: &str, kind: ActivityKind, days_ago: u64, hour: u32) -> ActivityEvent {
        let date = now()
            .date_naive()
            .checked_sub_days(Days::new(days_ago))
            .unwrap();
        let created_at = Utc.from_utc_datetime(&date.and_hms_opt(hour, 0, 0).unwrap());
        ActivityEvent::new(id, kind, "gitrats/gitrats", created_at)
    }

    async fn store_with(login: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(&NewUser {
                login: login.to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
    }

    #[rocket::async_test]
    async fn scores_and_logs_the_latest_event() {
        let store = store_with("rat").await;
        let source = StubSource::new(vec![
            event("3", ActivityKind::Push { commits: 3 }, 0, 10),
            event(
                "2",
                ActivityKind::PullRequest {
                    action: "opened".to_string(),
                },
                1,
                9,
            ),
            event("1", ActivityKind::Create, 2, 8),
        ]);
        let syncer = Syncer::new(store.clone(), source, 100);

        let report = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(
            report,
            SyncReport {
                events_count: 3,
                new_events: 3,
                xp_delta: 15 + 20 + 5,
                streak: 3,
            }
        );

        let progress = store.find_user("rat").await.unwrap().unwrap();
        assert_eq!(progress.xp, 40);
        assert_eq!(progress.streak, 3);
        assert_eq!(progress.best_streak, 3);
        assert_eq!(progress.last_event_at, Some(event("", ActivityKind::Create, 0, 10).created_at));
        assert_eq!(progress.last_event_id.as_deref(), Some("3"));

        let log = store.get_recent_activity("rat", 10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].activity_type, "push");
        assert_eq!(log[0].xp_earned, 40);
    }

    #[rocket::async_test]
    async fn repeated_sync_does_not_double_count() {
        let store = store_with("rat").await;
        let source = StubSource::new(vec![event("1", ActivityKind::Push { commits: 1 }, 0, 10)]);
        let syncer = Syncer::new(store.clone(), source, 100);

        syncer.sync_at("rat", now()).await.unwrap();
        let second = syncer.sync_at("rat", now()).await.unwrap();

        assert_eq!(second.xp_delta, 0);
        assert_eq!(second.new_events, 0);
        assert_eq!(second.streak, 1);
        assert_eq!(store.find_user("rat").await.unwrap().unwrap().xp, 5);
        assert_eq!(store.get_recent_activity("rat", 10).await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn unknown_user_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let source = StubSource::new(vec![event("1", ActivityKind::Create, 0, 10)]);
        let syncer = Syncer::new(store.clone(), source.clone(), 100);

        let result = syncer.sync_at("ghost", now()).await;
        assert!(matches!(result, Err(SyncError::UserNotFound(_))));
        assert_eq!(source.calls(), 0);
        assert!(store.logins().await.unwrap().is_empty());
        assert_eq!(syncer.sync_logged("ghost").await, SyncReport::default());
    }

    #[rocket::async_test]
    async fn source_failure_leaves_state_untouched() {
        let store = store_with("rat").await;
        let syncer = Syncer::new(store.clone(), StubSource::failing(), 100);

        let result = syncer.sync_at("rat", now()).await;
        assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
        assert_eq!(syncer.sync_logged("rat").await, SyncReport::default());

        let progress = store.find_user("rat").await.unwrap().unwrap();
        assert_eq!(progress.xp, 0);
        assert_eq!(progress.updated_at, None);
        assert!(store.get_recent_activity("rat", 10).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn empty_window_resets_streak() {
        let store = store_with("rat").await;
        store
            .update_progress(
                "rat",
                ProgressPatch {
                    xp: 100,
                    streak: 5,
                    best_streak: 6,
                    last_event_at: None,
                    last_event_id: None,
                },
            )
            .await
            .unwrap();
        let syncer = Syncer::new(store.clone(), StubSource::new(vec![]), 100);

        let report = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(report.streak, 0);
        assert_eq!(report.xp_delta, 0);

        let progress = store.find_user("rat").await.unwrap().unwrap();
        assert_eq!((progress.xp, progress.streak, progress.best_streak), (100, 0, 6));
        assert!(store.get_recent_activity("rat", 10).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn late_event_in_the_marked_second_is_scored() {
        let store = store_with("rat").await;
        let first = event("100", ActivityKind::Push { commits: 1 }, 0, 10);
        let syncer = Syncer::new(store.clone(), StubSource::new(vec![first.clone()]), 100);
        syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(
            store.find_user("rat").await.unwrap().unwrap().last_event_id.as_deref(),
            Some("100")
        );

        // Same timestamp, delivered after the first run.
        let late = ActivityEvent::new("101", ActivityKind::Create, "gitrats/gitrats", first.created_at);
        let syncer = Syncer::new(store.clone(), StubSource::new(vec![late, first]), 100);
        let report = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(report.new_events, 1);
        assert_eq!(report.xp_delta, 5);

        let again = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(again.new_events, 0);

        let progress = store.find_user("rat").await.unwrap().unwrap();
        assert_eq!(progress.xp, 10);
        assert_eq!(progress.last_event_id.as_deref(), Some("101"));
    }

    #[rocket::async_test]
    async fn lower_streak_replaces_current_but_not_best() {
        let store = store_with("rat").await;
        store
            .update_progress(
                "rat",
                ProgressPatch {
                    xp: 0,
                    streak: 5,
                    best_streak: 5,
                    last_event_at: None,
                    last_event_id: None,
                },
            )
            .await
            .unwrap();
        // Today and yesterday, then a gap.
        let source = StubSource::new(vec![
            event("3", ActivityKind::Create, 0, 10),
            event("2", ActivityKind::Create, 1, 10),
            event("1", ActivityKind::Create, 3, 10),
        ]);
        let syncer = Syncer::new(store.clone(), source, 100);

        let report = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(report.streak, 2);
        let progress = store.find_user("rat").await.unwrap().unwrap();
        assert_eq!((progress.streak, progress.best_streak), (2, 5));
    }

    #[rocket::async_test]
    async fn page_size_bounds_the_fetch() {
        let store = store_with("rat").await;
        let events = (0..5)
            .map(|i| event(&i.to_string(), ActivityKind::Create, 0, 10 - i))
            .collect();
        let syncer = Syncer::new(store.clone(), StubSource::new(events), 2);

        let report = syncer.sync_at("rat", now()).await.unwrap();
        assert_eq!(report.events_count, 2);
        assert_eq!(report.xp_delta, 10);
    }
}
