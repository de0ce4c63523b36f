use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{activity_dates, calculate_streak, ActivityEvent, ActivityKind, ACTION_OPENED};

pub const XP_PER_COMMIT: u64 = 5;
pub const XP_PULL_REQUEST_OPENED: u64 = 20;
pub const XP_ISSUE_OPENED: u64 = 10;
pub const XP_CREATE: u64 = 5;
pub const XP_OTHER: u64 = 1;

pub const XP_PER_LEVEL_STEP: u64 = 100;

pub fn event_xp(kind: &ActivityKind) -> u64 {
    match kind {
        ActivityKind::Push { commits } => XP_PER_COMMIT * u64::from((*commits).max(1)),
        ActivityKind::PullRequest { action } if action == ACTION_OPENED => XP_PULL_REQUEST_OPENED,
        ActivityKind::Issue { action } if action == ACTION_OPENED => XP_ISSUE_OPENED,
        ActivityKind::PullRequest { .. } | ActivityKind::Issue { .. } => 0,
        ActivityKind::Create => XP_CREATE,
        ActivityKind::Other { .. } => XP_OTHER,
    }
}

pub fn total_xp<'a>(events: impl IntoIterator<Item = &'a ActivityEvent>) -> u64 {
    events.into_iter().map(|event| event_xp(&event.kind)).sum()
}

/// Level 1 at 0 XP, then one level per square step: 100, 400, 900, ...
pub fn level(xp: u64) -> u32 {
    let steps = xp / XP_PER_LEVEL_STEP;
    let mut root = (steps as f64).sqrt() as u64;
    // Float sqrt can be off by one for large values.
    while root * root > steps {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= steps {
        root += 1;
    }
    1 + root as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DerivedProgress {
    pub xp_delta: u64,
    pub streak: u32,
    pub activity_dates: BTreeSet<NaiveDate>,
}

/// Derives XP and streak from a batch of events as of `today` (UTC).
pub fn derive_progress(events: &[ActivityEvent], today: NaiveDate) -> DerivedProgress {
    let activity_dates = activity_dates(events);
    DerivedProgress {
        xp_delta: total_xp(events),
        streak: calculate_streak(&activity_dates, today),
        activity_dates,
    }
}
