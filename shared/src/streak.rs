use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::ActivityEvent;

pub fn activity_dates<'a>(events: impl IntoIterator<Item = &'a ActivityEvent>) -> BTreeSet<NaiveDate> {
    events.into_iter().map(ActivityEvent::date).collect()
}

/// Counts consecutive active days ending today.
///
/// A day without activity yet does not break the streak: if `today` is absent
/// the walk starts from yesterday instead. The walk stops at the first missing
/// day, so it never runs past the dates present in `dates`.
pub fn calculate_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let start = if dates.contains(&today) {
        Some(today)
    } else {
        today.checked_sub_days(Days::new(1))
    };

    let mut streak = 0;
    let mut day = start;
    while let Some(current) = day {
        if !dates.contains(&current) {
            break;
        }
        streak += 1;
        day = current.checked_sub_days(Days::new(1));
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn days_ago(days: &[u64]) -> BTreeSet<NaiveDate> {
        days.iter()
            .map(|d| today().checked_sub_days(Days::new(*d)).unwrap())
            .collect()
    }

    #[test]
    fn no_dates_no_streak() {
        assert_eq!(calculate_streak(&BTreeSet::new(), today()), 0);
    }

    #[test]
    fn three_consecutive_days() {
        assert_eq!(calculate_streak(&days_ago(&[0, 1, 2]), today()), 3);
    }

    #[test]
    fn today_not_started_keeps_streak() {
        assert_eq!(calculate_streak(&days_ago(&[1, 2]), today()), 2);
    }

    #[test]
    fn gap_stops_the_walk() {
        assert_eq!(calculate_streak(&days_ago(&[0, 1, 3, 4]), today()), 2);
    }

    #[test]
    fn broken_before_yesterday() {
        assert_eq!(calculate_streak(&days_ago(&[2, 3, 4]), today()), 0);
    }

    #[test]
    fn walk_crosses_month_boundary() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let dates = [
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(calculate_streak(&dates, today), 3);
    }
}
