use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DAYS_IN_WEEK: usize = 7;

pub fn contribution_level(count: u32) -> u8 {
    match count {
        0 => 0,
        1..=3 => 1,
        4..=6 => 2,
        7..=9 => 3,
        _ => 4,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: NaiveDate,
    pub count: u32,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionCalendar {
    pub year: i32,
    pub total_contributions: u32,
    pub weeks: Vec<Vec<ContributionDay>>,
}

impl ContributionCalendar {
    /// Lays out every day of `year` in chunks of seven, starting at January 1st.
    /// Dates outside the year are ignored.
    pub fn for_year(year: i32, counts: &BTreeMap<NaiveDate, u32>) -> Option<Self> {
        let mut day = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let mut days = Vec::with_capacity(366);
        while day.year() == year {
            let count = counts.get(&day).copied().unwrap_or_default();
            days.push(ContributionDay {
                date: day,
                count,
                level: contribution_level(count),
            });
            day = match day.checked_add_days(Days::new(1)) {
                Some(next) => next,
                None => break,
            };
        }

        let total_contributions = days.iter().map(|d| d.count).sum();
        let weeks = days.chunks(DAYS_IN_WEEK).map(<[_]>::to_vec).collect();

        Some(Self {
            year,
            total_contributions,
            weeks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_thresholds() {
        let levels: Vec<_> = [0, 1, 3, 4, 6, 7, 9, 10, 42]
            .into_iter()
            .map(contribution_level)
            .collect();
        assert_eq!(levels, vec![0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn leap_year_layout() {
        let mut counts = BTreeMap::new();
        counts.insert(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(), 5);
        counts.insert(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), 11);
        counts.insert(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 100);

        let calendar = ContributionCalendar::for_year(2024, &counts).unwrap();
        assert_eq!(calendar.total_contributions, 16);
        assert_eq!(calendar.weeks.len(), 53);
        assert_eq!(calendar.weeks.last().unwrap().len(), 366 % 7);

        let last = calendar.weeks.last().unwrap().last().unwrap();
        assert_eq!(last.date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert_eq!(last.level, 4);
    }
}
