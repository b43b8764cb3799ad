use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::storage::entities::Habit;

/// The dashboard streak never looks further back than this.
const MAX_COMBINED_STREAK_DAYS: u32 = 365;

/// Number of consecutive days ending at `today` that are all present in `dates`. The first
/// missing day ends the count, so a habit not done today has a streak of 0.
pub fn streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut day = today;
    while dates.contains(&day) {
        count += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    count
}

/// Longest run of consecutive days anywhere in `dates`.
pub fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in dates {
        current = match previous {
            Some(p) if *day - p == Duration::days(1) => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(*day);
    }
    longest
}

/// Days in a row, ending at `today`, on which at least one habit was completed.
pub fn combined_streak(habits: &[Habit], today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut day = today;
    while count < MAX_COMBINED_STREAK_DAYS
        && habits.iter().any(|h| h.completed_dates.contains(&day))
    {
        count += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    count
}
