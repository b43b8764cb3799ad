use chrono::{Datelike, NaiveDate};

use crate::utils::time::{last_day_of_month, months_between, week_start};

use super::{Frequency, RecurrenceRule};

/// Returns every date in `(window_start, window_end]` on which `rule` is due, in order.
///
/// The cursor walks one day at a time for every frequency. `interval` is a phase counted from
/// the rule's `starts_on`, or from `window_start` when the rule has no anchor yet, so the same
/// rule yields the same dates no matter how the horizon is split into windows.
pub fn expand(rule: &RecurrenceRule, window_start: NaiveDate, window_end: NaiveDate) -> Vec<NaiveDate> {
    let anchor = rule.starts_on.unwrap_or(window_start);
    let end = rule
        .end_date
        .map_or(window_end, |end_date| end_date.min(window_end));

    let mut dates = vec![];
    let mut cursor = window_start;
    while let Some(next) = cursor.succ_opt() {
        cursor = next;
        if cursor > end {
            break;
        }
        if is_due(rule, anchor, cursor) {
            dates.push(cursor);
        }
    }
    dates
}

fn is_due(rule: &RecurrenceRule, anchor: NaiveDate, day: NaiveDate) -> bool {
    if day < anchor {
        return false;
    }
    let step = rule.step();

    match rule.frequency {
        Frequency::Daily => (day - anchor).num_days() % step == 0,
        Frequency::Weekly => {
            let weekday = day.weekday().num_days_from_sunday() as u8;
            let on_day = match &rule.days_of_week {
                Some(days) if !days.is_empty() => days.contains(&weekday),
                _ => weekday == anchor.weekday().num_days_from_sunday() as u8,
            };
            on_day && (week_start(day) - week_start(anchor)).num_weeks() % step == 0
        }
        Frequency::Monthly => {
            let wanted = rule
                .day_of_month
                .unwrap_or(1)
                .clamp(1, 31)
                .min(last_day_of_month(day.year(), day.month()));
            day.day() == wanted && months_between(anchor, day) as i64 % step == 0
        }
        Frequency::Yearly => {
            // Feb 29 anchors fall back to Feb 28 in common years.
            let wanted = anchor.day().min(last_day_of_month(day.year(), anchor.month()));
            day.month() == anchor.month()
                && day.day() == wanted
                && (day.year() - anchor.year()) as i64 % step == 0
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, NaiveDate, Weekday};

    use crate::recurrence::{Frequency, RecurrenceRule};

    use super::expand;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_skips_window_start() {
        let start = day(2026, 10, 19);
        let dates = expand(
            &RecurrenceRule::new(Frequency::Daily, 1),
            start,
            start + Duration::days(5),
        );
        let expected = (1..=5).map(|i| start + Duration::days(i)).collect::<Vec<_>>();
        assert_eq!(dates, expected);
    }

    #[test]
    fn daily_interval_is_counted_from_anchor() {
        let anchor = day(2026, 10, 1);
        let rule = RecurrenceRule::new(Frequency::Daily, 3).with_starts_on(anchor);
        let dates = expand(&rule, day(2026, 10, 5), day(2026, 10, 14));
        assert_eq!(
            dates,
            vec![day(2026, 10, 7), day(2026, 10, 10), day(2026, 10, 13)]
        );
    }

    #[test]
    fn split_windows_match_one_window() {
        let anchor = day(2026, 1, 1);
        let rule = RecurrenceRule::new(Frequency::Daily, 7).with_starts_on(anchor);
        let whole = expand(&rule, anchor, day(2026, 3, 1));
        let mut split = expand(&rule, anchor, day(2026, 1, 30));
        split.extend(expand(&rule, day(2026, 1, 30), day(2026, 3, 1)));
        assert_eq!(whole, split);
    }

    #[test]
    fn weekly_on_monday_and_wednesday() {
        // 2026-10-18 is a Sunday.
        let sunday = day(2026, 10, 18);
        assert_eq!(sunday.weekday(), Weekday::Sun);
        let rule = RecurrenceRule::new(Frequency::Weekly, 1).with_days_of_week([1, 3]);
        let dates = expand(&rule, sunday, sunday + Duration::days(14));

        assert_eq!(dates.len(), 4);
        assert!(dates
            .iter()
            .all(|d| matches!(d.weekday(), Weekday::Mon | Weekday::Wed)));
    }

    #[test]
    fn weekly_every_other_week() {
        let sunday = day(2026, 10, 18);
        let rule = RecurrenceRule::new(Frequency::Weekly, 2).with_days_of_week([1]);
        let dates = expand(&rule, sunday, sunday + Duration::days(28));
        assert_eq!(dates, vec![day(2026, 10, 19), day(2026, 11, 2)]);
    }

    #[test]
    fn weekly_without_days_uses_anchor_weekday() {
        let thursday = day(2026, 10, 15);
        let rule = RecurrenceRule::new(Frequency::Weekly, 1).with_starts_on(thursday);
        let dates = expand(&rule, thursday, thursday + Duration::days(14));
        assert_eq!(dates, vec![day(2026, 10, 22), day(2026, 10, 29)]);
    }

    #[test]
    fn monthly_clamps_to_short_months() {
        let rule = RecurrenceRule::new(Frequency::Monthly, 1)
            .with_day_of_month(31)
            .with_starts_on(day(2026, 1, 1));
        let dates = expand(&rule, day(2026, 1, 1), day(2026, 4, 30));
        assert_eq!(
            dates,
            vec![
                day(2026, 1, 31),
                day(2026, 2, 28),
                day(2026, 3, 31),
                day(2026, 4, 30)
            ]
        );
    }

    #[test]
    fn monthly_defaults_to_first_day() {
        let rule = RecurrenceRule::new(Frequency::Monthly, 2).with_starts_on(day(2026, 1, 1));
        let dates = expand(&rule, day(2026, 1, 1), day(2026, 6, 30));
        assert_eq!(dates, vec![day(2026, 3, 1), day(2026, 5, 1)]);
    }

    #[test]
    fn yearly_repeats_anchor_date() {
        let rule = RecurrenceRule::new(Frequency::Yearly, 1).with_starts_on(day(2024, 2, 29));
        let dates = expand(&rule, day(2024, 3, 1), day(2028, 3, 1));
        assert_eq!(
            dates,
            vec![
                day(2025, 2, 28),
                day(2026, 2, 28),
                day(2027, 2, 28),
                day(2028, 2, 29)
            ]
        );
    }

    #[test]
    fn end_date_limits_window() {
        let start = day(2026, 10, 19);
        let rule = RecurrenceRule::new(Frequency::Daily, 1).with_end_date(day(2026, 10, 21));
        let dates = expand(&rule, start, start + Duration::days(30));
        assert_eq!(dates, vec![day(2026, 10, 20), day(2026, 10, 21)]);
    }

    #[test]
    fn zero_interval_behaves_like_one() {
        let start = day(2026, 10, 19);
        let dates = expand(
            &RecurrenceRule::new(Frequency::Daily, 0),
            start,
            start + Duration::days(3),
        );
        assert_eq!(dates.len(), 3);
    }

    #[test]
    fn empty_window() {
        let start = day(2026, 10, 19);
        let rule = RecurrenceRule::new(Frequency::Daily, 1);
        assert!(expand(&rule, start, start).is_empty());
        assert!(expand(&rule, start, start - Duration::days(3)).is_empty());
    }
}
