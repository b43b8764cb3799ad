use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::{
    storage::entities::{Habit, PomodoroSession, SessionKind, Task},
    utils::time::week_start,
};

use super::{
    score::{productivity_score, DayActivity},
    streak::combined_streak,
};

/// Rollup of one day of activity. Stored per day and used for the weekly reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAnalytics {
    pub date: NaiveDate,
    pub tasks_completed: u32,
    pub tasks_created: u32,
    pub habits_completed: u32,
    pub pomodoro_sessions: u32,
    /// Minutes.
    pub total_focus_time: f64,
    pub productivity_score: u8,
    pub streak_days: u32,
    pub categories_worked: Vec<String>,
}

impl DailyAnalytics {
    /// Computes the rollup for `day`. A task counts as completed on the day it was last
    /// updated; focus time only comes from completed work sessions started that day.
    pub fn compute(
        tasks: &[Task],
        habits: &[Habit],
        sessions: &[PomodoroSession],
        day: NaiveDate,
    ) -> Self {
        let completed = tasks
            .iter()
            .filter(|t| t.completed && t.updated_at.date_naive() == day)
            .collect::<Vec<_>>();
        let tasks_created = tasks
            .iter()
            .filter(|t| t.created_at.date_naive() == day)
            .count() as u32;
        let habits_completed = habits
            .iter()
            .filter(|h| h.completed_dates.contains(&day))
            .count() as u32;
        let focus_sessions = sessions
            .iter()
            .filter(|s| {
                s.completed && s.kind == SessionKind::Work && s.start_time.date_naive() == day
            })
            .collect::<Vec<_>>();
        let total_focus_time = focus_sessions.iter().map(|s| s.focus_minutes()).sum::<f64>();

        let categories_worked = completed
            .iter()
            .filter(|t| !t.category.is_empty())
            .map(|t| t.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let activity = DayActivity {
            tasks_completed: completed.len() as u32,
            tasks_created,
            habits_completed,
            habits_total: habits.len() as u32,
            focus_minutes: total_focus_time,
        };

        Self {
            date: day,
            tasks_completed: activity.tasks_completed,
            tasks_created,
            habits_completed,
            pomodoro_sessions: focus_sessions.len() as u32,
            total_focus_time,
            productivity_score: productivity_score(&activity),
            streak_days: combined_streak(habits, day),
            categories_worked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    /// Sunday starting the week.
    pub week: NaiveDate,
    pub total_tasks: u32,
    /// Percent of created tasks that were completed.
    pub completion_rate: u32,
    pub top_category: String,
    pub total_focus_time: f64,
    pub average_productivity: u32,
}

/// Groups days into Sunday-started weeks, newest week first.
pub fn weekly_reports(days: &[DailyAnalytics]) -> Vec<WeeklyReport> {
    let mut weeks = BTreeMap::<NaiveDate, Vec<&DailyAnalytics>>::new();
    for day in days {
        weeks.entry(week_start(day.date)).or_default().push(day);
    }

    weeks
        .into_iter()
        .rev()
        .map(|(week, days)| {
            let total_tasks = days.iter().map(|d| d.tasks_completed).sum::<u32>();
            let total_created = days.iter().map(|d| d.tasks_created).sum::<u32>();
            let completion_rate = if total_created > 0 {
                (total_tasks as f64 / total_created as f64 * 100.).round() as u32
            } else {
                0
            };

            let mut category_count = BTreeMap::<&str, u32>::new();
            for category in days.iter().flat_map(|d| d.categories_worked.iter()) {
                *category_count.entry(category.as_str()).or_default() += 1;
            }
            // Ties go to the alphabetically first category.
            let top_category = category_count
                .into_iter()
                .fold(None::<(&str, u32)>, |best, (category, count)| match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((category, count)),
                })
                .map_or_else(|| "None".to_string(), |(category, _)| category.to_string());

            let total_focus_time = days.iter().map(|d| d.total_focus_time).sum::<f64>();
            let average_productivity = (days
                .iter()
                .map(|d| d.productivity_score as f64)
                .sum::<f64>()
                / days.len() as f64)
                .round() as u32;

            WeeklyReport {
                week,
                total_tasks,
                completion_rate,
                top_category,
                total_focus_time,
                average_productivity,
            }
        })
        .collect()
}

/// Percent change of the average score between the older and the newer half of the last
/// `days` entries. `days` must be sorted by date.
pub fn productivity_trend(days: &[DailyAnalytics], last: usize) -> i32 {
    let recent = &days[days.len().saturating_sub(last)..];
    if recent.len() < 2 {
        return 0;
    }
    let (first, second) = recent.split_at(recent.len() / 2);
    let first_avg = average_score(first);
    let second_avg = average_score(second);
    if first_avg == 0. {
        return 0;
    }
    ((second_avg - first_avg) / first_avg * 100.).round() as i32
}

fn average_score(days: &[DailyAnalytics]) -> f64 {
    days.iter().map(|d| d.productivity_score as f64).sum::<f64>() / days.len() as f64
}

/// Day with the highest score. The earliest one wins ties.
pub fn best_day(days: &[DailyAnalytics]) -> Option<&DailyAnalytics> {
    days.iter().fold(None, |best, current| match best {
        Some(b) if b.productivity_score >= current.productivity_score => Some(b),
        _ => Some(current),
    })
}

pub const TREND_THRESHOLD: i32 = 10;
pub const HIGH_FOCUS_MINUTES: f64 = 120.;
pub const LOW_FOCUS_MINUTES: f64 = 60.;

/// Short human readable observations about the stored history.
pub fn insights(days: &[DailyAnalytics]) -> Vec<String> {
    let mut insights = vec![];
    if days.is_empty() {
        return insights;
    }

    let trend = productivity_trend(days, 7);
    if trend > TREND_THRESHOLD {
        insights.push("Your productivity is trending upward. Keep up the great work.".into());
    } else if trend < -TREND_THRESHOLD {
        insights
            .push("Your productivity has dipped recently. Consider reviewing your goals.".into());
    }

    let average_focus = days.iter().map(|d| d.total_focus_time).sum::<f64>() / days.len() as f64;
    if average_focus > HIGH_FOCUS_MINUTES {
        insights.push("Excellent focus time: over 2 hours of deep work a day on average.".into());
    } else if average_focus < LOW_FOCUS_MINUTES {
        insights.push("Try to increase your focus time to at least 1 hour a day.".into());
    }

    if let Some(best) = best_day(days) {
        insights.push(format!(
            "{}s seem to be your most productive days.",
            weekday_name(best.date.weekday())
        ));
    }
    insights
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}
