use std::{collections::BTreeSet, fmt::Display};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::RecurrenceRule;

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Anything that is stored as a whole collection under one cache key.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;
}

/// Records whose mutations are replayed against the remote store.
pub trait Entity: Record {
    const KIND: EntityKind;

    /// Marks the entity as modified at `now`.
    fn touch(&mut self, now: DateTime<Utc>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Task,
    Habit,
    Note,
    Project,
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Task => write!(f, "task"),
            EntityKind::Habit => write!(f, "habit"),
            EntityKind::Note => write!(f, "note"),
            EntityKind::Project => write!(f, "project"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Points a task of this priority is worth unless set explicitly.
    pub fn points(self) -> u32 {
        match self {
            Priority::Low => 10,
            Priority::Medium => 15,
            Priority::High => 20,
            Priority::Urgent => 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Set on sub-tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring: Option<RecurrenceRule>,
    /// Set on instances spawned by a recurring template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub points: u32,
    /// Estimate in minutes.
    #[serde(default, rename = "estimatedTime", skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

pub const DEFAULT_TASK_POINTS: u32 = 10;

impl Task {
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            description: None,
            completed: false,
            priority: Priority::default(),
            due_date: None,
            category: String::new(),
            created_at: now,
            updated_at: now,
            project_id: None,
            parent_id: None,
            recurring: None,
            template_id: None,
            order: 0,
            points: DEFAULT_TASK_POINTS,
            estimated_minutes: None,
        }
    }

    pub fn is_recurring_template(&self) -> bool {
        self.recurring.as_ref().is_some_and(|v| v.enabled)
    }
}

impl Record for Task {
    const COLLECTION: &'static str = "tasks";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub color: String,
    /// Days the habit was done. The streak is always derived from this set.
    #[serde(default)]
    pub completed_dates: BTreeSet<NaiveDate>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub target: u32,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub total_completions: u32,
}

impl Habit {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_id(),
            name: name.into(),
            description: None,
            color: String::new(),
            completed_dates: BTreeSet::new(),
            created_at: now,
            target: 1,
            points: DEFAULT_TASK_POINTS,
            level: 1,
            total_completions: 0,
        }
    }

    /// Flips completion for `day`. Returns whether the habit is now completed on that day.
    pub fn toggle(&mut self, day: NaiveDate) -> bool {
        if self.completed_dates.remove(&day) {
            self.total_completions = self.total_completions.saturating_sub(1);
            false
        } else {
            self.completed_dates.insert(day);
            self.total_completions += 1;
            true
        }
    }
}

impl Record for Habit {
    const COLLECTION: &'static str = "habits";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Habit {
    const KIND: EntityKind = EntityKind::Habit;

    // Habits carry no modification timestamp.
    fn touch(&mut self, _now: DateTime<Utc>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub pinned: bool,
}

impl Record for Note {
    const COLLECTION: &'static str = "notes";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Note {
    const KIND: EntityKind = EntityKind::Note;

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// 0 to 100.
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub points: u32,
}

impl Record for Project {
    const COLLECTION: &'static str = "projects";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Project {
    const KIND: EntityKind = EntityKind::Project;

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSession {
    pub id: String,
    /// Length in seconds.
    #[serde(rename = "duration")]
    pub duration_seconds: u32,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub points: u32,
}

impl PomodoroSession {
    pub fn focus_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.
    }
}

impl Record for PomodoroSession {
    const COLLECTION: &'static str = "pomodoro-sessions";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub email: bool,
    pub desktop: bool,
    pub reminders: bool,
    pub sound: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: false,
            desktop: true,
            reminders: true,
            sound: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationSettings {
    pub enabled: bool,
    pub show_points: bool,
    pub show_level: bool,
    pub celebrate_achievements: bool,
}

impl Default for GamificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            show_points: true,
            show_level: true,
            celebrate_achievements: true,
        }
    }
}

/// Stored as a single value. Missing fields fall back to defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSettings {
    pub theme: Theme,
    pub name: String,
    pub notifications: NotificationSettings,
    pub gamification: GamificationSettings,
}

pub const SETTINGS_KEY: &str = "settings";

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn task_uses_stored_field_names() -> anyhow::Result<()> {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let mut task = Task::new("write report", now);
        task.estimated_minutes = Some(30);
        let value = serde_json::to_value(&task)?;
        assert_eq!(value["createdAt"], serde_json::json!("2026-10-19T09:00:00Z"));
        assert_eq!(value["estimatedTime"], serde_json::json!(30));
        assert_eq!(value["priority"], serde_json::json!("medium"));
        assert!(value.get("dueDate").is_none());
        Ok(())
    }

    #[test]
    fn habit_parses_iso_dates() -> anyhow::Result<()> {
        let habit: Habit = serde_json::from_str(
            r#"{"id":"h1","name":"read","completedDates":["2026-10-18","2026-10-19"],
                "createdAt":"2026-10-01T00:00:00Z"}"#,
        )?;
        assert_eq!(habit.completed_dates.len(), 2);
        assert!(habit
            .completed_dates
            .contains(&NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()));
        Ok(())
    }

    #[test]
    fn habit_toggle_tracks_completions() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap();
        let day = now.date_naive();
        let mut habit = Habit::new("stretch", now);
        assert!(habit.toggle(day));
        assert_eq!(habit.total_completions, 1);
        assert!(!habit.toggle(day));
        assert_eq!(habit.total_completions, 0);
        assert!(habit.completed_dates.is_empty());
    }

    #[test]
    fn settings_fill_missing_fields() -> anyhow::Result<()> {
        let settings: UserSettings = serde_json::from_str(r#"{"theme":"dark"}"#)?;
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.gamification.enabled);
        Ok(())
    }

    #[test]
    fn session_kind_names() -> anyhow::Result<()> {
        assert_eq!(
            serde_json::to_value(SessionKind::ShortBreak)?,
            serde_json::json!("short-break")
        );
        assert_eq!(
            serde_json::to_value(ProjectStatus::OnHold)?,
            serde_json::json!("on-hold")
        );
        Ok(())
    }
}
