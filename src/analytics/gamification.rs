use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROFILE_KEY: &str = "profile";
pub const POINTS_PER_LEVEL: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Tasks,
    Habits,
    Streaks,
    Time,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub points: u32,
    pub category: AchievementCategory,
}

pub const ACHIEVEMENTS: [Achievement; 6] = [
    Achievement {
        id: "first-task",
        title: "Getting Started",
        description: "Complete your first task",
        points: 10,
        category: AchievementCategory::Tasks,
    },
    Achievement {
        id: "task-master",
        title: "Task Master",
        description: "Complete 10 tasks",
        points: 50,
        category: AchievementCategory::Tasks,
    },
    Achievement {
        id: "streak-starter",
        title: "Streak Starter",
        description: "Maintain a 7-day habit streak",
        points: 30,
        category: AchievementCategory::Streaks,
    },
    Achievement {
        id: "habit-hero",
        title: "Habit Hero",
        description: "Complete 30 habit sessions",
        points: 100,
        category: AchievementCategory::Habits,
    },
    Achievement {
        id: "time-warrior",
        title: "Time Warrior",
        description: "Complete 10 Pomodoro sessions",
        points: 75,
        category: AchievementCategory::Time,
    },
    Achievement {
        id: "productivity-guru",
        title: "Productivity Guru",
        description: "Reach level 10",
        points: 200,
        category: AchievementCategory::Special,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub unlocked_at: DateTime<Utc>,
}

/// Points, level and achievements of the user. Stored as a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub level: u32,
    pub total_points: u32,
    pub achievements: Vec<UnlockedAchievement>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            level: 1,
            total_points: 0,
            achievements: vec![],
        }
    }
}

/// What triggered an award. Some achievements only unlock on a specific event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardReason {
    TaskCompleted,
    HabitCompleted,
    SessionCompleted,
}

/// Counters achievements are checked against, gathered from the stored collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed_tasks: u32,
    pub longest_habit_streak: u32,
    pub total_habit_completions: u32,
    pub completed_sessions: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    pub total_points: u32,
    pub level: u32,
    pub leveled_up: bool,
    pub unlocked: Vec<Achievement>,
}

pub fn level_for(points: u32) -> u32 {
    points / POINTS_PER_LEVEL + 1
}

impl Profile {
    pub fn has(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a.id == id)
    }

    /// Adds `points`, then unlocks any achievement the new state qualifies for. Bonus points of
    /// unlocked achievements are added on top and can raise the level further.
    pub fn add_points(
        &mut self,
        points: u32,
        reason: AwardReason,
        progress: &Progress,
        now: DateTime<Utc>,
    ) -> Award {
        let previous_level = self.level;
        self.total_points += points;
        self.level = level_for(self.total_points);

        let unlocked = self.check_achievements(reason, progress, now);

        Award {
            total_points: self.total_points,
            level: self.level,
            leveled_up: self.level > previous_level,
            unlocked,
        }
    }

    pub fn check_achievements(
        &mut self,
        reason: AwardReason,
        progress: &Progress,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        let unlocked = ACHIEVEMENTS
            .iter()
            .filter(|a| !self.has(a.id))
            .filter(|a| match a.id {
                "first-task" => reason == AwardReason::TaskCompleted,
                "task-master" => progress.completed_tasks >= 10,
                "streak-starter" => progress.longest_habit_streak >= 7,
                "habit-hero" => progress.total_habit_completions >= 30,
                "time-warrior" => progress.completed_sessions >= 10,
                "productivity-guru" => self.level >= 10,
                _ => false,
            })
            .copied()
            .collect::<Vec<_>>();

        for achievement in &unlocked {
            self.achievements.push(UnlockedAchievement {
                id: achievement.id.to_string(),
                unlocked_at: now,
            });
            self.total_points += achievement.points;
        }
        self.level = level_for(self.total_points);
        unlocked
    }

    /// Progress towards the next level in percent.
    pub fn next_level_progress(&self) -> f64 {
        let current_level_points = (self.level.saturating_sub(1) * POINTS_PER_LEVEL) as f64;
        let progress = (self.total_points as f64 - current_level_points) / POINTS_PER_LEVEL as f64
            * 100.;
        progress.clamp(0., 100.)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_task_unlocks_once() {
        let mut profile = Profile::default();
        let award = profile.add_points(10, AwardReason::TaskCompleted, &Progress::default(), now());
        assert_eq!(
            award.unlocked.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec!["first-task"]
        );
        assert_eq!(award.total_points, 20);

        let award = profile.add_points(10, AwardReason::TaskCompleted, &Progress::default(), now());
        assert!(award.unlocked.is_empty());
        assert_eq!(profile.total_points, 30);
    }

    #[test]
    fn leveling_up() {
        let mut profile = Profile {
            total_points: 95,
            ..Default::default()
        };
        let award = profile.add_points(10, AwardReason::HabitCompleted, &Progress::default(), now());
        assert!(award.leveled_up);
        assert_eq!(award.level, 2);
        assert_eq!(profile.next_level_progress(), 5.);
    }

    #[test]
    fn progress_based_achievements() {
        let mut profile = Profile::default();
        let progress = Progress {
            completed_tasks: 10,
            longest_habit_streak: 7,
            total_habit_completions: 30,
            completed_sessions: 10,
        };
        let award = profile.add_points(0, AwardReason::SessionCompleted, &progress, now());
        // task-master, streak-starter, habit-hero and time-warrior: 255 points -> level 3
        assert_eq!(award.unlocked.len(), 4);
        assert_eq!(profile.total_points, 255);
        assert_eq!(profile.level, 3);
        assert!(!profile.has("first-task"));
    }

    #[test]
    fn guru_at_level_ten() {
        let mut profile = Profile {
            total_points: 895,
            level: 9,
            ..Default::default()
        };
        let award = profile.add_points(5, AwardReason::HabitCompleted, &Progress::default(), now());
        assert!(award.unlocked.iter().any(|a| a.id == "productivity-guru"));
        assert_eq!(profile.total_points, 1100);
        assert_eq!(profile.level, 12);
    }
}
