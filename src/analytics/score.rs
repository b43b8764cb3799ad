/// Most points the task completion ratio contributes.
pub const TASK_WEIGHT: f64 = 40.;
pub const HABIT_WEIGHT: f64 = 30.;
pub const FOCUS_WEIGHT: f64 = 30.;
/// Focus time that earns the full focus share.
pub const FOCUS_TARGET_MINUTES: f64 = 120.;

/// Activity of a single day the score is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayActivity {
    pub tasks_completed: u32,
    pub tasks_created: u32,
    pub habits_completed: u32,
    pub habits_total: u32,
    pub focus_minutes: f64,
}

/// Composite 0-100 score: task completion ratio up to 40 points, habit completion ratio up to
/// 30 and focus time up to 30, where two hours of focus earns the full share.
pub fn productivity_score(activity: &DayActivity) -> u8 {
    let task_score = ratio_share(
        activity.tasks_completed as f64,
        activity.tasks_created as f64,
        TASK_WEIGHT,
    );
    let habit_score = ratio_share(
        activity.habits_completed as f64,
        activity.habits_total as f64,
        HABIT_WEIGHT,
    );
    let focus_score = (activity.focus_minutes.max(0.) / FOCUS_TARGET_MINUTES * FOCUS_WEIGHT)
        .min(FOCUS_WEIGHT);

    (task_score + habit_score + focus_score).round() as u8
}

// An empty denominator counts as one.
fn ratio_share(done: f64, total: f64, weight: f64) -> f64 {
    (done / total.max(1.) * weight).min(weight)
}
