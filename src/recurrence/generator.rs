use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::debug;

use crate::{
    storage::entities::{generate_id, Task},
    utils::time::start_of_day,
};

use super::expand;

/// How far ahead instances are created on every run.
pub const GENERATION_HORIZON_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub instances: Vec<Task>,
    /// The template with its rule stamped with the new watermark and anchor.
    pub template: Task,
}

/// Expands a recurring template into task instances due between the rule's watermark (or `now`
/// for a rule that never ran) and `now` plus [GENERATION_HORIZON_DAYS]. Returns [None] when the
/// task has no enabled rule.
///
/// The watermark moves to the end of the window and never backwards, so running generation
/// again the same day yields nothing new. It is the start of the window's last day, not the
/// time of the run: a run-time watermark would leave the window end uncovered and regenerate
/// days already created by an earlier run. Rules stored with a run-time watermark still work,
/// since only the date part is read.
pub fn generate(template: &Task, now: DateTime<Utc>) -> Option<Generation> {
    let rule = template.recurring.as_ref().filter(|v| v.enabled)?;

    let window_start = rule.last_generated.unwrap_or(now).date_naive();
    let window_end = (now + Duration::days(GENERATION_HORIZON_DAYS)).date_naive();
    let template_due = template.due_date.map(|v| v.date_naive());

    let mut stamped = rule.clone();
    stamped.starts_on = Some(rule.starts_on.or(template_due).unwrap_or(window_start));

    let due_time = template.due_date.map_or(NaiveTime::MIN, |v| v.time());

    let instances = expand(&stamped, window_start, window_end)
        .into_iter()
        // The template already covers its own due date.
        .filter(|day| Some(*day) != template_due)
        .map(|day| Task {
            id: generate_id(),
            completed: false,
            created_at: now,
            updated_at: now,
            due_date: Some(day.and_time(due_time).and_utc()),
            recurring: None,
            template_id: Some(template.id.clone()),
            ..template.clone()
        })
        .collect::<Vec<_>>();

    let watermark = start_of_day(window_end);
    stamped.last_generated = Some(
        rule.last_generated
            .map_or(watermark, |previous| previous.max(watermark)),
    );

    debug!(
        "Generated {} instances of {} up to {window_end}",
        instances.len(),
        template.id
    );

    Some(Generation {
        instances,
        template: Task {
            recurring: Some(stamped),
            ..template.clone()
        },
    })
}

#[derive(Debug, Default)]
pub struct GenerationRun {
    pub instances: Vec<Task>,
    pub templates: Vec<Task>,
}

/// Runs [generate] for every template in `tasks`, updating templates in place and appending
/// the new instances at the end of the collection.
pub fn generate_all(tasks: &mut Vec<Task>, now: DateTime<Utc>) -> GenerationRun {
    let mut run = GenerationRun::default();
    for task in tasks.iter_mut() {
        let Some(generation) = generate(task, now) else {
            continue;
        };
        *task = generation.template;
        run.templates.push(task.clone());
        run.instances.extend(generation.instances);
    }

    let mut order = tasks.len() as u32;
    for instance in run.instances.iter_mut() {
        instance.order = order;
        order += 1;
    }
    tasks.extend(run.instances.iter().cloned());
    run
}
