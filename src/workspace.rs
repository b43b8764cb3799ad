//! Domain operations on top of the stored collections. Every mutation of an [Entity] goes
//! through [DataLayer], which persists the collection and hands the change over to the
//! [OfflineQueue].

use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::TryStreamExt;
use serde_json::json;
use tracing::{debug, error, info, instrument};

use crate::{
    analytics::{
        gamification::{Award, AwardReason, Profile, Progress, PROFILE_KEY},
        report::DailyAnalytics,
        store::{history_between, AnalyticsStorageImpl, AnalyticsStore},
        streak::{combined_streak, longest_streak, streak},
    },
    recurrence::{
        generator::{generate, generate_all, GenerationRun},
        RecurrenceRule,
    },
    storage::{
        cache::LocalCache,
        entities::{
            generate_id, Entity, EntityKind, Habit, Note, PomodoroSession, Priority, Project, Record,
            SessionKind, Task, UserSettings, SETTINGS_KEY,
        },
        kv::{FileKeyValueStore, KeyValueStore},
    },
    sync::{
        queue::{ActionKind, FlushPolicy, OfflineQueue, PendingAction, Submission},
        remote::RemoteStore,
        sync_dir,
    },
    utils::clock::{Clock, DefaultClock},
};

/// What a single collection update did, in the order it should be replicated.
#[derive(Debug)]
pub struct Changes<T> {
    pub created: Vec<T>,
    pub updated: Vec<T>,
    pub deleted: Vec<String>,
}

impl<T> Default for Changes<T> {
    fn default() -> Self {
        Self {
            created: vec![],
            updated: vec![],
            deleted: vec![],
        }
    }
}

/// Local cache plus replication. Collections are always written locally first; the queue
/// decides whether the change is pushed right away or recorded for later.
pub struct DataLayer<S: KeyValueStore> {
    cache: LocalCache<S>,
    queue: OfflineQueue,
    remote: Option<Box<dyn RemoteStore>>,
    clock: Box<dyn Clock>,
}

impl<S: KeyValueStore> DataLayer<S> {
    pub fn new(
        cache: LocalCache<S>,
        queue: OfflineQueue,
        remote: Option<Box<dyn RemoteStore>>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            queue,
            remote,
            clock,
        }
    }

    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.time()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn list<T: Record>(&self) -> Result<Vec<T>> {
        Ok(self.cache.load(T::COLLECTION).await?)
    }

    /// Runs `modify` on the stored collection of `T` and replicates whatever it reports.
    ///
    /// Replication happens under the collection's writer lock, so actions are handed to the
    /// queue in the order the collection was saved. The local save is what counts: an action
    /// that fails to replicate is logged and the rest still go out.
    pub async fn apply<T: Entity>(
        &self,
        modify: impl FnOnce(&mut Vec<T>) -> Changes<T>,
    ) -> Result<Changes<T>> {
        let changes = self
            .cache
            .update_then(T::COLLECTION, modify, |changes| async move {
                self.replicate_changes(&changes).await;
                changes
            })
            .await?;
        Ok(changes)
    }

    async fn replicate_changes<T: Entity>(&self, changes: &Changes<T>) {
        let created = changes
            .created
            .iter()
            .map(|item| (ActionKind::Create, serde_json::to_value(item)));
        let updated = changes
            .updated
            .iter()
            .map(|item| (ActionKind::Update, serde_json::to_value(item)));
        let deleted = changes
            .deleted
            .iter()
            .map(|id| (ActionKind::Delete, Ok(json!({ "id": id }))));

        for (kind, payload) in created.chain(updated).chain(deleted) {
            let result = match payload {
                Ok(payload) => self.replicate(kind, T::KIND, payload).await,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                error!("Failed to replicate {kind:?} of {}: {e:?}", T::KIND);
            }
        }
    }

    /// Appends the items built by `build`, which sees the current collection.
    pub async fn create<T: Entity>(&self, build: impl FnOnce(&[T]) -> Vec<T>) -> Result<Vec<T>> {
        let changes = self
            .apply::<T>(|items| {
                let created = build(items);
                items.extend(created.iter().cloned());
                Changes {
                    created,
                    ..Default::default()
                }
            })
            .await?;
        Ok(changes.created)
    }

    /// Modifies the item with `id`. Returns [None] when there is no such item.
    pub async fn update<T: Entity, R>(
        &self,
        id: &str,
        modify: impl FnOnce(&mut T) -> R,
    ) -> Result<Option<(T, R)>> {
        let now = self.now();
        let mut result = None;
        let changes = self
            .apply::<T>(|items| {
                let mut changes = Changes::default();
                if let Some(item) = items.iter_mut().find(|v| v.id() == id) {
                    result = Some(modify(item));
                    item.touch(now);
                    changes.updated.push(item.clone());
                }
                changes
            })
            .await?;
        Ok(changes.updated.into_iter().next().zip(result))
    }

    pub async fn delete<T: Entity>(&self, id: &str) -> Result<bool> {
        let changes = self
            .apply::<T>(|items| {
                let before = items.len();
                items.retain(|v| v.id() != id);
                Changes {
                    deleted: if items.len() < before {
                        vec![id.to_string()]
                    } else {
                        vec![]
                    },
                    ..Default::default()
                }
            })
            .await?;
        Ok(!changes.deleted.is_empty())
    }

    async fn replicate(
        &self,
        kind: ActionKind,
        entity: EntityKind,
        payload: serde_json::Value,
    ) -> Result<()> {
        let action = PendingAction::new(kind, entity, payload, self.now());
        let id = action.id.clone();
        match self.queue.submit(action, self.remote.as_deref()).await? {
            Submission::Queued => debug!("Queued {kind:?} of {entity} as {id}"),
            Submission::Pushed => debug!("Pushed {kind:?} of {entity}"),
            Submission::LocalOnly => (),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub category: String,
    pub project_id: Option<String>,
    pub parent_id: Option<String>,
    /// Defaults to the priority's points.
    pub points: Option<u32>,
    pub estimated_minutes: Option<u32>,
    pub recurring: Option<RecurrenceRule>,
}

#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub task: Task,
    /// Present the first time the task is completed, when gamification is enabled.
    pub award: Option<Award>,
}

#[derive(Debug, Clone)]
pub struct HabitToggle {
    pub habit: Habit,
    pub completed: bool,
    pub award: Option<Award>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HabitStreak {
    pub habit: Habit,
    pub current: u32,
    pub longest: u32,
}

pub struct Workspace<S: KeyValueStore, A: AnalyticsStore> {
    data: DataLayer<S>,
    analytics: A,
}

impl Workspace<FileKeyValueStore, AnalyticsStorageImpl> {
    /// Opens the workspace stored in the application directory `dir`.
    pub async fn open(
        dir: &Path,
        policy: FlushPolicy,
        remote: Option<Box<dyn RemoteStore>>,
    ) -> Result<Self> {
        let store = FileKeyValueStore::new(dir.join("store"))?;
        let queue = OfflineQueue::open(sync_dir(dir), policy, Box::new(DefaultClock)).await?;
        let analytics = AnalyticsStorageImpl::new(dir.join("analytics"))?;
        let data = DataLayer::new(LocalCache::new(store), queue, remote, Box::new(DefaultClock));
        Ok(Self::new(data, analytics))
    }
}

impl<S: KeyValueStore, A: AnalyticsStore> Workspace<S, A> {
    pub fn new(data: DataLayer<S>, analytics: A) -> Self {
        Self { data, analytics }
    }

    pub fn data(&self) -> &DataLayer<S> {
        &self.data
    }

    /// Creates a task. A task with an enabled recurrence rule becomes a template and its
    /// instances for the upcoming horizon are created along with it.
    ///
    /// Returns the created task first, followed by generated instances.
    #[instrument(skip_all, fields(title = %new.title))]
    pub async fn add_task(&self, new: NewTask) -> Result<Vec<Task>> {
        let now = self.data.now();
        let created = self
            .data
            .create::<Task>(|existing| {
                let task = Task {
                    title: new.title,
                    description: new.description,
                    points: new.points.unwrap_or(new.priority.points()),
                    priority: new.priority,
                    due_date: new.due_date,
                    category: new.category,
                    project_id: new.project_id,
                    parent_id: new.parent_id,
                    estimated_minutes: new.estimated_minutes,
                    recurring: new.recurring,
                    order: existing.len() as u32,
                    ..Task::new("", now)
                };

                let Some(generation) = generate(&task, now) else {
                    return vec![task];
                };
                let mut created = vec![generation.template];
                created.extend(generation.instances);
                for (offset, task) in created.iter_mut().enumerate() {
                    task.order = existing.len() as u32 + offset as u32;
                }
                created
            })
            .await?;

        info!("Created task with {} instances", created.len() - 1);
        Ok(created)
    }

    pub async fn complete_task(&self, id: &str) -> Result<Option<TaskCompletion>> {
        let Some((task, was_completed)) = self
            .data
            .update::<Task, _>(id, |t| std::mem::replace(&mut t.completed, true))
            .await?
        else {
            return Ok(None);
        };

        let award = if was_completed {
            None
        } else {
            self.award(task.points, AwardReason::TaskCompleted).await?
        };
        Ok(Some(TaskCompletion { task, award }))
    }

    pub async fn reopen_task(&self, id: &str) -> Result<Option<Task>> {
        let updated = self
            .data
            .update::<Task, _>(id, |t| t.completed = false)
            .await?;
        Ok(updated.map(|(task, _)| task))
    }

    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        self.data.delete::<Task>(id).await
    }

    /// Generates due instances for every recurring template.
    #[instrument(skip_all)]
    pub async fn run_recurrence(&self) -> Result<GenerationRun> {
        let now = self.data.now();
        let changes = self
            .data
            .apply::<Task>(|tasks| {
                let run = generate_all(tasks, now);
                Changes {
                    created: run.instances,
                    updated: run.templates,
                    deleted: vec![],
                }
            })
            .await?;

        info!(
            "Recurrence run created {} instances from {} templates",
            changes.created.len(),
            changes.updated.len()
        );
        Ok(GenerationRun {
            instances: changes.created,
            templates: changes.updated,
        })
    }

    pub async fn add_habit(
        &self,
        name: String,
        description: Option<String>,
        color: String,
    ) -> Result<Habit> {
        let now = self.data.now();
        let created = self
            .data
            .create::<Habit>(|_| {
                vec![Habit {
                    description,
                    color,
                    ..Habit::new(name, now)
                }]
            })
            .await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Habit was not created"))
    }

    /// Flips the habit's completion for `day`. Completing awards the habit's points.
    pub async fn toggle_habit(&self, id: &str, day: NaiveDate) -> Result<Option<HabitToggle>> {
        let Some((habit, completed)) = self
            .data
            .update::<Habit, _>(id, |h| h.toggle(day))
            .await?
        else {
            return Ok(None);
        };

        let award = if completed {
            self.award(habit.points, AwardReason::HabitCompleted).await?
        } else {
            None
        };
        Ok(Some(HabitToggle {
            habit,
            completed,
            award,
        }))
    }

    pub async fn habit_streaks(&self) -> Result<(Vec<HabitStreak>, u32)> {
        let today = self.data.today();
        let habits = self.data.list::<Habit>().await?;
        let combined = combined_streak(&habits, today);
        let streaks = habits
            .into_iter()
            .map(|habit| HabitStreak {
                current: streak(&habit.completed_dates, today),
                longest: longest_streak(&habit.completed_dates),
                habit,
            })
            .collect();
        Ok((streaks, combined))
    }

    /// Stores a finished pomodoro session that ended now. Sessions are kept locally only.
    pub async fn record_session(
        &self,
        kind: SessionKind,
        minutes: u32,
        task_id: Option<String>,
    ) -> Result<(PomodoroSession, Option<Award>)> {
        let now = self.data.now();
        let session = PomodoroSession {
            id: generate_id(),
            duration_seconds: minutes.saturating_mul(60),
            kind,
            start_time: now - Duration::minutes(minutes as i64),
            end_time: Some(now),
            completed: true,
            task_id,
            points: 0,
        };

        self.data
            .cache()
            .update::<PomodoroSession, _>(PomodoroSession::COLLECTION, |sessions| {
                sessions.insert(0, session.clone())
            })
            .await?;

        let award = match kind {
            SessionKind::Work => self.award(0, AwardReason::SessionCompleted).await?,
            _ => None,
        };
        Ok((session, award))
    }

    pub async fn add_note(
        &self,
        title: String,
        content: String,
        tags: Vec<String>,
        category: String,
    ) -> Result<Note> {
        let now = self.data.now();
        let created = self
            .data
            .create::<Note>(|_| {
                vec![Note {
                    id: generate_id(),
                    title,
                    content,
                    tags,
                    category,
                    created_at: now,
                    updated_at: now,
                    pinned: false,
                }]
            })
            .await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Note was not created"))
    }

    pub async fn add_project(&self, name: String, description: Option<String>) -> Result<Project> {
        let now = self.data.now();
        let created = self
            .data
            .create::<Project>(|_| {
                vec![Project {
                    id: generate_id(),
                    name,
                    description,
                    color: String::new(),
                    status: Default::default(),
                    start_date: Some(now),
                    end_date: None,
                    progress: 0,
                    created_at: now,
                    updated_at: now,
                    points: 0,
                }]
            })
            .await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Project was not created"))
    }

    /// Computes and stores the rollup of `day`, replacing an earlier one.
    pub async fn rollup_day(&self, day: NaiveDate) -> Result<DailyAnalytics> {
        let tasks = self.data.list::<Task>().await?;
        let habits = self.data.list::<Habit>().await?;
        let sessions = self.data.list::<PomodoroSession>().await?;

        let analytics = DailyAnalytics::compute(&tasks, &habits, &sessions, day);
        self.analytics.save_day(&analytics).await?;
        info!(
            "Rolled up {day} with score {}",
            analytics.productivity_score
        );
        Ok(analytics)
    }

    pub async fn rollup_today(&self) -> Result<DailyAnalytics> {
        self.rollup_day(self.data.today()).await
    }

    /// Stored rollups of the last `days` days, today included, oldest first.
    pub async fn history(&self, days: u32) -> Result<Vec<DailyAnalytics>> {
        let end = self.data.today();
        let start = end - Duration::days(days.saturating_sub(1) as i64);
        history_between(&self.analytics, start, end)
            .try_collect()
            .await
    }

    pub async fn settings(&self) -> Result<UserSettings> {
        Ok(self.data.cache().load_value(SETTINGS_KEY).await?)
    }

    pub async fn update_settings(&self, modify: impl FnOnce(&mut UserSettings)) -> Result<UserSettings> {
        Ok(self
            .data
            .cache()
            .update_value::<UserSettings, _>(SETTINGS_KEY, |settings| {
                modify(settings);
                settings.clone()
            })
            .await?)
    }

    pub async fn profile(&self) -> Result<Profile> {
        Ok(self.data.cache().load_value(PROFILE_KEY).await?)
    }

    pub async fn progress(&self) -> Result<Progress> {
        let tasks = self.data.list::<Task>().await?;
        let habits = self.data.list::<Habit>().await?;
        let sessions = self.data.list::<PomodoroSession>().await?;

        Ok(Progress {
            completed_tasks: tasks.iter().filter(|t| t.completed).count() as u32,
            longest_habit_streak: habits
                .iter()
                .map(|h| longest_streak(&h.completed_dates))
                .max()
                .unwrap_or(0),
            total_habit_completions: habits.iter().map(|h| h.total_completions).sum(),
            completed_sessions: sessions
                .iter()
                .filter(|s| s.completed && s.kind == SessionKind::Work)
                .count() as u32,
        })
    }

    async fn award(&self, points: u32, reason: AwardReason) -> Result<Option<Award>> {
        if !self.settings().await?.gamification.enabled {
            return Ok(None);
        }

        let progress = self.progress().await?;
        let now = self.data.now();
        let award = self
            .data
            .cache()
            .update_value::<Profile, _>(PROFILE_KEY, |profile| {
                profile.add_points(points, reason, &progress, now)
            })
            .await?;

        if award.leveled_up {
            info!("Reached level {}", award.level);
        }
        for achievement in &award.unlocked {
            info!("Unlocked achievement {}", achievement.title);
        }
        Ok(Some(award))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::future::join_all;
    use tempfile::{tempdir, TempDir};

    use crate::{
        analytics::store::AnalyticsStorageImpl,
        error::SyncError,
        recurrence::{Frequency, RecurrenceRule},
        storage::{
            cache::LocalCache,
            entities::{EntityKind, Habit, SessionKind, Task},
            kv::FileKeyValueStore,
        },
        sync::{
            queue::{ActionKind, FlushPolicy, OfflineQueue, PendingAction},
            remote::RemoteStore,
        },
        utils::{clock::test_clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{DataLayer, NewTask, Workspace};

    type TestWorkspace = Workspace<FileKeyValueStore, AnalyticsStorageImpl>;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 10, 0, 0).unwrap()
    }

    #[derive(Clone, Default)]
    struct RecordingRemote {
        pushed: Arc<Mutex<Vec<PendingAction>>>,
    }

    #[async_trait]
    impl RemoteStore for RecordingRemote {
        async fn push(&self, actions: &[PendingAction]) -> Result<(), SyncError> {
            self.pushed.lock().unwrap().extend_from_slice(actions);
            Ok(())
        }
    }

    async fn workspace(
        dir: &TempDir,
        clock: &ManualClock,
        remote: Option<RecordingRemote>,
    ) -> Result<TestWorkspace> {
        let store = FileKeyValueStore::new(dir.path().join("store"))?;
        let queue = OfflineQueue::open(
            dir.path().join("sync"),
            FlushPolicy::Outbox,
            Box::new(clock.clone()),
        )
        .await?;
        let analytics = AnalyticsStorageImpl::new(dir.path().join("analytics"))?;
        let data = DataLayer::new(
            LocalCache::new(store),
            queue,
            remote.map(|r| Box::new(r) as Box<dyn RemoteStore>),
            Box::new(clock.clone()),
        );
        Ok(Workspace::new(data, analytics))
    }

    fn titled(title: &str) -> NewTask {
        NewTask {
            title: title.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_offline_mutations_are_queued() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let remote = RecordingRemote::default();
        let workspace = workspace(&dir, &clock, Some(remote.clone())).await?;

        workspace.data().queue().go_offline().await?;
        let task = workspace.add_task(titled("write report")).await?.remove(0);
        workspace.complete_task(&task.id).await?;
        assert!(workspace.delete_task(&task.id).await?);

        let pending = workspace.data().queue().pending().await?;
        assert_eq!(
            pending.iter().map(|a| a.kind).collect::<Vec<_>>(),
            vec![ActionKind::Create, ActionKind::Update, ActionKind::Delete]
        );
        assert!(pending.iter().all(|a| a.entity == EntityKind::Task));
        assert_eq!(pending[2].entity_id(), Some(task.id.as_str()));
        assert!(remote.pushed.lock().unwrap().is_empty());

        workspace.data().queue().go_online(&remote).await?;
        assert_eq!(remote.pushed.lock().unwrap().len(), 3);
        assert!(workspace.data().queue().pending().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_online_mutations_are_pushed() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let remote = RecordingRemote::default();
        let workspace = workspace(&dir, &clock, Some(remote.clone())).await?;

        let habit = workspace
            .add_habit("read".into(), None, "blue".into())
            .await?;

        let pushed = remote.pushed.lock().unwrap().clone();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].entity, EntityKind::Habit);
        assert_eq!(pushed[0].payload["name"], "read");
        assert_eq!(pushed[0].entity_id(), Some(habit.id.as_str()));
        assert!(workspace.data().queue().pending().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_updates_queue_in_save_order() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;
        workspace.data().queue().go_offline().await?;
        let task = workspace.add_task(titled("draft")).await?.remove(0);

        let renames = (0..10).map(|i| {
            workspace
                .data()
                .update::<Task, _>(&task.id, move |t| t.title = format!("draft {i}"))
        });
        for renamed in join_all(renames).await {
            assert!(renamed?.is_some());
        }

        let stored = workspace.data().list::<Task>().await?.remove(0);
        let pending = workspace.data().queue().pending().await?;
        let updates = pending
            .iter()
            .filter(|a| a.kind == ActionKind::Update)
            .collect::<Vec<_>>();
        assert_eq!(updates.len(), 10);
        assert_eq!(
            updates.last().map(|a| a.payload["title"].clone()),
            Some(stored.title.clone().into())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_replication_keeps_local_changes() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;
        workspace.data().queue().go_offline().await?;

        // Nothing can be appended to the queue.
        let queue_file = dir.path().join("sync/pending-actions.jsonl");
        let _ = std::fs::remove_file(&queue_file);
        std::fs::create_dir(&queue_file)?;

        let created = workspace
            .add_task(NewTask {
                title: "standup".into(),
                recurring: Some(RecurrenceRule::new(Frequency::Daily, 1)),
                ..Default::default()
            })
            .await?;
        assert_eq!(created.len(), 31);
        assert_eq!(workspace.data().list::<Task>().await?.len(), 31);

        std::fs::remove_dir(&queue_file)?;
        assert!(workspace.data().queue().pending().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_huge_session_length_saturates() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;

        let (session, _) = workspace
            .record_session(SessionKind::ShortBreak, u32::MAX, None)
            .await?;
        assert_eq!(session.duration_seconds, u32::MAX);
        assert_eq!(session.end_time, Some(start()));
        Ok(())
    }

    #[tokio::test]
    async fn test_recurring_task_generates_instances() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;

        let created = workspace
            .add_task(NewTask {
                title: "standup".into(),
                recurring: Some(RecurrenceRule::new(Frequency::Daily, 1)),
                ..Default::default()
            })
            .await?;
        assert_eq!(created.len(), 31);
        assert!(created[0].is_recurring_template());
        assert!(created[1..]
            .iter()
            .all(|t| t.template_id.as_deref() == Some(created[0].id.as_str())));

        let run = workspace.run_recurrence().await?;
        assert!(run.instances.is_empty());

        clock.advance(Duration::days(1));
        let run = workspace.run_recurrence().await?;
        assert_eq!(run.instances.len(), 1);
        assert_eq!(run.instances[0].order, 31);

        let tasks = workspace.data().list::<Task>().await?;
        assert_eq!(tasks.len(), 32);
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_awards_points_once() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;

        let task = workspace.add_task(titled("ship")).await?.remove(0);
        assert_eq!(task.points, 15);

        let completion = workspace.complete_task(&task.id).await?.unwrap();
        let award = completion.award.unwrap();
        // 15 for the task and 10 for the first-task achievement.
        assert_eq!(award.total_points, 25);
        assert!(completion.task.completed);

        let completion = workspace.complete_task(&task.id).await?.unwrap();
        assert!(completion.award.is_none());

        workspace.reopen_task(&task.id).await?;
        assert_eq!(workspace.profile().await?.total_points, 25);
        assert!(workspace.complete_task("missing").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_gamification_awards_nothing() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;
        workspace
            .update_settings(|s| s.gamification.enabled = false)
            .await?;

        let task = workspace.add_task(titled("ship")).await?.remove(0);
        let completion = workspace.complete_task(&task.id).await?.unwrap();
        assert!(completion.award.is_none());
        assert_eq!(workspace.profile().await?.total_points, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_habits_and_rollup() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new(start());
        let workspace = workspace(&dir, &clock, None).await?;

        let habit = workspace
            .add_habit("walk".into(), None, String::new())
            .await?;
        for _ in 0..3 {
            let today = workspace.data().today();
            let toggle = workspace.toggle_habit(&habit.id, today).await?.unwrap();
            assert!(toggle.completed);
            clock.advance(Duration::days(1));
        }
        clock.advance(Duration::days(-1));

        let (streaks, combined) = workspace.habit_streaks().await?;
        assert_eq!(streaks[0].current, 3);
        assert_eq!(streaks[0].longest, 3);
        assert_eq!(combined, 3);

        let task = workspace
            .add_task(NewTask {
                category: "work".into(),
                ..titled("ship")
            })
            .await?
            .remove(0);
        workspace.complete_task(&task.id).await?;
        workspace
            .record_session(SessionKind::Work, 120, Some(task.id.clone()))
            .await?;

        let rollup = workspace.rollup_today().await?;
        assert_eq!(rollup.tasks_completed, 1);
        assert_eq!(rollup.habits_completed, 1);
        assert_eq!(rollup.total_focus_time, 120.);
        assert_eq!(rollup.productivity_score, 100);
        assert_eq!(rollup.categories_worked, vec!["work".to_string()]);

        let history = workspace.history(7).await?;
        assert_eq!(history, vec![rollup]);

        let today = workspace.data().today();
        let toggle = workspace.toggle_habit(&habit.id, today).await?.unwrap();
        assert!(!toggle.completed);
        assert!(toggle.award.is_none());
        assert_eq!(
            workspace.data().list::<Habit>().await?[0].total_completions,
            2
        );
        Ok(())
    }
}
