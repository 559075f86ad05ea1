//! In-memory task collections and the reducer that mutates them.
//!
//! Every change goes through [`TaskStore::dispatch`]; the named operations
//! are thin wrappers that build the matching [`Action`]. A task id lives in
//! at most one of the active, completed and skipped lists.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::companion::CompanionTheme;
use crate::gamification::{CompletionReport, GamificationEngine};
use crate::mood::MoodBreakdown;
use crate::persistence::StateSnapshot;
use crate::stats::UserStats;
use crate::task::{Difficulty, Task, TaskId};

/// Completed tasks older than this are purged by cleanup.
pub const COMPLETED_RETENTION_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add { text: String, difficulty: Difficulty },
    Complete(TaskId),
    Restore(TaskId),
    Delete(TaskId),
    Skip(TaskId),
    CleanupExpired,
    SetCompanionName { theme: CompanionTheme, name: String },
    SetTheme(CompanionTheme),
    Hydrate(StateSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Added(Task),
    Completed(CompletionReport),
    Restored(Task),
    Deleted(Task),
    Skipped(Task),
    Purged(Vec<TaskId>),
    Renamed,
    ThemeChanged(CompanionTheme),
    Hydrated,
    NotFound(TaskId),
    Unchanged,
}

impl Outcome {
    /// Whether the transition changed state and needs mirroring.
    pub fn changed(&self) -> bool {
        !matches!(self, Outcome::NotFound(_) | Outcome::Unchanged)
    }
}

#[derive(Debug, Default)]
pub struct TaskStore {
    active: Vec<Task>,
    completed: Vec<Task>,
    skipped: Vec<Task>,
    engine: GamificationEngine,
    theme: Option<CompanionTheme>,
    last_issued_id: TaskId,
    revision: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StateSnapshot, clock: &dyn Clock) -> Self {
        let mut store = Self::new();
        store.hydrate(snapshot, clock);
        store
    }

    pub fn active(&self) -> &[Task] {
        &self.active
    }

    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    pub fn skipped(&self) -> &[Task] {
        &self.skipped
    }

    pub fn stats(&self) -> &UserStats {
        self.engine.stats()
    }

    /// Incremented on every state-changing transition.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            tasks: self.active.clone(),
            completed: self.completed.clone(),
            skipped: self.skipped.clone(),
            user_stats: self.engine.stats().clone(),
            theme: self.theme,
        }
    }

    /// The chosen theme, `None` until one has been picked.
    pub fn theme(&self) -> Option<CompanionTheme> {
        self.theme
    }

    pub fn mood(&self, now: DateTime<Utc>) -> MoodBreakdown {
        MoodBreakdown::from_tasks(&self.active, &self.completed, now)
    }

    pub fn dispatch(&mut self, action: Action, clock: &dyn Clock) -> Outcome {
        let outcome = match action {
            Action::Add { text, difficulty } => Outcome::Added(self.insert_task(text, difficulty, clock)),
            Action::Complete(id) => self.apply_complete(id, clock),
            Action::Restore(id) => self.apply_restore(id),
            Action::Delete(id) => self.apply_delete(id),
            Action::Skip(id) => self.apply_skip(id, clock),
            Action::CleanupExpired => self.apply_cleanup(clock.now()),
            Action::SetCompanionName { theme, name } => self.apply_rename(theme, name),
            Action::SetTheme(theme) => self.apply_theme(theme),
            Action::Hydrate(snapshot) => self.apply_hydrate(snapshot),
        };
        if outcome.changed() {
            self.revision += 1;
        }
        if let Outcome::NotFound(id) = outcome {
            debug!(id, "task not found; nothing to do");
        }
        outcome
    }

    pub fn add_task(&mut self, text: impl Into<String>, difficulty: Option<Difficulty>, clock: &dyn Clock) -> Task {
        let action = Action::Add {
            text: text.into(),
            difficulty: difficulty.unwrap_or_default(),
        };
        let Outcome::Added(task) = self.dispatch(action, clock) else {
            unreachable!("adding a task always yields Outcome::Added");
        };
        task
    }

    pub fn complete_task(&mut self, id: TaskId, clock: &dyn Clock) -> Option<CompletionReport> {
        match self.dispatch(Action::Complete(id), clock) {
            Outcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn restore_task(&mut self, id: TaskId, clock: &dyn Clock) -> Option<Task> {
        match self.dispatch(Action::Restore(id), clock) {
            Outcome::Restored(task) => Some(task),
            _ => None,
        }
    }

    pub fn delete_task(&mut self, id: TaskId, clock: &dyn Clock) -> Option<Task> {
        match self.dispatch(Action::Delete(id), clock) {
            Outcome::Deleted(task) => Some(task),
            _ => None,
        }
    }

    pub fn skip_task(&mut self, id: TaskId, clock: &dyn Clock) -> Option<Task> {
        match self.dispatch(Action::Skip(id), clock) {
            Outcome::Skipped(task) => Some(task),
            _ => None,
        }
    }

    /// Removes completed tasks older than the retention window as of `clock.now()`.
    pub fn cleanup_expired(&mut self, clock: &dyn Clock) -> Vec<TaskId> {
        match self.dispatch(Action::CleanupExpired, clock) {
            Outcome::Purged(ids) => ids,
            _ => Vec::new(),
        }
    }

    pub fn set_companion_name(&mut self, theme: CompanionTheme, name: impl Into<String>, clock: &dyn Clock) {
        self.dispatch(
            Action::SetCompanionName {
                theme,
                name: name.into(),
            },
            clock,
        );
    }

    pub fn hydrate(&mut self, snapshot: StateSnapshot, clock: &dyn Clock) {
        self.dispatch(Action::Hydrate(snapshot), clock);
    }
}

impl TaskStore {
    fn next_id(&mut self, now: DateTime<Utc>) -> TaskId {
        let candidate = now.timestamp_millis();
        let id = if candidate > self.last_issued_id {
            candidate
        } else {
            self.last_issued_id + 1
        };
        self.last_issued_id = id;
        id
    }

    fn insert_task(&mut self, text: String, difficulty: Difficulty, clock: &dyn Clock) -> Task {
        let now = clock.now();
        let id = self.next_id(now);
        let task = Task::new(id, text, difficulty, now);
        info!(id, ?difficulty, points = task.points, "task added");
        self.active.push(task.clone());
        task
    }

    fn apply_complete(&mut self, id: TaskId, clock: &dyn Clock) -> Outcome {
        let Some(index) = self.active.iter().position(|task| task.id == id) else {
            return Outcome::NotFound(id);
        };
        let mut task = self.active.remove(index);
        task.completed = true;
        task.timestamp = clock.now();

        let report = self.engine.record_completion(&task, &self.completed, clock);
        self.completed.push(task);
        info!(
            id,
            points = self.engine.stats().points,
            level = self.engine.stats().level,
            streak = report.streak_days,
            unlocked = report.unlocked.len(),
            "task completed"
        );
        Outcome::Completed(report)
    }

    fn apply_restore(&mut self, id: TaskId) -> Outcome {
        let Some(index) = self.completed.iter().position(|task| task.id == id) else {
            return Outcome::NotFound(id);
        };
        let mut task = self.completed.remove(index);
        task.completed = false;
        self.active.push(task.clone());
        info!(id, "task restored");
        Outcome::Restored(task)
    }

    fn apply_delete(&mut self, id: TaskId) -> Outcome {
        let Some(index) = self.completed.iter().position(|task| task.id == id) else {
            return Outcome::NotFound(id);
        };
        let task = self.completed.remove(index);
        info!(id, "completed task deleted");
        Outcome::Deleted(task)
    }

    fn apply_skip(&mut self, id: TaskId, clock: &dyn Clock) -> Outcome {
        let Some(index) = self.active.iter().position(|task| task.id == id) else {
            return Outcome::NotFound(id);
        };
        let mut task = self.active.remove(index);
        task.timestamp = clock.now();
        self.skipped.push(task.clone());
        info!(id, "task skipped");
        Outcome::Skipped(task)
    }

    fn apply_cleanup(&mut self, now: DateTime<Utc>) -> Outcome {
        let retention = Duration::minutes(COMPLETED_RETENTION_MINUTES);
        let mut purged = Vec::new();
        self.completed.retain(|task| {
            let expired = now.signed_duration_since(task.timestamp) > retention;
            if expired {
                purged.push(task.id);
            }
            !expired
        });
        if purged.is_empty() {
            return Outcome::Unchanged;
        }
        info!(count = purged.len(), "expired completed tasks purged");
        Outcome::Purged(purged)
    }

    fn apply_rename(&mut self, theme: CompanionTheme, name: String) -> Outcome {
        let name = name.trim().to_string();
        if name.is_empty() || self.engine.stats().companion_name(theme) == name {
            return Outcome::Unchanged;
        }
        info!(%theme, name = %name, "companion renamed");
        self.engine.stats_mut().set_companion_name(theme, name);
        Outcome::Renamed
    }

    fn apply_theme(&mut self, theme: CompanionTheme) -> Outcome {
        if self.theme == Some(theme) {
            return Outcome::Unchanged;
        }
        info!(%theme, "theme selected");
        self.theme = Some(theme);
        Outcome::ThemeChanged(theme)
    }

    fn apply_hydrate(&mut self, snapshot: StateSnapshot) -> Outcome {
        let StateSnapshot {
            tasks,
            completed,
            skipped,
            mut user_stats,
            theme,
        } = snapshot;
        user_stats.reconcile_catalogue();

        let mut seen = std::collections::HashSet::new();
        let mut keep_unique = |list: Vec<Task>, collection: &'static str| -> Vec<Task> {
            list.into_iter()
                .filter(|task| {
                    let fresh = seen.insert(task.id);
                    if !fresh {
                        debug!(id = task.id, collection, "dropping duplicate task id");
                    }
                    fresh
                })
                .collect()
        };
        self.active = keep_unique(tasks, "tasks");
        self.completed = keep_unique(completed, "completed");
        self.skipped = keep_unique(skipped, "skipped");
        self.last_issued_id = seen.into_iter().max().unwrap_or(0).max(self.last_issued_id);
        self.engine = GamificationEngine::new(user_stats);
        self.theme = theme;
        Outcome::Hydrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::stats::AchievementId;
    use chrono::TimeZone;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 8, 4, 9, 0, 0).unwrap())
    }

    fn total(store: &TaskStore) -> usize {
        store.active().len() + store.completed().len() + store.skipped().len()
    }

    #[test]
    fn ids_are_unique_within_a_millisecond() {
        let clock = clock();
        let mut store = TaskStore::new();
        let a = store.add_task("one", None, &clock);
        let b = store.add_task("two", Some(Difficulty::Hard), &clock);
        assert_ne!(a.id, b.id);
        assert_eq!(b.id, a.id + 1);
        assert_eq!(b.points, 30);
        assert!(!a.completed);
    }

    #[test]
    fn complete_moves_task_and_awards_points() {
        let clock = clock();
        let mut store = TaskStore::new();
        let task = store.add_task("Call Mom", Some(Difficulty::Medium), &clock);
        clock.advance(Duration::minutes(5));

        let report = store.complete_task(task.id, &clock).unwrap();

        assert!(store.active().is_empty());
        let done = &store.completed()[0];
        assert!(done.completed);
        assert_eq!(done.timestamp, clock.now());
        assert_eq!(store.stats().points, 20);
        assert_eq!(report.unlocked, vec![AchievementId::GETTING_STARTED]);
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let clock = clock();
        let mut store = TaskStore::new();
        store.add_task("keep", None, &clock);
        let revision = store.revision();

        assert_eq!(store.dispatch(Action::Complete(404), &clock), Outcome::NotFound(404));
        assert!(store.restore_task(404, &clock).is_none());
        assert!(store.delete_task(404, &clock).is_none());
        assert!(store.skip_task(404, &clock).is_none());
        assert_eq!(store.revision(), revision);
        assert_eq!(store.stats().points, 0);
    }

    #[test]
    fn complete_then_restore_round_trips() {
        let clock = clock();
        let mut store = TaskStore::new();
        let original = store.add_task("Stretch", Some(Difficulty::Easy), &clock);
        store.add_task("Other", None, &clock);
        let before = total(&store);

        let report = store.complete_task(original.id, &clock).unwrap();
        assert_eq!(total(&store), before);
        let restored = store.restore_task(report.task_id, &clock).unwrap();

        let mut expected = original.clone();
        expected.timestamp = restored.timestamp;
        assert_eq!(restored, expected);
        assert!(store.active().iter().any(|t| t.id == original.id));
        assert!(store.completed().is_empty());
        assert_eq!(total(&store), before);
    }

    #[test]
    fn restore_keeps_completion_timestamp() {
        let clock = clock();
        let mut store = TaskStore::new();
        let task = store.add_task("Read", None, &clock);
        clock.advance(Duration::minutes(30));
        store.complete_task(task.id, &clock);
        let completed_at = clock.now();
        clock.advance(Duration::minutes(10));

        let restored = store.restore_task(task.id, &clock).unwrap();
        assert_eq!(restored.timestamp, completed_at);
        assert!(!restored.completed);
    }

    #[test]
    fn delete_removes_one_completed_task() {
        let clock = clock();
        let mut store = TaskStore::new();
        let a = store.add_task("a", None, &clock);
        store.add_task("b", None, &clock);
        store.complete_task(a.id, &clock);
        let before = total(&store);

        assert!(store.delete_task(a.id, &clock).is_some());
        assert_eq!(total(&store), before - 1);
        assert!(store.delete_task(a.id, &clock).is_none());
    }

    #[test]
    fn delete_only_touches_completed() {
        let clock = clock();
        let mut store = TaskStore::new();
        let a = store.add_task("active", None, &clock);
        assert!(store.delete_task(a.id, &clock).is_none());
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn skip_moves_active_task_to_skipped() {
        let clock = clock();
        let mut store = TaskStore::new();
        let a = store.add_task("Skip me", None, &clock);
        let before = total(&store);
        clock.advance(Duration::minutes(3));

        let skipped = store.skip_task(a.id, &clock).unwrap();

        assert!(store.active().is_empty());
        assert_eq!(store.skipped()[0].id, a.id);
        assert_eq!(skipped.timestamp, clock.now());
        assert_eq!(total(&store), before);
        assert!(store.complete_task(a.id, &clock).is_none());
    }

    #[test]
    fn cleanup_purges_only_expired_and_is_idempotent() {
        let clock = clock();
        let mut store = TaskStore::new();
        let old = store.add_task("old", None, &clock);
        let fresh = store.add_task("fresh", None, &clock);
        store.complete_task(old.id, &clock);
        clock.advance(Duration::minutes(30));
        store.complete_task(fresh.id, &clock);
        clock.advance(Duration::minutes(31));

        assert_eq!(store.cleanup_expired(&clock), vec![old.id]);
        let revision = store.revision();
        assert!(store.cleanup_expired(&clock).is_empty());
        assert_eq!(store.revision(), revision);
        assert_eq!(store.completed().len(), 1);
        assert_eq!(store.completed()[0].id, fresh.id);
    }

    #[test]
    fn cleanup_keeps_tasks_at_exactly_one_hour() {
        let clock = clock();
        let mut store = TaskStore::new();
        let task = store.add_task("edge", None, &clock);
        store.complete_task(task.id, &clock);
        clock.advance(Duration::minutes(COMPLETED_RETENTION_MINUTES));
        assert_eq!(store.dispatch(Action::CleanupExpired, &clock), Outcome::Unchanged);
    }

    #[test]
    fn hydrate_drops_duplicate_ids_and_continues_id_sequence() {
        let clock = clock();
        let at = clock.now() + Duration::days(1);
        let snapshot = StateSnapshot {
            tasks: vec![Task::new(at.timestamp_millis(), "future", Difficulty::Default, at)],
            completed: vec![Task::new(at.timestamp_millis(), "dup", Difficulty::Default, at)],
            skipped: Vec::new(),
            user_stats: UserStats::default(),
            theme: Some(CompanionTheme::Car),
        };
        let mut store = TaskStore::from_snapshot(snapshot, &clock);

        assert_eq!(store.active().len(), 1);
        assert!(store.completed().is_empty());
        assert_eq!(store.theme(), Some(CompanionTheme::Car));
        let next = store.add_task("next", None, &clock);
        assert_eq!(next.id, at.timestamp_millis() + 1);
    }

    #[test]
    fn theme_changes_are_committed_once() {
        let clock = clock();
        let mut store = TaskStore::new();
        assert_eq!(store.theme(), None);

        assert_eq!(
            store.dispatch(Action::SetTheme(CompanionTheme::Robot), &clock),
            Outcome::ThemeChanged(CompanionTheme::Robot)
        );
        let revision = store.revision();
        assert_eq!(
            store.dispatch(Action::SetTheme(CompanionTheme::Robot), &clock),
            Outcome::Unchanged
        );
        assert_eq!(store.revision(), revision);
        assert_eq!(store.snapshot().theme, Some(CompanionTheme::Robot));
    }

    #[test]
    fn named_operations_share_the_dispatch_revision() {
        let clock = clock();
        let mut store = TaskStore::new();

        let task = store.add_task("walk", None, &clock);
        assert_eq!(store.revision(), 1);
        store.complete_task(task.id, &clock);
        assert_eq!(store.revision(), 2);

        assert!(store.cleanup_expired(&clock).is_empty());
        assert_eq!(store.revision(), 2);
        clock.advance(Duration::hours(2));
        assert_eq!(store.cleanup_expired(&clock), vec![task.id]);
        assert_eq!(store.revision(), 3);

        store.hydrate(StateSnapshot::default(), &clock);
        assert_eq!(store.revision(), 4);
        assert!(store.completed().is_empty());
    }

    #[test]
    fn rename_ignores_blank_names() {
        let clock = clock();
        let mut store = TaskStore::new();
        store.set_companion_name(CompanionTheme::Robot, "  Volt ", &clock);
        assert_eq!(store.stats().robot_name, "Volt");
        let revision = store.revision();
        store.set_companion_name(CompanionTheme::Robot, "   ", &clock);
        assert_eq!(store.stats().robot_name, "Volt");
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn mood_reflects_collections() {
        let clock = clock();
        let mut store = TaskStore::new();
        assert_eq!(store.mood(clock.now()).mood, crate::mood::Mood::Happy);
        let ids: Vec<TaskId> = (0..10).map(|n| store.add_task(format!("t{n}"), None, &clock).id).collect();
        for id in &ids[..3] {
            store.complete_task(*id, &clock);
        }
        let mood = store.mood(clock.now());
        assert_eq!(mood.total_tasks, 10);
        assert_eq!(mood.recent_completions, 3);
        assert!((mood.final_score - 60.0).abs() < 1e-9);
        assert_eq!(mood.mood, crate::mood::Mood::Happy);
    }
}
