//! Key-value persistence of the task collections and user stats.
//!
//! The store is an external collaborator; this module defines its contract,
//! the keys and JSON layout the app uses, and [`PersistenceMirror`], which
//! writes committed state in the background without ever blocking a caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::companion::CompanionTheme;
use crate::error::{CoreError, Result};
use crate::stats::UserStats;
use crate::task::{Difficulty, Task, TaskId, DEFAULT_TASK_POINTS};

pub const TASKS_KEY: &str = "tasks";
pub const COMPLETED_KEY: &str = "completed";
pub const SKIPPED_KEY: &str = "skipped";
pub const USER_STATS_KEY: &str = "userStats";
pub const THEME_KEY: &str = "selectedVisualizationTheme";
pub const NOTIFICATIONS_SCHEDULED_KEY: &str = "notificationsScheduled";

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
}

/// Process-local store, used by tests and as a fallback when no data
/// directory is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

/// Everything the app mirrors to persistence after a state change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub tasks: Vec<Task>,
    pub completed: Vec<Task>,
    pub skipped: Vec<Task>,
    pub user_stats: UserStats,
    /// `None` until a theme has been chosen.
    #[serde(default)]
    pub theme: Option<CompanionTheme>,
}

/// Stored task shape, tolerant of records written by older versions.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: TaskId,
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    points: Option<u32>,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    streak: Option<u32>,
}

impl TaskRecord {
    fn into_task(self, loaded_at: DateTime<Utc>) -> Task {
        Task {
            id: self.id,
            text: self.text,
            completed: self.completed,
            timestamp: self.timestamp.unwrap_or(loaded_at),
            points: self.points.unwrap_or(DEFAULT_TASK_POINTS),
            difficulty: self.difficulty,
            streak: self.streak,
        }
    }
}

async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, %err, "unable to read persisted value");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, %err, "discarding corrupt persisted value");
            None
        }
    }
}

async fn read_tasks(store: &dyn KeyValueStore, key: &str, loaded_at: DateTime<Utc>) -> Vec<Task> {
    read_json::<Vec<TaskRecord>>(store, key)
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|record| record.into_task(loaded_at))
        .collect()
}

/// Stored themes are JSON strings; bare values from older versions are
/// accepted too, and unknown names fall back to the pet.
async fn read_theme(store: &dyn KeyValueStore) -> Option<CompanionTheme> {
    let raw = match store.get(THEME_KEY).await {
        Ok(raw) => raw?,
        Err(err) => {
            warn!(key = THEME_KEY, %err, "unable to read persisted value");
            return None;
        }
    };
    let value = serde_json::from_str::<String>(&raw).unwrap_or_else(|_| raw.trim().to_string());
    Some(CompanionTheme::from_stored(&value))
}

/// Reads the persisted state. Missing or unreadable keys start empty.
pub async fn load_snapshot(store: &dyn KeyValueStore, clock: &dyn Clock) -> StateSnapshot {
    let loaded_at = clock.now();
    let mut user_stats: UserStats = read_json(store, USER_STATS_KEY).await.unwrap_or_default();
    user_stats.reconcile_catalogue();
    let snapshot = StateSnapshot {
        tasks: read_tasks(store, TASKS_KEY, loaded_at).await,
        completed: read_tasks(store, COMPLETED_KEY, loaded_at).await,
        skipped: read_tasks(store, SKIPPED_KEY, loaded_at).await,
        user_stats,
        theme: read_theme(store).await,
    };
    debug!(
        active = snapshot.tasks.len(),
        completed = snapshot.completed.len(),
        skipped = snapshot.skipped.len(),
        "persisted state loaded"
    );
    snapshot
}

/// Writes every key of `snapshot`, attempting all keys even if one fails.
pub async fn save_snapshot(store: &dyn KeyValueStore, snapshot: &StateSnapshot) -> Result<()> {
    let mut entries = vec![
        (TASKS_KEY, serde_json::to_string(&snapshot.tasks)?),
        (COMPLETED_KEY, serde_json::to_string(&snapshot.completed)?),
        (SKIPPED_KEY, serde_json::to_string(&snapshot.skipped)?),
        (USER_STATS_KEY, serde_json::to_string(&snapshot.user_stats)?),
    ];
    if let Some(theme) = snapshot.theme {
        entries.push((THEME_KEY, serde_json::to_string(&theme)?));
    }
    let mut first_error: Option<CoreError> = None;
    for (key, value) in entries {
        if let Err(err) = store.set(key, value).await {
            warn!(key, %err, "persisting value failed");
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Background writer that mirrors the most recently published snapshot.
///
/// Publishing never waits. Snapshots published faster than they can be
/// written are coalesced; the last one always gets written.
pub struct PersistenceMirror {
    sender: watch::Sender<Option<Arc<StateSnapshot>>>,
    worker: JoinHandle<()>,
}

impl PersistenceMirror {
    /// Starts the writer on the current tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (sender, mut receiver) = watch::channel::<Option<Arc<StateSnapshot>>>(None);
        let worker = tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let latest = receiver.borrow_and_update().clone();
                let Some(snapshot) = latest else {
                    continue;
                };
                match save_snapshot(store.as_ref(), &snapshot).await {
                    Ok(()) => debug!(
                        active = snapshot.tasks.len(),
                        completed = snapshot.completed.len(),
                        "state mirrored"
                    ),
                    Err(err) => warn!(%err, "state mirror failed; memory remains authoritative"),
                }
            }
        });
        Self { sender, worker }
    }

    pub fn publish(&self, snapshot: StateSnapshot) {
        self.sender.send_replace(Some(Arc::new(snapshot)));
    }

    /// Stops accepting snapshots and waits until the last one is written.
    pub async fn flush(self) {
        let Self { sender, worker } = self;
        drop(sender);
        if let Err(err) = worker.await {
            warn!(%err, "persistence mirror task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Err(CoreError::persistence(key, "storage offline"))
        }

        async fn set(&self, key: &str, _value: String) -> Result<()> {
            Err(CoreError::persistence(key, "storage offline"))
        }
    }

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn legacy_records_get_defaults() {
        let store = MemoryStore::new();
        store
            .set(TASKS_KEY, r#"[{"id": 1, "text": "Stretch"}]"#.to_string())
            .await
            .unwrap();
        store
            .set(COMPLETED_KEY, r#"[{"id": 2, "text": "Email", "completed": true, "timestamp": 1738576800000}]"#.to_string())
            .await
            .unwrap();

        let clock = clock();
        let snapshot = load_snapshot(&store, &clock).await;

        assert_eq!(snapshot.tasks[0].timestamp, clock.now());
        assert_eq!(snapshot.tasks[0].points, DEFAULT_TASK_POINTS);
        assert_eq!(snapshot.tasks[0].difficulty, Difficulty::Default);
        assert_eq!(snapshot.completed[0].timestamp.timestamp_millis(), 1_738_576_800_000);
        assert!(snapshot.skipped.is_empty());
        assert_eq!(snapshot.user_stats.level, 1);
    }

    #[tokio::test]
    async fn corrupt_values_start_empty() {
        let store = MemoryStore::new();
        store.set(TASKS_KEY, "{not json".to_string()).await.unwrap();
        store.set(USER_STATS_KEY, "[]".to_string()).await.unwrap();

        let snapshot = load_snapshot(&store, &clock()).await;

        assert!(snapshot.tasks.is_empty());
        assert_eq!(snapshot.user_stats, UserStats::default());
    }

    #[tokio::test]
    async fn theme_is_written_only_once_chosen() {
        let store = MemoryStore::new();
        save_snapshot(&store, &StateSnapshot::default()).await.unwrap();
        assert!(store.raw(THEME_KEY).is_none());

        let snapshot = StateSnapshot {
            theme: Some(CompanionTheme::Robot),
            ..StateSnapshot::default()
        };
        save_snapshot(&store, &snapshot).await.unwrap();
        assert_eq!(store.raw(THEME_KEY).as_deref(), Some("\"robot\""));
        assert_eq!(load_snapshot(&store, &clock()).await.theme, Some(CompanionTheme::Robot));
    }

    #[tokio::test]
    async fn bare_theme_values_are_accepted() {
        let store = MemoryStore::new();
        store.set(THEME_KEY, "car".to_string()).await.unwrap();
        assert_eq!(load_snapshot(&store, &clock()).await.theme, Some(CompanionTheme::Car));

        store.set(THEME_KEY, "\"dragon\"".to_string()).await.unwrap();
        assert_eq!(load_snapshot(&store, &clock()).await.theme, Some(CompanionTheme::Pet));
        assert_eq!(load_snapshot(&MemoryStore::new(), &clock()).await.theme, None);
    }

    #[tokio::test]
    async fn unreadable_store_loads_defaults() {
        let snapshot = load_snapshot(&BrokenStore, &clock()).await;
        assert_eq!(snapshot, StateSnapshot::default());
    }

    #[tokio::test]
    async fn save_reports_failure() {
        let err = save_snapshot(&BrokenStore, &StateSnapshot::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Persistence { ref key, .. } if key == TASKS_KEY));
    }

    #[tokio::test]
    async fn mirror_writes_latest_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let mirror = PersistenceMirror::spawn(store.clone());
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap();

        for id in 1..=5 {
            let mut snapshot = StateSnapshot::default();
            snapshot.tasks = (1..=id).map(|n| Task::new(n, "walk", Difficulty::Easy, at)).collect();
            mirror.publish(snapshot);
        }
        mirror.flush().await;

        let stored: Vec<Task> = serde_json::from_str(&store.raw(TASKS_KEY).unwrap()).unwrap();
        assert_eq!(stored.len(), 5);
        assert!(store.raw(USER_STATS_KEY).is_some());
    }

    #[tokio::test]
    async fn mirror_survives_failing_store() {
        let mirror = PersistenceMirror::spawn(Arc::new(BrokenStore));
        mirror.publish(StateSnapshot::default());
        mirror.flush().await;
    }
}
