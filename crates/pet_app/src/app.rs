//! Host-side controller: the entry points a rendering layer calls.
//!
//! [`PetApp`] owns the task store behind one lock, mirrors every committed
//! change to persistence, runs the cleanup timer and talks to the reminder
//! scheduler. Reminder work runs on the tokio runtime the app was started
//! on, so the synchronous entry points can be called from any thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pet_core::error::Result as CoreResult;
use pet_core::notifications::{daily_check_ins, ReminderTrigger};
use pet_core::persistence::{load_snapshot, NOTIFICATIONS_SCHEDULED_KEY};
use pet_core::recurrence::{self, Recurrence};
use pet_core::stats::UserStats;
use pet_core::{
    Action, Clock, CompanionTheme, CompletionReport, Difficulty, KeyValueStore, MemoryStore,
    MoodBreakdown, Outcome, PermissionStatus, PersistenceMirror, ReminderRequest,
    ReminderScheduler, StateSnapshot, SystemClock, Task, TaskId, TaskStore,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::AppConfig;
use crate::file_store::FileStore;

pub const PERMISSION_ADVISORY: &str =
    "Notifications are disabled. Enable them in settings to get task reminders.";

/// Message the UI should show once, e.g. after reminder permission was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    pub message: &'static str,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum AdvisoryState {
    #[default]
    Quiet,
    Pending,
    Shown,
}

#[derive(Debug, Default)]
struct AdvisoryLatch {
    state: Mutex<AdvisoryState>,
}

impl AdvisoryLatch {
    fn raise(&self) {
        let mut state = self.state.lock();
        if *state == AdvisoryState::Quiet {
            *state = AdvisoryState::Pending;
        }
    }

    fn take(&self) -> Option<Advisory> {
        let mut state = self.state.lock();
        if *state != AdvisoryState::Pending {
            return None;
        }
        *state = AdvisoryState::Shown;
        Some(Advisory {
            message: PERMISSION_ADVISORY,
        })
    }
}

/// Scheduler for hosts without a platform notification service: grants
/// permission and logs every reminder it is asked to register.
#[derive(Debug, Default)]
pub struct LoggingScheduler {
    issued: AtomicU64,
}

#[async_trait]
impl ReminderScheduler for LoggingScheduler {
    async fn permission_status(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn schedule(&self, request: ReminderRequest) -> CoreResult<String> {
        let id = format!("reminder-{}", self.issued.fetch_add(1, Ordering::Relaxed) + 1);
        match request.trigger {
            ReminderTrigger::Weekly {
                weekday,
                hour,
                minute,
                ..
            } => info!(id = %id, title = %request.title, body = %request.body, weekday, hour, minute, "weekly reminder"),
            ReminderTrigger::Daily { hour, minute, .. } => {
                info!(id = %id, title = %request.title, body = %request.body, hour, minute, "daily reminder")
            }
        }
        Ok(id)
    }

    async fn cancel_all(&self) -> CoreResult<()> {
        info!("all reminders cancelled");
        Ok(())
    }
}

pub struct PetAppBuilder {
    config: AppConfig,
    clock: Option<Arc<dyn Clock>>,
    backend: Option<Arc<dyn KeyValueStore>>,
    scheduler: Option<Arc<dyn ReminderScheduler>>,
}

impl PetAppBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            clock: None,
            backend: None,
            scheduler: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Overrides the store otherwise picked from `AppConfig::data_dir`.
    pub fn with_backend(mut self, backend: Arc<dyn KeyValueStore>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn ReminderScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Loads persisted state and starts the persistence mirror on the
    /// current tokio runtime.
    pub async fn start(self) -> Result<Arc<PetApp>> {
        let backend: Arc<dyn KeyValueStore> = match (self.backend, &self.config.data_dir) {
            (Some(backend), _) => backend,
            (None, Some(dir)) => Arc::new(FileStore::open(dir).await?),
            (None, None) => {
                info!("no data directory configured; state will not survive restarts");
                Arc::new(MemoryStore::new())
            }
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(LoggingScheduler::default()));

        let snapshot = load_snapshot(backend.as_ref(), clock.as_ref()).await;
        let store = TaskStore::from_snapshot(snapshot, clock.as_ref());
        let theme = store.theme().unwrap_or(self.config.theme);
        info!(
            active = store.active().len(),
            completed = store.completed().len(),
            level = store.stats().level,
            %theme,
            "companion state loaded"
        );

        Ok(Arc::new(PetApp {
            runtime: Handle::current(),
            mirror: Mutex::new(Some(PersistenceMirror::spawn(backend.clone()))),
            config: self.config,
            clock,
            backend,
            scheduler,
            store: Mutex::new(store),
            advisory: Arc::new(AdvisoryLatch::default()),
            background: Mutex::new(Vec::new()),
        }))
    }
}

pub struct PetApp {
    config: AppConfig,
    runtime: Handle,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn KeyValueStore>,
    scheduler: Arc<dyn ReminderScheduler>,
    store: Mutex<TaskStore>,
    mirror: Mutex<Option<PersistenceMirror>>,
    advisory: Arc<AdvisoryLatch>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl PetApp {
    pub fn builder(config: AppConfig) -> PetAppBuilder {
        PetAppBuilder::new(config)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Adds a task. Blank text is ignored. A weekly phrase such as
    /// `Walk dog every Monday at 6pm` also registers a repeating reminder.
    #[instrument(skip(self))]
    pub fn add_task(&self, text: &str, difficulty: Option<Difficulty>) -> Option<Task> {
        if text.trim().is_empty() {
            debug!("ignoring blank task text");
            return None;
        }
        let action = Action::Add {
            text: text.to_string(),
            difficulty: difficulty.unwrap_or_default(),
        };
        let Outcome::Added(task) = self.commit(action) else {
            return None;
        };
        if let Some(recurrence) = recurrence::parse(&task.text) {
            self.spawn_background(schedule_weekly(
                self.scheduler.clone(),
                self.advisory.clone(),
                recurrence,
            ));
        }
        Some(task)
    }

    #[instrument(skip(self))]
    pub fn complete_task(&self, id: TaskId) -> Option<CompletionReport> {
        match self.commit(Action::Complete(id)) {
            Outcome::Completed(report) => {
                if let Some(level) = report.level_up {
                    info!(level, "level up");
                }
                Some(report)
            }
            _ => None,
        }
    }

    #[instrument(skip(self))]
    pub fn restore_task(&self, id: TaskId) -> Option<Task> {
        match self.commit(Action::Restore(id)) {
            Outcome::Restored(task) => Some(task),
            _ => None,
        }
    }

    #[instrument(skip(self))]
    pub fn delete_task(&self, id: TaskId) -> Option<Task> {
        match self.commit(Action::Delete(id)) {
            Outcome::Deleted(task) => Some(task),
            _ => None,
        }
    }

    #[instrument(skip(self))]
    pub fn skip_task(&self, id: TaskId) -> Option<Task> {
        match self.commit(Action::Skip(id)) {
            Outcome::Skipped(task) => Some(task),
            _ => None,
        }
    }

    pub fn cleanup_expired(&self) -> Vec<TaskId> {
        match self.commit(Action::CleanupExpired) {
            Outcome::Purged(ids) => ids,
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.store.lock().snapshot()
    }

    pub fn stats(&self) -> UserStats {
        self.store.lock().stats().clone()
    }

    /// Recomputed on every call so the recent-activity boost decays.
    pub fn mood(&self) -> MoodBreakdown {
        self.store.lock().mood(self.clock.now())
    }

    pub fn mood_explanation(&self) -> String {
        let name = self.companion_name();
        self.mood().explain(&name)
    }

    /// The chosen theme, or the configured one until the user picks.
    pub fn theme(&self) -> CompanionTheme {
        self.store.lock().theme().unwrap_or(self.config.theme)
    }

    /// Selects a theme. The choice is mirrored with the rest of the state.
    #[instrument(skip(self))]
    pub fn set_theme(&self, theme: CompanionTheme) {
        self.commit(Action::SetTheme(theme));
    }

    pub fn companion_name(&self) -> String {
        let store = self.store.lock();
        let theme = store.theme().unwrap_or(self.config.theme);
        store.stats().companion_name(theme).to_string()
    }

    #[instrument(skip(self))]
    pub fn rename_companion(&self, name: &str) {
        self.commit(Action::SetCompanionName {
            theme: self.theme(),
            name: name.to_string(),
        });
    }

    /// Renames the current companion from the theme's name pool.
    pub fn randomize_companion_name(&self) -> String {
        let theme = self.theme();
        let name = theme.random_name(&mut rand::thread_rng()).to_string();
        self.rename_companion(&name);
        name
    }

    /// Returns the pending advisory once; later calls yield `None`.
    pub fn take_advisory(&self) -> Option<Advisory> {
        self.advisory.take()
    }

    /// Starts the periodic purge of aged completed tasks. The first run is
    /// immediate. Abort the handle to stop it.
    pub fn start_cleanup(self: &Arc<Self>) -> JoinHandle<()> {
        let app: Weak<Self> = Arc::downgrade(self);
        let period = self.config.cleanup_interval;
        info!(period_secs = period.as_secs(), "cleanup timer started");
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(app) = app.upgrade() else {
                    break;
                };
                let purged = app.cleanup_expired();
                if !purged.is_empty() {
                    debug!(count = purged.len(), "cleanup tick purged tasks");
                }
            }
        })
    }

    /// Schedules the morning and evening check-ins the first time it runs
    /// with permission granted. Returns whether anything was scheduled.
    #[instrument(skip(self))]
    pub async fn schedule_daily_check_ins(&self) -> Result<bool> {
        let flag = self
            .backend
            .get(NOTIFICATIONS_SCHEDULED_KEY)
            .await
            .context("reading daily reminder flag")?;
        if flag.as_deref().map(str::trim) == Some("true") {
            debug!("daily reminders already scheduled");
            return Ok(false);
        }
        if !ensure_permission(self.scheduler.as_ref()).await {
            warn!("reminder permission refused; daily reminders skipped");
            self.advisory.raise();
            return Ok(false);
        }

        self.scheduler
            .cancel_all()
            .await
            .context("cancelling existing reminders")?;
        let requests = {
            let mut rng = rand::thread_rng();
            daily_check_ins(
                self.config.morning_reminder,
                self.config.evening_reminder,
                &mut rng,
            )
        };
        for request in requests {
            let title = request.title.clone();
            let id = self
                .scheduler
                .schedule(request)
                .await
                .with_context(|| format!("scheduling `{title}`"))?;
            info!(id = %id, title = %title, "daily reminder scheduled");
        }
        self.backend
            .set(NOTIFICATIONS_SCHEDULED_KEY, "true".to_string())
            .await
            .context("recording daily reminder flag")?;
        Ok(true)
    }

    /// Waits for outstanding reminder jobs.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.background.lock());
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(err) = handle.await {
                    warn!(%err, "background job ended abnormally");
                }
            }
        }
    }

    /// Settles background work and writes the latest state. Later changes
    /// are kept in memory only.
    pub async fn shutdown(&self) {
        self.settle().await;
        let mirror = self.mirror.lock().take();
        if let Some(mirror) = mirror {
            mirror.flush().await;
        }
        info!("companion state flushed");
    }
}

impl PetApp {
    /// Applies `action` and, if it changed anything, publishes the new
    /// snapshot while still holding the store lock so snapshots reach the
    /// mirror in commit order.
    fn commit(&self, action: Action) -> Outcome {
        let mut store = self.store.lock();
        let outcome = store.dispatch(action, self.clock.as_ref());
        if outcome.changed() {
            match self.mirror.lock().as_ref() {
                Some(mirror) => mirror.publish(store.snapshot()),
                None => debug!(revision = store.revision(), "app shut down; change kept in memory"),
            }
        }
        outcome
    }

    fn spawn_background<F>(&self, job: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = self.runtime.spawn(job);
        let mut background = self.background.lock();
        background.retain(|pending| !pending.is_finished());
        background.push(handle);
    }
}

async fn ensure_permission(scheduler: &dyn ReminderScheduler) -> bool {
    if scheduler.permission_status().await == PermissionStatus::Granted {
        return true;
    }
    scheduler.request_permission().await == PermissionStatus::Granted
}

async fn schedule_weekly(
    scheduler: Arc<dyn ReminderScheduler>,
    advisory: Arc<AdvisoryLatch>,
    recurrence: Recurrence,
) {
    if !ensure_permission(scheduler.as_ref()).await {
        warn!(description = %recurrence.description, "reminder permission refused");
        advisory.raise();
        return;
    }
    match scheduler.schedule(ReminderRequest::weekly(&recurrence)).await {
        Ok(id) => info!(
            id = %id,
            description = %recurrence.description,
            weekday = recurrence.weekday,
            hour = recurrence.hour,
            "weekly reminder scheduled"
        ),
        Err(err) => warn!(%err, "weekly reminder scheduling failed"),
    }
}

/// Runs the companion until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<()> {
    let app = PetApp::builder(config).start().await?;
    let cleanup = app.start_cleanup();

    if let Err(err) = app.schedule_daily_check_ins().await {
        warn!(%err, "daily reminders unavailable");
    }
    if let Some(advisory) = app.take_advisory() {
        warn!(message = advisory.message, "advisory");
    }

    let mood = app.mood();
    info!(
        companion = %app.companion_name(),
        mood = %mood.mood,
        score = mood.final_score,
        "companion ready; press Ctrl-C to exit"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    cleanup.abort();
    app.shutdown().await;
    Ok(())
}
