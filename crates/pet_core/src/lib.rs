pub mod clock;
pub mod companion;
pub mod error;
pub mod gamification;
pub mod mood;
pub mod notifications;
pub mod persistence;
pub mod recurrence;
pub mod stats;
pub mod store;
pub mod task;

pub use crate::clock::{CalendarDay, Clock, FixedClock, SystemClock};
pub use crate::companion::CompanionTheme;
pub use crate::error::{CoreError, Result};
pub use crate::gamification::{CompletionReport, GamificationEngine};
pub use crate::mood::{compute_mood, Mood, MoodBreakdown};
pub use crate::notifications::{PermissionStatus, ReminderRequest, ReminderScheduler, ReminderTrigger};
pub use crate::persistence::{KeyValueStore, MemoryStore, PersistenceMirror, StateSnapshot};
pub use crate::store::{Action, Outcome, TaskStore};
pub use crate::task::{Difficulty, Task, TaskId};
