use async_trait::async_trait;
use chrono::{NaiveTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::recurrence::Recurrence;

pub const MORNING_MESSAGES: &[&str] = &[
    "🐾 Your pet is waiting to see you take on today's tasks!",
    "⚡ Quick check-in! Your productivity buddy needs your attention",
    "🚀 Morning momentum starts here - your pet is counting on you!",
    "👀 Your virtual pet is looking for you. Are your tasks done?",
    "⏰ Task check: Your pet's mood changes with your productivity",
];

pub const EVENING_MESSAGES: &[&str] = &[
    "🌟 End the day strong - your pet's mood depends on your progress!",
    "🔍 Your pet is analyzing your productivity... Time to improve!",
    "✨ Your pet misses you! Take 30 seconds to update your tasks",
    "📊 Your productivity score is being calculated. Check in now!",
    "🏆 Quick win: Update a task and make your pet happier!",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReminderTrigger {
    Weekly {
        /// 0 = Sunday … 6 = Saturday.
        weekday: u8,
        hour: u8,
        minute: u8,
        repeats: bool,
    },
    Daily {
        hour: u8,
        minute: u8,
        repeats: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub title: String,
    pub body: String,
    pub trigger: ReminderTrigger,
}

impl ReminderRequest {
    pub fn weekly(recurrence: &Recurrence) -> Self {
        Self {
            title: "Task Reminder".to_string(),
            body: recurrence.description.clone(),
            trigger: ReminderTrigger::Weekly {
                weekday: recurrence.weekday,
                hour: recurrence.hour,
                minute: recurrence.minute,
                repeats: true,
            },
        }
    }

    pub fn daily(title: impl Into<String>, body: impl Into<String>, at: NaiveTime) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            trigger: ReminderTrigger::Daily {
                hour: at.hour() as u8,
                minute: at.minute() as u8,
                repeats: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Platform-specific reminder adapters implement this trait.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn permission_status(&self) -> PermissionStatus;

    async fn request_permission(&self) -> PermissionStatus;

    /// Registers a repeating reminder and returns the platform's id for it.
    async fn schedule(&self, request: ReminderRequest) -> Result<String>;

    async fn cancel_all(&self) -> Result<()>;
}

/// Morning and evening check-in reminders, each with a randomly picked body.
pub fn daily_check_ins<R: Rng + ?Sized>(
    morning: NaiveTime,
    evening: NaiveTime,
    rng: &mut R,
) -> [ReminderRequest; 2] {
    let morning_body = MORNING_MESSAGES.choose(rng).copied().unwrap_or_default();
    let evening_body = EVENING_MESSAGES.choose(rng).copied().unwrap_or_default();
    [
        ReminderRequest::daily("Todo Reminder", morning_body, morning),
        ReminderRequest::daily("Evening Todo Reminder", evening_body, evening),
    ]
}
