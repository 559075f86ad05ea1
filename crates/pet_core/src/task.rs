use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

/// Points awarded when a task carries no explicit value.
pub const DEFAULT_TASK_POINTS: u32 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Default,
}

impl Difficulty {
    pub fn points(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 20,
            Difficulty::Hard => 30,
            Difficulty::Default => DEFAULT_TASK_POINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    /// Creation instant, overwritten with the completion instant.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub points: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
}

impl Task {
    pub fn new(id: TaskId, text: impl Into<String>, difficulty: Difficulty, at: DateTime<Utc>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            timestamp: at,
            points: difficulty.points(),
            difficulty,
            streak: None,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.difficulty == Difficulty::Hard
    }
}
