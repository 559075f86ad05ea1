//! Companion mood derived from aggregate task statistics.
//!
//! The score is a pure function of three numbers: how many tasks exist, the
//! share of them completed, and how many were completed in the last 48 hours.
//! Nothing here is stored; callers recompute on every render so that the
//! recent-activity boost decays as time passes.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Window within which a completion counts as recent.
pub const RECENT_WINDOW_HOURS: i64 = 48;

const RECENT_BOOST_PER_TASK: f64 = 10.0;
const RECENT_BOOST_CAP: f64 = 30.0;
/// Task count at which the score reaches full weight.
const FULL_VOLUME_TASKS: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Sad,
    Concerned,
    Happy,
    Joy,
}

impl Mood {
    pub fn from_score(score: f64) -> Self {
        if score < 30.0 {
            Mood::Sad
        } else if score < 60.0 {
            Mood::Concerned
        } else if score < 90.0 {
            Mood::Happy
        } else {
            Mood::Joy
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Sad => "sad",
            Mood::Concerned => "concerned",
            Mood::Happy => "happy",
            Mood::Joy => "joy",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn compute_mood(total_tasks: u32, completion_ratio: f64, recent_completions: u32) -> Mood {
    if total_tasks == 0 {
        return Mood::Happy;
    }
    MoodBreakdown::new(total_tasks, completion_ratio, recent_completions).mood
}

/// Completed tasks whose completion instant lies within the recent window.
pub fn recent_completions(completed: &[Task], now: DateTime<Utc>) -> u32 {
    let window = Duration::hours(RECENT_WINDOW_HOURS);
    completed
        .iter()
        .filter(|task| now.signed_duration_since(task.timestamp) < window)
        .count() as u32
}

pub fn completion_ratio(active: usize, completed: usize) -> f64 {
    let total = active + completed;
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Notice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriticalMessage {
    pub text: &'static str,
    pub severity: Severity,
}

/// Every intermediate quantity of the mood score, for explanation screens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodBreakdown {
    pub total_tasks: u32,
    pub completion_ratio: f64,
    pub recent_completions: u32,
    pub base_score: f64,
    pub recent_boost: f64,
    pub volume_factor: f64,
    pub final_score: f64,
    pub mood: Mood,
}

impl MoodBreakdown {
    pub fn new(total_tasks: u32, completion_ratio: f64, recent_completions: u32) -> Self {
        let completion_ratio = completion_ratio.clamp(0.0, 1.0);
        let base_score = completion_ratio * 100.0;
        let recent_boost = (f64::from(recent_completions) * RECENT_BOOST_PER_TASK).min(RECENT_BOOST_CAP);
        let volume_factor = (f64::from(total_tasks) / FULL_VOLUME_TASKS).min(1.0);
        let final_score = ((base_score + recent_boost) * volume_factor).min(100.0);
        let mood = if total_tasks == 0 {
            Mood::Happy
        } else {
            Mood::from_score(final_score)
        };
        Self {
            total_tasks,
            completion_ratio,
            recent_completions,
            base_score,
            recent_boost,
            volume_factor,
            final_score,
            mood,
        }
    }

    pub fn from_tasks(active: &[Task], completed: &[Task], now: DateTime<Utc>) -> Self {
        let total = (active.len() + completed.len()) as u32;
        Self::new(
            total,
            completion_ratio(active.len(), completed.len()),
            recent_completions(completed, now),
        )
    }

    pub fn suggestions(&self) -> Vec<String> {
        let mut suggestions = Vec::new();
        if self.mood == Mood::Joy {
            return suggestions;
        }
        if self.completion_ratio < 0.9 {
            let missing = (f64::from(self.total_tasks) * (0.9 - self.completion_ratio)).ceil() as u32;
            if missing > 0 {
                suggestions.push(format!(
                    "Complete {} more {} to boost your completion rate.",
                    missing,
                    plural(missing, "task", "tasks")
                ));
            }
        }
        if self.recent_completions < 3 {
            let missing = 3 - self.recent_completions;
            suggestions.push(format!(
                "Complete {} {} today or tomorrow for a recent activity boost.",
                missing,
                plural(missing, "task", "tasks")
            ));
        }
        if self.total_tasks < 10 {
            let missing = 10 - self.total_tasks;
            suggestions.push(format!(
                "Add {} more {} to unlock the full score.",
                missing,
                plural(missing, "task", "tasks")
            ));
        }
        suggestions
    }

    pub fn critical_message(&self) -> Option<CriticalMessage> {
        if self.total_tasks == 0 {
            return None;
        }
        if self.completion_ratio < 0.3 {
            Some(CriticalMessage {
                text: "Low completion rate! Complete some tasks soon.",
                severity: Severity::Warning,
            })
        } else if self.recent_completions == 0 {
            Some(CriticalMessage {
                text: "No recent activity. Try completing a task today!",
                severity: Severity::Notice,
            })
        } else {
            None
        }
    }

    /// Explanation text addressed from the companion's point of view.
    pub fn explain(&self, companion_name: &str) -> String {
        let mut text = format!(
            "{companion_name} is feeling {} with a score of {:.1}/100.\n\
             - Completion: {:.1}% of your {} {} done.\n\
             - Recent activity: {} {} completed in the last {} hours adds {:.0} points.\n\
             - Volume: with {} {}, the score is scaled by {:.2}.",
            self.mood,
            self.final_score,
            self.base_score,
            self.total_tasks,
            plural(self.total_tasks, "task is", "tasks are"),
            self.recent_completions,
            plural(self.recent_completions, "task", "tasks"),
            RECENT_WINDOW_HOURS,
            self.recent_boost,
            self.total_tasks,
            plural(self.total_tasks, "task", "tasks"),
            self.volume_factor,
        );
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            text.push_str("\n\nTo cheer things up:");
            for suggestion in suggestions {
                text.push_str("\n- ");
                text.push_str(&suggestion);
            }
        }
        text
    }
}

impl fmt::Display for MoodBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain("Your companion"))
    }
}

fn plural<'a>(count: u32, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 {
        one
    } else {
        many
    }
}
