//! Points, levels, daily streaks, milestones and achievements.
//!
//! [`on_task_completed`] is the whole state machine: it takes the stats as
//! they were before a completion and returns the stats after it, together
//! with a report of what changed. [`GamificationEngine`] owns the live
//! [`UserStats`] and applies that transition in place.

use tracing::debug;

use crate::clock::{CalendarDay, Clock};
use crate::stats::{points_for_next_level, AchievementId, UserStats, STREAK_THRESHOLD};
use crate::task::{Task, TaskId};

const BUSY_DAY_COMPLETIONS: usize = 3;
const STREAK_ACHIEVEMENT_DAYS: u32 = 3;
const LEVEL_ACHIEVEMENT: u32 = 5;
const HARD_TASK_ACHIEVEMENT: usize = 10;

/// What a single completion changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub task_id: TaskId,
    pub points_awarded: u32,
    pub level_up: Option<u32>,
    pub streak_days: u32,
    pub streak_changed: bool,
    pub unlocked: Vec<AchievementId>,
    pub milestones_completed: Vec<u32>,
}

/// Inputs every achievement predicate sees. `stats` is already updated with
/// the points, level and streak of the current completion.
pub struct RuleInput<'a> {
    pub stats: &'a UserStats,
    pub completed_before: &'a [Task],
    pub task: &'a Task,
    pub today: CalendarDay,
    pub clock: &'a dyn Clock,
}

pub struct AchievementRule {
    pub id: AchievementId,
    pub name: &'static str,
    pub predicate: fn(&RuleInput<'_>) -> bool,
}

pub const ACHIEVEMENT_RULES: &[AchievementRule] = &[
    AchievementRule {
        id: AchievementId::GETTING_STARTED,
        name: "first_completion",
        predicate: first_completion,
    },
    AchievementRule {
        id: AchievementId::BUSY_DAY,
        name: "busy_day",
        predicate: busy_day,
    },
    AchievementRule {
        id: AchievementId::CONSISTENT_PLANNER,
        name: "streak_of_three",
        predicate: streak_of_three,
    },
    AchievementRule {
        id: AchievementId::RISING_STAR,
        name: "reached_level_five",
        predicate: reached_level_five,
    },
    AchievementRule {
        id: AchievementId::HEAVY_LIFTER,
        name: "ten_hard_tasks",
        predicate: ten_hard_tasks,
    },
];

fn first_completion(input: &RuleInput<'_>) -> bool {
    input.completed_before.is_empty()
}

fn busy_day(input: &RuleInput<'_>) -> bool {
    let earlier_today = input
        .completed_before
        .iter()
        .filter(|task| input.clock.day_of(task.timestamp) == input.today)
        .count();
    let this_one = usize::from(input.clock.day_of(input.task.timestamp) == input.today);
    earlier_today + this_one >= BUSY_DAY_COMPLETIONS
}

fn streak_of_three(input: &RuleInput<'_>) -> bool {
    input.stats.streak_days >= STREAK_ACHIEVEMENT_DAYS
}

fn reached_level_five(input: &RuleInput<'_>) -> bool {
    input.stats.level >= LEVEL_ACHIEVEMENT
}

fn ten_hard_tasks(input: &RuleInput<'_>) -> bool {
    let earlier = input.completed_before.iter().filter(|task| task.is_hard()).count();
    earlier + usize::from(input.task.is_hard()) >= HARD_TASK_ACHIEVEMENT
}

/// Applies one completion to `stats`.
///
/// `task` carries its completion timestamp; `completed_before` is the
/// completed list as it was before this task joined it.
pub fn on_task_completed(
    task: &Task,
    stats: &UserStats,
    completed_before: &[Task],
    today: CalendarDay,
    clock: &dyn Clock,
) -> (UserStats, CompletionReport) {
    let mut next = stats.clone();

    next.points += u64::from(task.points);

    // Single step: a large award never skips a level.
    let mut level_up = None;
    if next.points >= points_for_next_level(next.level) {
        next.level += 1;
        level_up = Some(next.level);
    }

    if next.last_task_completion_date == Some(today) {
        next.tasks_completed_today_count += 1;
    } else {
        next.tasks_completed_today_count = 1;
    }
    next.last_task_completion_date = Some(today);

    let mut streak_changed = false;
    if next.tasks_completed_today_count >= STREAK_THRESHOLD
        && next.last_streak_increment_date != Some(today)
    {
        if next.last_streak_increment_date == Some(today.yesterday()) {
            next.streak_days += 1;
        } else {
            next.streak_days = 1;
        }
        next.last_streak_increment_date = Some(today);
        streak_changed = true;
    }

    let milestones_completed: Vec<u32> = next
        .milestones
        .iter_mut()
        .filter_map(|milestone| milestone.advance().then_some(milestone.id))
        .collect();

    let satisfied: Vec<AchievementId> = {
        let input = RuleInput {
            stats: &next,
            completed_before,
            task,
            today,
            clock,
        };
        ACHIEVEMENT_RULES
            .iter()
            .filter(|rule| (rule.predicate)(&input))
            .inspect(|rule| debug!(rule = rule.name, "achievement rule satisfied"))
            .map(|rule| rule.id)
            .collect()
    };
    let unlocked: Vec<AchievementId> = satisfied
        .into_iter()
        .filter(|id| next.unlock(*id))
        .collect();

    let report = CompletionReport {
        task_id: task.id,
        points_awarded: task.points,
        level_up,
        streak_days: next.streak_days,
        streak_changed,
        unlocked,
        milestones_completed,
    };
    (next, report)
}

/// Owner of the process-wide [`UserStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GamificationEngine {
    stats: UserStats,
}

impl GamificationEngine {
    pub fn new(stats: UserStats) -> Self {
        Self { stats }
    }

    pub fn stats(&self) -> &UserStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut UserStats {
        &mut self.stats
    }

    pub fn record_completion(
        &mut self,
        task: &Task,
        completed_before: &[Task],
        clock: &dyn Clock,
    ) -> CompletionReport {
        let today = clock.day_of(task.timestamp);
        let (next, report) = on_task_completed(task, &self.stats, completed_before, today, clock);
        self.stats = next;
        report
    }
}
