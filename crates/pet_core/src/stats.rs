use serde::{Deserialize, Serialize};

use crate::clock::CalendarDay;
use crate::companion::CompanionTheme;

/// Completions needed within one day before that day counts toward the streak.
pub const STREAK_THRESHOLD: u32 = 3;

/// Points required to advance from `level` to `level + 1`.
pub fn points_for_next_level(level: u32) -> u64 {
    let exponent = level.saturating_sub(1) as i32;
    (100.0 * 1.5f64.powi(exponent)).floor() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementId(pub u32);

impl AchievementId {
    pub const GETTING_STARTED: AchievementId = AchievementId(1);
    pub const BUSY_DAY: AchievementId = AchievementId(2);
    pub const CONSISTENT_PLANNER: AchievementId = AchievementId(3);
    pub const RISING_STAR: AchievementId = AchievementId(4);
    pub const HEAVY_LIFTER: AchievementId = AchievementId(5);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
}

impl Achievement {
    fn locked(id: AchievementId, title: &str, description: &str, icon: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            unlocked: false,
        }
    }
}

pub fn default_achievements() -> Vec<Achievement> {
    vec![
        Achievement::locked(
            AchievementId::GETTING_STARTED,
            "Getting Started",
            "Complete your first task",
            "check-circle",
        ),
        Achievement::locked(
            AchievementId::BUSY_DAY,
            "Busy Day",
            "Complete 3 tasks in a single day",
            "star",
        ),
        Achievement::locked(
            AchievementId::CONSISTENT_PLANNER,
            "Consistent Planner",
            "Keep a 3 day streak",
            "calendar",
        ),
        Achievement::locked(
            AchievementId::RISING_STAR,
            "Rising Star",
            "Reach level 5",
            "trophy",
        ),
        Achievement::locked(
            AchievementId::HEAVY_LIFTER,
            "Heavy Lifter",
            "Complete 10 hard tasks",
            "flame",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub target: u32,
    pub progress: u32,
    pub completed: bool,
}

impl Milestone {
    fn new(id: u32, title: &str, target: u32) -> Self {
        Self {
            id,
            title: title.to_string(),
            description: format!("Complete {target} tasks"),
            target,
            progress: 0,
            completed: false,
        }
    }

    /// Records one completion. Returns true when this call completed the milestone.
    pub fn advance(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.progress = (self.progress + 1).min(self.target);
        self.completed = self.progress >= self.target;
        self.completed
    }

    pub fn percent(&self) -> u32 {
        if self.target == 0 {
            return 100;
        }
        let ratio = f64::from(self.progress) / f64::from(self.target);
        ((ratio * 100.0).round() as u32).min(100)
    }
}

pub fn default_milestones() -> Vec<Milestone> {
    vec![
        Milestone::new(1, "Warming Up", 10),
        Milestone::new(2, "Half Century", 50),
        Milestone::new(3, "Centurion", 100),
        Milestone::new(4, "Unstoppable", 500),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub points: u64,
    pub level: u32,
    pub streak_days: u32,
    pub last_task_completion_date: Option<CalendarDay>,
    pub tasks_completed_today_count: u32,
    pub last_streak_increment_date: Option<CalendarDay>,
    pub achievements: Vec<Achievement>,
    pub milestones: Vec<Milestone>,
    pub pet_name: String,
    pub robot_name: String,
    pub car_name: String,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            points: 0,
            level: 1,
            streak_days: 0,
            last_task_completion_date: None,
            tasks_completed_today_count: 0,
            last_streak_increment_date: None,
            achievements: default_achievements(),
            milestones: default_milestones(),
            pet_name: CompanionTheme::Pet.default_name().to_string(),
            robot_name: CompanionTheme::Robot.default_name().to_string(),
            car_name: CompanionTheme::Car.default_name().to_string(),
        }
    }
}

impl UserStats {
    pub fn achievement(&self, id: AchievementId) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn is_unlocked(&self, id: AchievementId) -> bool {
        self.achievement(id).map(|a| a.unlocked).unwrap_or(false)
    }

    /// Unlocks by id. Returns true only on the false→true transition.
    pub fn unlock(&mut self, id: AchievementId) -> bool {
        match self.achievements.iter_mut().find(|a| a.id == id) {
            Some(achievement) if !achievement.unlocked => {
                achievement.unlocked = true;
                true
            }
            _ => false,
        }
    }

    pub fn companion_name(&self, theme: CompanionTheme) -> &str {
        match theme {
            CompanionTheme::Pet => &self.pet_name,
            CompanionTheme::Robot => &self.robot_name,
            CompanionTheme::Car => &self.car_name,
        }
    }

    pub fn set_companion_name(&mut self, theme: CompanionTheme, name: String) {
        match theme {
            CompanionTheme::Pet => self.pet_name = name,
            CompanionTheme::Robot => self.robot_name = name,
            CompanionTheme::Car => self.car_name = name,
        }
    }

    pub fn points_to_next_level(&self) -> u64 {
        points_for_next_level(self.level).saturating_sub(self.points)
    }

    /// Aligns stored achievements and milestones with the fixed catalogues.
    ///
    /// Unknown ids are dropped, missing ids are appended, and progress and
    /// unlock flags of known entries are kept.
    pub fn reconcile_catalogue(&mut self) {
        let stored_achievements = std::mem::take(&mut self.achievements);
        self.achievements = default_achievements()
            .into_iter()
            .map(|mut fresh| {
                if let Some(stored) = stored_achievements.iter().find(|a| a.id == fresh.id) {
                    fresh.unlocked = stored.unlocked;
                }
                fresh
            })
            .collect();

        let stored_milestones = std::mem::take(&mut self.milestones);
        self.milestones = default_milestones()
            .into_iter()
            .map(|mut fresh| {
                if let Some(stored) = stored_milestones.iter().find(|m| m.id == fresh.id) {
                    fresh.progress = stored.progress.min(fresh.target);
                    fresh.completed = fresh.progress >= fresh.target;
                }
                fresh
            })
            .collect();

        self.level = self.level.max(1);
    }
}
