use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const PET_NAMES: &[&str] = &[
    "Fluffy", "Buddy", "Max", "Daisy", "Charlie", "Luna", "Bailey", "Coco", "Rocky", "Bella",
    "Oreo", "Molly", "Shadow", "Sunny",
];

const ROBOT_NAMES: &[&str] = &[
    "Botsie", "Sparky", "Volt", "Circuit", "Bolt", "Gear", "Binary", "Chip", "Nexus", "Servo",
    "Pixel", "Zeta", "Nova", "Echo",
];

const CAR_NAMES: &[&str] = &[
    "Speedy", "Flash", "Zoom", "Dash", "Blitz", "Cruise", "Turbo", "Bolt", "Rocket", "Nitro",
    "Streak", "Blaze", "Swift", "Vroom",
];

/// How the companion is visualised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanionTheme {
    #[default]
    Pet,
    Robot,
    Car,
}

impl CompanionTheme {
    pub fn default_name(self) -> &'static str {
        match self {
            CompanionTheme::Pet => "Fluffy",
            CompanionTheme::Robot => "Botsie",
            CompanionTheme::Car => "Speedy",
        }
    }

    pub fn name_pool(self) -> &'static [&'static str] {
        match self {
            CompanionTheme::Pet => PET_NAMES,
            CompanionTheme::Robot => ROBOT_NAMES,
            CompanionTheme::Car => CAR_NAMES,
        }
    }

    pub fn random_name<R: Rng + ?Sized>(self, rng: &mut R) -> &'static str {
        self.name_pool()
            .choose(rng)
            .copied()
            .unwrap_or_else(|| self.default_name())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompanionTheme::Pet => "pet",
            CompanionTheme::Robot => "robot",
            CompanionTheme::Car => "car",
        }
    }

    /// Parses a stored theme, falling back to the pet for unknown values.
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl fmt::Display for CompanionTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown companion theme `{0}`")]
pub struct UnknownTheme(pub String);

impl FromStr for CompanionTheme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pet" => Ok(CompanionTheme::Pet),
            "robot" => Ok(CompanionTheme::Robot),
            "car" => Ok(CompanionTheme::Car),
            _ => Err(UnknownTheme(s.to_string())),
        }
    }
}
