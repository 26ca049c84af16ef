use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::IntakeError;

pub const LEG_LENGTH_MIN: u32 = 30;
pub const LEG_LENGTH_MAX: u32 = 70;
pub const LEG_LENGTH_DEFAULT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl FromStr for Gender {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "laki-laki" => Ok(Gender::Male),
            "female" | "f" | "perempuan" => Ok(Gender::Female),
            _ => Err(IntakeError::InvalidGender { input: s.to_string() }),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        };

        write!(f, "{}", result)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub name: String,
    pub gender: Gender,
    /// centimeters, within [LEG_LENGTH_MIN, LEG_LENGTH_MAX]
    pub leg_length: u32,
}

/// Body stored under `profile_<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProfile {
    pub name: String,
    pub data: PatientProfile,
}
