//! Ritual steps: two namespaces (evening, morning) in one completion table

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HubError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Evening,
    Morning,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Evening => "evening",
            Scope::Morning => "morning",
        }
    }

    /// Every step in this namespace, in display order.
    pub fn steps(&self) -> Vec<StepId> {
        match self {
            Scope::Evening => EveningStep::ALL.iter().copied().map(StepId::Evening).collect(),
            Scope::Morning => MorningStep::ALL.iter().copied().map(StepId::Morning).collect(),
        }
    }
}

impl FromStr for Scope {
    type Err = HubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "evening" | "sleep" | "bedtime" => Ok(Scope::Evening),
            "morning" => Ok(Scope::Morning),
            other => Err(HubError::invalid(format!("unknown ritual: {other} (evening|morning)"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EveningStep {
    Teeth,
    Toilet,
    Pajamas,
}

impl EveningStep {
    pub const ALL: [EveningStep; 3] = [EveningStep::Teeth, EveningStep::Toilet, EveningStep::Pajamas];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorningStep {
    Toilet,
    Breakfast,
    Clothes,
    ForestClothes,
    Lunch,
}

impl MorningStep {
    pub const ALL: [MorningStep; 5] = [
        MorningStep::Toilet,
        MorningStep::Breakfast,
        MorningStep::Clothes,
        MorningStep::ForestClothes,
        MorningStep::Lunch,
    ];

    /// Forest-school days only.
    pub fn is_weekday_extra(&self) -> bool {
        matches!(self, MorningStep::ForestClothes | MorningStep::Lunch)
    }
}

/// A ritual step. Wire names are the upper-case identifiers stored in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepId {
    Evening(EveningStep),
    Morning(MorningStep),
}

impl StepId {
    pub fn scope(&self) -> Scope {
        match self {
            StepId::Evening(_) => Scope::Evening,
            StepId::Morning(_) => Scope::Morning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Evening(EveningStep::Teeth) => "TEETH",
            StepId::Evening(EveningStep::Toilet) => "TOILET",
            StepId::Evening(EveningStep::Pajamas) => "PAJAMAS",
            StepId::Morning(MorningStep::Toilet) => "MORNING_TOILET",
            StepId::Morning(MorningStep::Breakfast) => "MORNING_BREAKFAST",
            StepId::Morning(MorningStep::Clothes) => "MORNING_CLOTHES",
            StepId::Morning(MorningStep::ForestClothes) => "MORNING_FOREST_CLOTHES",
            StepId::Morning(MorningStep::Lunch) => "MORNING_LUNCH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Scope::Evening.steps().into_iter()
            .chain(Scope::Morning.steps())
            .find(|s| s.as_str() == value)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl Serialize for StepId {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> { s.serialize_str(self.as_str()) }
}

impl<'de> Deserialize<'de> for StepId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        StepId::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown step: {}", raw)))
    }
}

/// Steps that apply to `scope` on `date`. Tuesdays and Thursdays add forest
/// clothes and a packed lunch to the morning.
pub fn active_steps(scope: Scope, date: NaiveDate) -> Vec<StepId> {
    match scope {
        Scope::Evening => scope.steps(),
        Scope::Morning => {
            let forest_day = matches!(date.weekday(), Weekday::Tue | Weekday::Thu);
            MorningStep::ALL.iter()
                .filter(|s| forest_day || !s.is_weekday_extra())
                .copied()
                .map(StepId::Morning)
                .collect()
        }
    }
}

/// `active_steps` for a `YYYY-MM-DD` string; unparseable dates get the base set.
pub fn active_steps_for(scope: Scope, date: &str) -> Vec<StepId> {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => active_steps(scope, d),
        Err(_) => match scope {
            Scope::Evening => scope.steps(),
            Scope::Morning => MorningStep::ALL.iter()
                .filter(|s| !s.is_weekday_extra())
                .copied()
                .map(StepId::Morning)
                .collect(),
        },
    }
}
