//! Alarm document models shared by the store and the trigger engine.

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Which puzzle gates dismissal of a triggered alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionKind {
    Math,
    Typing,
}

impl Default for MissionKind {
    fn default() -> Self {
        MissionKind::Math
    }
}

impl MissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionKind::Math => "math",
            MissionKind::Typing => "typing",
        }
    }

    /// Parse a stored mission string. Older documents used "slider" as an
    /// alias of the math mission; unknown values fall back to math.
    pub fn parse(value: &str) -> Self {
        match value {
            "typing" => MissionKind::Typing,
            _ => MissionKind::Math,
        }
    }
}

/// Per-weekday repeat flags. All-false means a one-time alarm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatDays {
    pub sunday: bool,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl RepeatDays {
    pub fn none() -> Self {
        Self::default()
    }

    /// True when at least one weekday is selected.
    pub fn any(&self) -> bool {
        self.sunday
            || self.monday
            || self.tuesday
            || self.wednesday
            || self.thursday
            || self.friday
            || self.saturday
    }

    pub fn contains(&self, day: Weekday) -> bool {
        match day {
            Weekday::Sun => self.sunday,
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
        }
    }

    pub fn with(mut self, day: Weekday) -> Self {
        match day {
            Weekday::Sun => self.sunday = true,
            Weekday::Mon => self.monday = true,
            Weekday::Tue => self.tuesday = true,
            Weekday::Wed => self.wednesday = true,
            Weekday::Thu => self.thursday = true,
            Weekday::Fri => self.friday = true,
            Weekday::Sat => self.saturday = true,
        }
        self
    }
}

/// A stored alarm. The engine reads alarms and flips `enabled`/`triggered`;
/// everything else is edited by the user through the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: String,
    pub owner_id: String,
    /// Absolute instant the user picked. Only its local time-of-day is
    /// meaningful to the matcher.
    pub scheduled_at: DateTime<Utc>,
    pub repeat_days: RepeatDays,
    pub mission: MissionKind,
    pub label: String,
    pub enabled: bool,
    pub triggered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alarm {
    /// An alarm with no active repeat day fires once and is disabled after
    /// its first successful dismissal.
    pub fn is_one_time(&self) -> bool {
        !self.repeat_days.any()
    }
}

/// User-editable fields of a new alarm; the store assigns id and timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmDraft {
    pub owner_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub repeat_days: RepeatDays,
    pub mission: MissionKind,
    pub label: String,
    pub enabled: bool,
}
