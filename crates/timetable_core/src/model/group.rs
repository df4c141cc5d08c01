//! Group model and the biweekly schedule container.
//!
//! # Responsibility
//! - Hold per-group subject lists and the `alt`/`ust` weekly timetable.
//! - Give add/remove symmetric lazy-defaulting accessors over the sparse
//!   `week type -> day -> lessons` structure.
//!
//! # Invariants
//! - Lesson strings are opaque; duplicates are allowed.
//! - Reading a missing week/day level yields an empty slice and never
//!   creates the level. Only `lessons_mut` creates levels.
//! - `subjects` keeps insertion order without duplicates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub type GroupId = String;

/// Day slot within a week, as stored (`"0"`, `"1"`, ...).
pub type DayIndex = u8;

/// Lessons per day for one week type.
pub type WeekSchedule = BTreeMap<DayIndex, Vec<String>>;

/// One of the two alternating timetable patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekType {
    Alt,
    Ust,
}

impl WeekType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alt => "alt",
            Self::Ust => "ust",
        }
    }
}

impl Display for WeekType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeekType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alt" => Ok(Self::Alt),
            "ust" => Ok(Self::Ust),
            other => Err(format!("unknown week type `{other}`; expected alt|ust")),
        }
    }
}

/// Sparse biweekly timetable.
///
/// Stored as `{"alt": {"0": [...]}, "ust": {}}`. Missing week types decode as
/// empty weeks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub alt: WeekSchedule,
    #[serde(default)]
    pub ust: WeekSchedule,
}

impl Schedule {
    /// Empty two-week-type shell.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn week(&self, week_type: WeekType) -> &WeekSchedule {
        match week_type {
            WeekType::Alt => &self.alt,
            WeekType::Ust => &self.ust,
        }
    }

    fn week_mut(&mut self, week_type: WeekType) -> &mut WeekSchedule {
        match week_type {
            WeekType::Alt => &mut self.alt,
            WeekType::Ust => &mut self.ust,
        }
    }

    /// Get-or-empty: lessons for one day, empty when the level is missing.
    pub fn lessons(&self, week_type: WeekType, day: DayIndex) -> &[String] {
        self.week(week_type)
            .get(&day)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get-or-create: lessons for one day, creating the level when missing.
    pub fn lessons_mut(&mut self, week_type: WeekType, day: DayIndex) -> &mut Vec<String> {
        self.week_mut(week_type).entry(day).or_default()
    }

    /// Appends one lesson to the end of the day.
    pub fn add_lesson(&mut self, week_type: WeekType, day: DayIndex, lesson: impl Into<String>) {
        self.lessons_mut(week_type, day).push(lesson.into());
    }

    /// Removes the first exact match only.
    ///
    /// Returns `false` without touching the structure when the level is
    /// missing or no entry matches.
    pub fn remove_lesson(&mut self, week_type: WeekType, day: DayIndex, lesson: &str) -> bool {
        let Some(lessons) = self.week_mut(week_type).get_mut(&day) else {
            return false;
        };
        match lessons.iter().position(|entry| entry == lesson) {
            Some(index) => {
                lessons.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(skip)]
    pub id: GroupId,
    pub name: String,
    pub course: i64,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub schedule: Schedule,
}

impl Group {
    /// Fresh group with no subjects and an empty schedule shell.
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, course: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            course,
            subjects: Vec::new(),
            schedule: Schedule::empty(),
        }
    }

    /// Adds a subject unless already present. Returns whether it was added.
    pub fn add_subject(&mut self, subject: impl Into<String>) -> bool {
        let subject = subject.into();
        if self.subjects.contains(&subject) {
            return false;
        }
        self.subjects.push(subject);
        true
    }
}
