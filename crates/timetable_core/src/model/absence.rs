//! Absence records, the global absence log and the legacy absence shape.
//!
//! # Invariants
//! - Every live absence event writes one `AbsenceRecord` under the student
//!   and one `AbsenceLogEntry` in the global log; neither is updated later.
//! - Log entries are deletable on their own without touching the per-student
//!   record.
//! - Legacy field names (`usaqAdi`, `fenn`, `tarix`) are only ever read.

use crate::store::{Fields, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Placeholder for legacy fields that were never filled in.
pub const UNKNOWN_FIELD: &str = "Unknown";

pub const LEGACY_STUDENT_NAME: &str = "usaqAdi";
pub const LEGACY_SUBJECT: &str = "fenn";
pub const LEGACY_DATE: &str = "tarix";
pub const LEGACY_TIMESTAMP: &str = "timestamp";

/// Per-student, per-semester absence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsenceRecord {
    #[serde(skip)]
    pub id: String,
    pub subject: String,
    pub date: String,
    pub timestamp: Timestamp,
}

/// Denormalized global absence log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceLogEntry {
    #[serde(skip)]
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    /// Absent on entries replayed from the legacy store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semester_id: Option<String>,
    pub subject: String,
    pub date: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "is_false")]
    pub migrated: bool,
}

/// Legacy absence, remapped to current field names on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyAbsence {
    pub id: String,
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub timestamp: Option<Timestamp>,
}

impl LegacyAbsence {
    /// Reads legacy fields leniently: wrong JSON types count as missing.
    pub fn from_fields(id: impl Into<String>, fields: &Fields) -> Self {
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };
        Self {
            id: id.into(),
            student_name: text(LEGACY_STUDENT_NAME).filter(|name| !name.trim().is_empty()),
            subject: text(LEGACY_SUBJECT),
            date: text(LEGACY_DATE),
            timestamp: fields.get(LEGACY_TIMESTAMP).and_then(legacy_timestamp),
        }
    }

    pub fn subject_or_unknown(&self) -> &str {
        self.subject.as_deref().unwrap_or(UNKNOWN_FIELD)
    }

    pub fn date_or_unknown(&self) -> &str {
        self.date.as_deref().unwrap_or(UNKNOWN_FIELD)
    }
}

/// Integer millis, or a finite float truncated to millis.
fn legacy_timestamp(value: &Value) -> Option<Timestamp> {
    if let Some(millis) = value.as_i64() {
        return Some(millis);
    }
    value
        .as_f64()
        .filter(|millis| millis.is_finite())
        .filter(|millis| (Timestamp::MIN as f64..=Timestamp::MAX as f64).contains(millis))
        .map(|millis| millis as Timestamp)
}

fn is_false(value: &bool) -> bool {
    !*value
}
