//! Semester lifecycle model.
//!
//! # Invariants
//! - `status` moves from `Active` to `Archived` at most once and never back.
//! - At most one semester should be `Active`; this is maintained by
//!   `SemesterService`, not by storage.
//! - `ActivePointer` mirrors the active semester id and is a lookup cache,
//!   not the source of truth.

use crate::store::Timestamp;
use serde::{Deserialize, Serialize};

pub type SemesterId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemesterStatus {
    Active,
    Archived,
}

impl SemesterStatus {
    /// Stored string form, used in equality queries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Semester {
    /// Store-assigned document id; not part of the stored fields.
    #[serde(skip)]
    pub id: SemesterId,
    pub name: String,
    pub status: SemesterStatus,
    pub created_at: Timestamp,
}

impl Semester {
    pub fn is_active(&self) -> bool {
        self.status == SemesterStatus::Active
    }
}

/// Singleton `metadata/config` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePointer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_semester_id: Option<SemesterId>,
}
