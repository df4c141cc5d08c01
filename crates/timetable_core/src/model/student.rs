//! Student identity model.
//!
//! # Invariants
//! - `(full_name, group_id)` identifies at most one student.
//! - `id` is assigned once by the store and never changes.

use crate::store::Timestamp;
use serde::{Deserialize, Serialize};

pub type StudentId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(skip)]
    pub id: StudentId,
    pub full_name: String,
    pub group_id: String,
    pub created_at: Timestamp,
}
