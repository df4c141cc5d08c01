//! Domain model for semesters, groups, students and absences.
//!
//! # Responsibility
//! - Define the typed records that services encode into store documents.
//!
//! # Invariants
//! - Store-assigned ids live on the document path, never in stored fields
//!   (`#[serde(skip)] id`).
//! - Stored field names are camelCase.

pub mod absence;
pub mod group;
pub mod semester;
pub mod student;
