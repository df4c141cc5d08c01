//! Persisted collection and key layout.
//!
//! ```text
//! semesters/{semesterId}
//! semesters/{semesterId}/groups/{groupId}
//! metadata/config
//! students/{studentId}
//! students/{studentId}/semesters/{semesterId}/absences/{absenceId}
//! absences_log/{logId}
//! {legacy collection}/{legacyId}          (read-only)
//! ```

use super::{CollectionPath, DocPath, StoreResult};

pub const SEMESTERS: &str = "semesters";
pub const GROUPS: &str = "groups";
pub const METADATA: &str = "metadata";
pub const CONFIG_KEY: &str = "config";
pub const STUDENTS: &str = "students";
pub const STUDENT_SEMESTERS: &str = "semesters";
pub const ABSENCES: &str = "absences";
pub const ABSENCE_LOG: &str = "absences_log";

pub fn semesters() -> StoreResult<CollectionPath> {
    CollectionPath::root(SEMESTERS)
}

pub fn semester(semester_id: &str) -> StoreResult<DocPath> {
    semesters()?.doc(semester_id)
}

pub fn config() -> StoreResult<DocPath> {
    CollectionPath::root(METADATA)?.doc(CONFIG_KEY)
}

pub fn groups(semester_id: &str) -> StoreResult<CollectionPath> {
    semester(semester_id)?.collection(GROUPS)
}

pub fn group(semester_id: &str, group_id: &str) -> StoreResult<DocPath> {
    groups(semester_id)?.doc(group_id)
}

pub fn students() -> StoreResult<CollectionPath> {
    CollectionPath::root(STUDENTS)
}

pub fn student(student_id: &str) -> StoreResult<DocPath> {
    students()?.doc(student_id)
}

pub fn student_absences(student_id: &str, semester_id: &str) -> StoreResult<CollectionPath> {
    student(student_id)?
        .collection(STUDENT_SEMESTERS)?
        .doc(semester_id)?
        .collection(ABSENCES)
}

pub fn absence_log() -> StoreResult<CollectionPath> {
    CollectionPath::root(ABSENCE_LOG)
}

pub fn absence_log_entry(log_id: &str) -> StoreResult<DocPath> {
    absence_log()?.doc(log_id)
}

pub fn legacy_absences(collection: &str) -> StoreResult<CollectionPath> {
    CollectionPath::root(collection)
}
