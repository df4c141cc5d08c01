//! Transactional schedule and subject updates for one group.
//!
//! # Responsibility
//! - Add/remove lesson entries inside the nested `schedule` field atomically.
//! - Maintain the group's deduplicated subject list.
//! - Plain group/schedule reads.
//!
//! # Invariants
//! - Every mutation is one `transact` call on the group document: the whole
//!   read-mutate-write re-runs on conflict until the retry budget runs out.
//! - A missing group fails the operation with `GroupNotFound` and is never
//!   retried.
//! - Removing from a missing week/day level, or a lesson that is not there,
//!   commits nothing.

use crate::model::group::{DayIndex, Group, Schedule, WeekType};
use crate::service::{require_text, ServiceError, ServiceResult};
use crate::store::{
    encode, layout, DocPath, Document, DocumentStore, Fields, Query, StoreError, StoreResult,
};
use log::{debug, info};
use serde_json::Map;

pub struct ScheduleService<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: DocumentStore + ?Sized> ScheduleService<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Appends `lesson` to `(week_type, day)`, creating missing levels.
    pub fn add_lesson(
        &self,
        semester_id: &str,
        group_id: &str,
        week_type: WeekType,
        day: DayIndex,
        lesson: &str,
    ) -> ServiceResult<()> {
        let lesson = require_text("lesson", lesson)?;
        let attempts = self.mutate_group(semester_id, group_id, |group| {
            group
                .schedule
                .add_lesson(week_type, day, lesson.as_str());
            true
        })?;

        info!(
            "event=lesson_add module=schedule status=ok semester_id={} group_id={} week={} day={} attempts={}",
            semester_id, group_id, week_type, day, attempts
        );
        Ok(())
    }

    /// Removes the first exact match of `lesson` from `(week_type, day)`.
    ///
    /// Returns whether an entry was removed; a miss is not an error.
    pub fn remove_lesson(
        &self,
        semester_id: &str,
        group_id: &str,
        week_type: WeekType,
        day: DayIndex,
        lesson: &str,
    ) -> ServiceResult<bool> {
        let mut removed = false;
        let attempts = self.mutate_group(semester_id, group_id, |group| {
            removed = group.schedule.remove_lesson(week_type, day, lesson);
            removed
        })?;

        info!(
            "event=lesson_remove module=schedule status=ok semester_id={} group_id={} week={} day={} removed={} attempts={}",
            semester_id, group_id, week_type, day, removed, attempts
        );
        Ok(removed)
    }

    /// Adds `subject` to the group's subject list unless already present.
    ///
    /// Returns whether the list changed.
    pub fn add_subject(
        &self,
        semester_id: &str,
        group_id: &str,
        subject: &str,
    ) -> ServiceResult<bool> {
        let subject = require_text("subject", subject)?;
        let mut added = false;
        self.mutate_group(semester_id, group_id, |group| {
            added = group.add_subject(subject.as_str());
            added
        })?;
        debug!(
            "event=subject_add module=schedule semester_id={} group_id={} added={}",
            semester_id, group_id, added
        );
        Ok(added)
    }

    /// Non-transactional schedule read; `None` when the group is missing.
    pub fn get_schedule(
        &self,
        semester_id: &str,
        group_id: &str,
    ) -> ServiceResult<Option<Schedule>> {
        Ok(self
            .get_group(semester_id, group_id)?
            .map(|group| group.schedule))
    }

    /// Subject list in insertion order; `None` when the group is missing.
    pub fn get_subjects(
        &self,
        semester_id: &str,
        group_id: &str,
    ) -> ServiceResult<Option<Vec<String>>> {
        Ok(self
            .get_group(semester_id, group_id)?
            .map(|group| group.subjects))
    }

    pub fn get_group(&self, semester_id: &str, group_id: &str) -> ServiceResult<Option<Group>> {
        match self.store.get(&layout::group(semester_id, group_id)?)? {
            Some(document) => Ok(Some(decode_group(&document)?)),
            None => Ok(None),
        }
    }

    pub fn list_groups(&self, semester_id: &str) -> ServiceResult<Vec<Group>> {
        self.store
            .query(&layout::groups(semester_id)?, &Query::new())?
            .iter()
            .map(|document| decode_group(document).map_err(ServiceError::from))
            .collect()
    }

    /// Runs `mutate` against the current group inside one transaction and
    /// writes back `subjects` and `schedule` when it returns `true`.
    ///
    /// Returns the number of attempts the transaction took.
    fn mutate_group<F>(&self, semester_id: &str, group_id: &str, mut mutate: F) -> ServiceResult<u32>
    where
        F: FnMut(&mut Group) -> bool,
    {
        let path = layout::group(semester_id, group_id)?;
        let outcome = self.store.transact(&path, &mut |current| {
            let document = current.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let mut group = decode_group(document)?;
            if !mutate(&mut group) {
                return Ok(None);
            }
            group_patch(&group).map(Some)
        });

        match outcome {
            Ok(outcome) => Ok(outcome.attempts),
            Err(StoreError::NotFound(_)) => Err(group_not_found(&path, semester_id, group_id)),
            Err(err) => Err(err.into()),
        }
    }
}

fn decode_group(document: &Document) -> StoreResult<Group> {
    let mut group: Group = document.decode()?;
    group.id = document.id().to_string();
    Ok(group)
}

/// Only the mutable fields; other group fields are left untouched.
fn group_patch(group: &Group) -> StoreResult<Fields> {
    let encoded = encode(group)?;
    let mut patch = Map::new();
    for key in ["subjects", "schedule"] {
        if let Some(value) = encoded.get(key) {
            patch.insert(key.to_string(), value.clone());
        }
    }
    Ok(patch)
}

fn group_not_found(path: &DocPath, semester_id: &str, group_id: &str) -> ServiceError {
    debug!(
        "event=group_missing module=schedule path={} status=error",
        path
    );
    ServiceError::GroupNotFound {
        semester_id: semester_id.to_string(),
        group_id: group_id.to_string(),
    }
}
