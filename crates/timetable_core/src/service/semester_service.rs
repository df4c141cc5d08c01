//! Semester lifecycle: creation, activation and archival.
//!
//! # Responsibility
//! - Create semesters, move the active pointer and archive the predecessor.
//! - Seed the default group under each new semester.
//! - Resolve the active semester pointer-first with a status-scan fallback.
//!
//! # Invariants
//! - After `create_semester` returns, `metadata/config` points at the new
//!   semester and the new semester is `active`.
//! - Archiving the previous semester is best-effort. When it fails the old
//!   semester may stay `active` until reconciled; `active_semester_candidates`
//!   exposes that state.
//! - Creation is not wrapped in a store transaction; two concurrent creators
//!   can both end up `active`.

use crate::config::{CoreConfig, GroupSeed};
use crate::model::group::Group;
use crate::model::semester::{ActivePointer, Semester, SemesterId, SemesterStatus};
use crate::service::{require_text, ServiceResult};
use crate::store::{encode, layout, Document, DocumentStore, Query, SetMode};
use log::{info, warn};
use serde_json::{json, Map};

pub struct SemesterService<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    seed: GroupSeed,
}

impl<'s, S: DocumentStore + ?Sized> SemesterService<'s, S> {
    pub fn new(store: &'s S, config: &CoreConfig) -> Self {
        Self {
            store,
            seed: config.default_group.clone(),
        }
    }

    /// Creates an active semester and makes it the current one.
    ///
    /// # Steps
    /// 1. Add the semester document with `status = active`.
    /// 2. Archive the semester named by the config pointer, if any
    ///    (failures are logged and swallowed).
    /// 3. Merge-write the pointer to the new id.
    /// 4. Seed the default group with an empty schedule shell.
    pub fn create_semester(&self, name: &str) -> ServiceResult<SemesterId> {
        let name = require_text("semester name", name)?;
        let semester = Semester {
            id: SemesterId::new(),
            name,
            status: SemesterStatus::Active,
            created_at: self.store.server_timestamp()?,
        };
        let semester_id = self
            .store
            .add(&layout::semesters()?, encode(&semester)?)?
            .id()
            .to_string();

        if let Some(previous_id) = self.read_pointer()?.active_semester_id {
            if previous_id != semester_id {
                self.archive_best_effort(&previous_id);
            }
        }

        let pointer = ActivePointer {
            active_semester_id: Some(semester_id.clone()),
        };
        self.store
            .set(&layout::config()?, encode(&pointer)?, SetMode::Merge)?;

        let group = Group::new(
            self.seed.id.clone(),
            self.seed.name.clone(),
            self.seed.course,
        );
        self.store.set(
            &layout::group(&semester_id, &group.id)?,
            encode(&group)?,
            SetMode::Overwrite,
        )?;

        info!(
            "event=semester_create module=semester status=ok semester_id={} seeded_group={}",
            semester_id, group.id
        );
        Ok(semester_id)
    }

    /// Returns the active semester, or `None` when there is none.
    ///
    /// Trusts the config pointer when it resolves to an existing document;
    /// otherwise falls back to the first semester with `status == active`.
    pub fn get_active_semester(&self) -> ServiceResult<Option<Semester>> {
        if let Some(pointed_id) = self.read_pointer()?.active_semester_id {
            if let Some(document) = self.store.get(&layout::semester(&pointed_id)?)? {
                return Ok(Some(decode_semester(&document)?));
            }
            warn!(
                "event=semester_active module=semester status=stale_pointer semester_id={}",
                pointed_id
            );
        }

        let query = Query::new()
            .where_eq("status", SemesterStatus::Active.as_str())
            .limit(1);
        match self
            .store
            .query(&layout::semesters()?, &query)?
            .into_iter()
            .next()
        {
            Some(document) => Ok(Some(decode_semester(&document)?)),
            None => Ok(None),
        }
    }

    /// Every semester with `status == archived`, in store order.
    pub fn get_archived_semesters(&self) -> ServiceResult<Vec<Semester>> {
        self.list_by_status(SemesterStatus::Archived)
    }

    /// Every semester still marked `active`.
    ///
    /// More than one entry means an earlier archive step failed or two
    /// creations raced.
    pub fn active_semester_candidates(&self) -> ServiceResult<Vec<Semester>> {
        self.list_by_status(SemesterStatus::Active)
    }

    pub fn get_semester(&self, semester_id: &str) -> ServiceResult<Option<Semester>> {
        match self.store.get(&layout::semester(semester_id)?)? {
            Some(document) => Ok(Some(decode_semester(&document)?)),
            None => Ok(None),
        }
    }

    fn list_by_status(&self, status: SemesterStatus) -> ServiceResult<Vec<Semester>> {
        let query = Query::new().where_eq("status", status.as_str());
        self.store
            .query(&layout::semesters()?, &query)?
            .iter()
            .map(decode_semester)
            .collect()
    }

    fn read_pointer(&self) -> ServiceResult<ActivePointer> {
        match self.store.get(&layout::config()?)? {
            Some(document) => Ok(document.decode()?),
            None => Ok(ActivePointer::default()),
        }
    }

    fn archive_best_effort(&self, semester_id: &str) {
        let mut fields = Map::new();
        fields.insert(
            "status".to_string(),
            json!(SemesterStatus::Archived.as_str()),
        );

        let result = layout::semester(semester_id)
            .and_then(|path| self.store.update(&path, fields));
        match result {
            Ok(()) => info!(
                "event=semester_archive module=semester status=ok semester_id={}",
                semester_id
            ),
            Err(err) => warn!(
                "event=semester_archive module=semester status=skipped semester_id={} error={}",
                semester_id, err
            ),
        }
    }
}

fn decode_semester(document: &Document) -> ServiceResult<Semester> {
    let mut semester: Semester = document.decode()?;
    semester.id = document.id().to_string();
    Ok(semester)
}
