//! One-shot migration from the legacy absence collection.
//!
//! # Responsibility
//! - Replay legacy absences into the global absence log, resolving each
//!   student through `StudentService` in the default group.
//! - Expose the legacy collection with fields remapped on read.
//!
//! # Invariants
//! - Legacy documents are never written.
//! - Records without a student name are skipped and counted, never errors.
//! - With `MigrationLogIds::Generated` every run appends a fresh log entry
//!   per legacy record, so re-running duplicates the log.

use crate::config::{CoreConfig, MigrationLogIds};
use crate::model::absence::{AbsenceLogEntry, LegacyAbsence};
use crate::service::student_service::StudentService;
use crate::service::ServiceResult;
use crate::store::{encode, layout, DocumentStore, Query, SetMode};
use log::{info, warn};

const LEGACY_LOG_ID_PREFIX: &str = "legacy_";

pub struct MigrationService<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    students: StudentService<'s, S>,
    legacy_collection: String,
    default_group_id: String,
    log_ids: MigrationLogIds,
}

impl<'s, S: DocumentStore + ?Sized> MigrationService<'s, S> {
    pub fn new(store: &'s S, config: &CoreConfig) -> Self {
        Self {
            store,
            students: StudentService::new(store, config),
            legacy_collection: config.legacy_collection.clone(),
            default_group_id: config.default_group.id.clone(),
            log_ids: config.migration_log_ids,
        }
    }

    /// Legacy absences in store order, remapped to current field names.
    pub fn list_legacy_absences(&self) -> ServiceResult<Vec<LegacyAbsence>> {
        let collection = layout::legacy_absences(&self.legacy_collection)?;
        Ok(self
            .store
            .query(&collection, &Query::new())?
            .iter()
            .map(|document| LegacyAbsence::from_fields(document.id(), &document.fields))
            .collect())
    }

    /// Replays every legacy absence into the global log.
    ///
    /// Returns the number of migrated records; skipped records are logged.
    pub fn migrate_old_absences(&self) -> ServiceResult<usize> {
        let legacy = self.list_legacy_absences()?;
        let log = layout::absence_log()?;
        let mut migrated = 0;
        let mut skipped = 0;

        for record in &legacy {
            let Some(student_name) = record.student_name.as_deref() else {
                skipped += 1;
                warn!(
                    "event=legacy_migrate module=migration status=skipped legacy_id={} reason=missing_student_name",
                    record.id
                );
                continue;
            };

            let student_id = self
                .students
                .resolve_student(student_name, &self.default_group_id)?;
            let timestamp = match record.timestamp {
                Some(original) => original,
                None => self.store.server_timestamp()?,
            };
            let entry = AbsenceLogEntry {
                id: String::new(),
                student_id,
                student_name: student_name.to_string(),
                semester_id: None,
                subject: record.subject_or_unknown().to_string(),
                date: record.date_or_unknown().to_string(),
                timestamp,
                migrated: true,
            };
            let fields = encode(&entry)?;

            match self.log_ids {
                MigrationLogIds::Generated => {
                    self.store.add(&log, fields)?;
                }
                MigrationLogIds::FromLegacyId => {
                    let path = log.doc(&format!("{LEGACY_LOG_ID_PREFIX}{}", record.id))?;
                    self.store.set(&path, fields, SetMode::Overwrite)?;
                }
            }
            migrated += 1;
        }

        info!(
            "event=legacy_migrate module=migration status=ok migrated={} skipped={} total={}",
            migrated,
            skipped,
            legacy.len()
        );
        Ok(migrated)
    }

    /// Resolves a batch of names into `group_id`; see
    /// `StudentService::migrate_students`.
    pub fn migrate_students<I, N>(&self, names: I, group_id: &str) -> ServiceResult<usize>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        self.students.migrate_students(names, group_id)
    }
}
