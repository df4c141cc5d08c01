//! Absence logging.
//!
//! # Responsibility
//! - Record one absence event as two denormalized documents: the
//!   per-student record and the global log entry.
//! - Read both views and delete global log entries.
//!
//! # Invariants
//! - The student is resolved through `StudentService` before any write.
//! - Both documents of one event share the same server timestamp.
//! - Records are append-only; `delete_absence_log` touches only the log.

use crate::config::CoreConfig;
use crate::model::absence::{AbsenceLogEntry, AbsenceRecord};
use crate::model::student::StudentId;
use crate::service::student_service::StudentService;
use crate::service::{require_key, require_text, ServiceResult};
use crate::store::{encode, layout, Direction, DocumentStore, Query, Timestamp};
use log::info;

/// Input for `AbsenceService::record_absence`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceRequest {
    pub semester_id: String,
    pub full_name: String,
    pub group_id: String,
    pub subject: String,
    /// Calendar date as entered by the caller (opaque string).
    pub date: String,
}

/// Ids written by one `record_absence` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsenceReceipt {
    pub student_id: StudentId,
    pub record_id: String,
    pub log_id: String,
    pub timestamp: Timestamp,
}

/// Filter for `AbsenceService::list_absence_log`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsenceLogQuery {
    pub semester_id: Option<String>,
    pub student_id: Option<String>,
    pub limit: Option<u32>,
}

pub struct AbsenceService<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    students: StudentService<'s, S>,
}

impl<'s, S: DocumentStore + ?Sized> AbsenceService<'s, S> {
    pub fn new(store: &'s S, config: &CoreConfig) -> Self {
        Self {
            store,
            students: StudentService::new(store, config),
        }
    }

    /// Resolves the student and writes the per-student record and the
    /// global log entry.
    pub fn record_absence(&self, request: &AbsenceRequest) -> ServiceResult<AbsenceReceipt> {
        let semester_id = require_text("semester id", &request.semester_id)?;
        let subject = require_text("subject", &request.subject)?;
        let date = require_text("date", &request.date)?;
        let student_name = require_key("student name", &request.full_name)?;

        let student_id = self
            .students
            .resolve_student(&student_name, &request.group_id)?;
        let timestamp = self.store.server_timestamp()?;

        let record = AbsenceRecord {
            id: String::new(),
            subject: subject.clone(),
            date: date.clone(),
            timestamp,
        };
        let record_path = self.store.add(
            &layout::student_absences(&student_id, &semester_id)?,
            encode(&record)?,
        )?;

        let entry = AbsenceLogEntry {
            id: String::new(),
            student_id: student_id.clone(),
            student_name,
            semester_id: Some(semester_id.clone()),
            subject,
            date,
            timestamp,
            migrated: false,
        };
        let log_path = self.store.add(&layout::absence_log()?, encode(&entry)?)?;

        info!(
            "event=absence_record module=absence status=ok semester_id={} student_id={} log_id={}",
            semester_id,
            student_id,
            log_path.id()
        );
        Ok(AbsenceReceipt {
            student_id,
            record_id: record_path.id().to_string(),
            log_id: log_path.id().to_string(),
            timestamp,
        })
    }

    /// Per-student records for one semester, oldest first.
    pub fn list_student_absences(
        &self,
        student_id: &str,
        semester_id: &str,
    ) -> ServiceResult<Vec<AbsenceRecord>> {
        let query = Query::new().order_by("timestamp", Direction::Ascending);
        self.store
            .query(&layout::student_absences(student_id, semester_id)?, &query)?
            .into_iter()
            .map(|document| -> ServiceResult<AbsenceRecord> {
                let mut record: AbsenceRecord = document.decode()?;
                record.id = document.id().to_string();
                Ok(record)
            })
            .collect()
    }

    /// Global log entries, newest first.
    pub fn list_absence_log(&self, filter: &AbsenceLogQuery) -> ServiceResult<Vec<AbsenceLogEntry>> {
        let mut query = Query::new().order_by("timestamp", Direction::Descending);
        if let Some(semester_id) = &filter.semester_id {
            query = query.where_eq("semesterId", semester_id.as_str());
        }
        if let Some(student_id) = &filter.student_id {
            query = query.where_eq("studentId", student_id.as_str());
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        self.store
            .query(&layout::absence_log()?, &query)?
            .into_iter()
            .map(|document| -> ServiceResult<AbsenceLogEntry> {
                let mut entry: AbsenceLogEntry = document.decode()?;
                entry.id = document.id().to_string();
                Ok(entry)
            })
            .collect()
    }

    /// Deletes one global log entry. Unknown ids are a successful no-op.
    pub fn delete_absence_log(&self, log_id: &str) -> ServiceResult<()> {
        self.store.delete(&layout::absence_log_entry(log_id)?)?;
        info!(
            "event=absence_log_delete module=absence status=ok log_id={}",
            log_id
        );
        Ok(())
    }
}
