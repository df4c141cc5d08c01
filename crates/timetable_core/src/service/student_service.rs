//! Student identity resolution.
//!
//! # Responsibility
//! - Map `(full name, group)` to one stable student id, creating the student
//!   on first sight.
//! - Roster reads (`get_student`, `list_students`).
//!
//! # Invariants
//! - Resolving the same pair twice without concurrency returns the same id.
//! - Uniqueness is scoped per group: equal names in different groups are
//!   different students.
//! - With `IdentityStrategy::Lookup` the existence check and the create are
//!   separate store calls; two concurrent first-time resolutions can both
//!   create a student. `IdentityStrategy::Deterministic` closes that race.

use crate::config::{CoreConfig, IdentityStrategy};
use crate::model::student::{Student, StudentId};
use crate::service::{require_key, ServiceResult};
use crate::store::{encode, layout, DocumentStore, Query};
use log::{info, warn};
use uuid::Uuid;

const STUDENT_ID_NAMESPACE: Uuid = Uuid::from_u128(0x5d1c_93a7_0b4e_4f2a_9c61_7e2d_84f0_b3a5);

pub struct StudentService<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    strategy: IdentityStrategy,
}

impl<'s, S: DocumentStore + ?Sized> StudentService<'s, S> {
    pub fn new(store: &'s S, config: &CoreConfig) -> Self {
        Self {
            store,
            strategy: config.identity_strategy,
        }
    }

    /// Returns the id of the student named `full_name` in `group_id`,
    /// creating the student when none exists.
    ///
    /// `full_name` is matched exactly as given, surrounding whitespace
    /// included. With duplicates already present (left by an earlier race)
    /// the first one in store order wins.
    pub fn resolve_student(&self, full_name: &str, group_id: &str) -> ServiceResult<StudentId> {
        let full_name = require_key("student name", full_name)?;
        let group_id = require_key("group id", group_id)?;

        match self.strategy {
            IdentityStrategy::Lookup => self.resolve_by_lookup(full_name, group_id),
            IdentityStrategy::Deterministic => self.resolve_deterministic(full_name, group_id),
        }
    }

    /// Resolves every name in `names` into `group_id`.
    ///
    /// Blank names are skipped. Returns how many names were resolved.
    pub fn migrate_students<I, N>(&self, names: I, group_id: &str) -> ServiceResult<usize>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut resolved = 0;
        let mut skipped = 0;
        for name in names {
            if name.as_ref().trim().is_empty() {
                skipped += 1;
                continue;
            }
            self.resolve_student(name.as_ref(), group_id)?;
            resolved += 1;
        }

        if skipped > 0 {
            warn!(
                "event=students_migrate module=identity status=partial skipped={}",
                skipped
            );
        }
        info!(
            "event=students_migrate module=identity status=ok resolved={}",
            resolved
        );
        Ok(resolved)
    }

    pub fn get_student(&self, student_id: &str) -> ServiceResult<Option<Student>> {
        let Some(document) = self.store.get(&layout::student(student_id)?)? else {
            return Ok(None);
        };
        let mut student: Student = document.decode()?;
        student.id = document.id().to_string();
        Ok(Some(student))
    }

    /// Students of one group in creation order.
    pub fn list_students(&self, group_id: &str) -> ServiceResult<Vec<Student>> {
        let query = Query::new().where_eq("groupId", group_id);
        self.store
            .query(&layout::students()?, &query)?
            .into_iter()
            .map(|document| -> ServiceResult<Student> {
                let mut student: Student = document.decode()?;
                student.id = document.id().to_string();
                Ok(student)
            })
            .collect()
    }

    fn resolve_by_lookup(&self, full_name: String, group_id: String) -> ServiceResult<StudentId> {
        let students = layout::students()?;
        let query = Query::new()
            .where_eq("fullName", full_name.as_str())
            .where_eq("groupId", group_id.as_str())
            .limit(1);

        if let Some(existing) = self.store.query(&students, &query)?.into_iter().next() {
            return Ok(existing.id().to_string());
        }

        let student = Student {
            id: StudentId::new(),
            full_name,
            group_id,
            created_at: self.store.server_timestamp()?,
        };
        let path = self.store.add(&students, encode(&student)?)?;
        info!(
            "event=student_create module=identity status=ok strategy=lookup student_id={}",
            path.id()
        );
        Ok(path.id().to_string())
    }

    fn resolve_deterministic(
        &self,
        full_name: String,
        group_id: String,
    ) -> ServiceResult<StudentId> {
        let student_id = deterministic_student_id(&full_name, &group_id);
        let path = layout::student(&student_id)?;
        let fields = encode(&Student {
            id: student_id.clone(),
            full_name,
            group_id,
            created_at: self.store.server_timestamp()?,
        })?;

        let outcome = self.store.transact(&path, &mut |current| {
            Ok(match current {
                Some(_) => None,
                None => Some(fields.clone()),
            })
        })?;
        if outcome.committed {
            info!(
                "event=student_create module=identity status=ok strategy=deterministic student_id={} attempts={}",
                student_id, outcome.attempts
            );
        }
        Ok(student_id)
    }
}

/// Stable id for a `(full name, group)` pair.
pub fn deterministic_student_id(full_name: &str, group_id: &str) -> StudentId {
    let key = format!("{group_id}\u{1f}{full_name}");
    Uuid::new_v5(&STUDENT_ID_NAMESPACE, key.as_bytes())
        .simple()
        .to_string()
}
